mod utils;

use linkgrad_core::error::{Error, Result};
use linkgrad_graph::{apply, using_config, Flag};
use utils::{array, NanMaker, Scale};

#[test]
fn nan_output_fails_in_debug_mode() -> Result<()> {
    let _debug = using_config(Flag::Debug, true);
    match apply(NanMaker, [array(&[1.0], &[1])?]) {
        Err(Error::Numerical { function, .. }) => assert_eq!(function, "NanMaker"),
        other => panic!("unexpected {:?}", other.map(|o| o.len())),
    }
    Ok(())
}

#[test]
fn nan_output_passes_outside_debug_mode() -> Result<()> {
    let _debug = using_config(Flag::Debug, false);
    let y = apply(NanMaker, [array(&[1.0], &[1])?])?.one()?;
    assert!(y.data()?.has_nan());
    Ok(())
}

#[test]
fn debug_mode_records_call_site() -> Result<()> {
    let y = {
        let _debug = using_config(Flag::Debug, true);
        apply(Scale(2.0), [array(&[1.0], &[1])?])?.one()?
    };
    let node = y.creator()?.expect("graph is built");
    assert!(node.stack().is_some());

    let _quiet = using_config(Flag::Debug, false);
    let z = apply(Scale(2.0), [array(&[1.0], &[1])?])?.one()?;
    assert!(z.creator()?.expect("graph is built").stack().is_none());
    Ok(())
}
