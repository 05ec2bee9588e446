mod utils;

use linkgrad_core::error::Result;
use linkgrad_graph::{apply, Variable};
use utils::{array, Scale};

#[test]
fn unchain_is_idempotent() -> Result<()> {
    let x = Variable::new(array(&[1.0], &[1])?);
    let y = apply(Scale(2.0), [&x])?.one()?;
    let node = y.creator()?.expect("graph is built");

    node.unchain()?;
    assert!(y.creator()?.is_none());
    assert!(node.is_unchained()?);
    assert!(node.inputs()?.is_none());

    node.unchain()?;
    assert!(y.creator()?.is_none());
    assert!(node.is_unchained()?);
    Ok(())
}

#[test]
fn unchain_skips_dropped_outputs() -> Result<()> {
    let x = Variable::new(array(&[1.0], &[1])?);
    let y = apply(Scale(2.0), [&x])?.one()?;
    let node = y.creator()?.expect("graph is built");
    let weak = y.downgrade();
    drop(y);

    assert!(!weak.is_alive());
    assert_eq!(node.outputs().len(), 1);
    assert!(node.outputs()[0].is_none());
    node.unchain()?;
    assert!(node.is_unchained()?);
    Ok(())
}

#[test]
fn node_lives_while_an_output_does() -> Result<()> {
    let x = Variable::new(array(&[1.0], &[1])?);
    let y = apply(Scale(2.0), [&x])?.one()?;
    let node = y.creator()?.expect("graph is built");
    let node_id = node.id();
    drop(node);

    let again = y.creator()?.expect("creator edge is strong");
    assert_eq!(again.id(), node_id);
    let inputs = again.inputs()?.expect("inputs are held strongly");
    assert!(inputs[0].ptr_eq(&x));
    Ok(())
}

#[test]
fn unchain_backward_cuts_the_whole_history() -> Result<()> {
    let x = Variable::new(array(&[1.0], &[1])?);
    let h1 = apply(Scale(2.0), [&x])?.one()?;
    let h2 = apply(Scale(2.0), [&h1])?.one()?;
    let y = apply(Scale(2.0), [&h2])?.one()?;

    let nodes = [
        h1.creator()?.expect("built"),
        h2.creator()?.expect("built"),
        y.creator()?.expect("built"),
    ];
    y.unchain_backward()?;

    for v in [&h1, &h2, &y] {
        assert!(v.creator()?.is_none());
    }
    for node in &nodes {
        assert!(node.is_unchained()?);
    }

    // a truncated graph has nothing to propagate into
    y.backward(false)?;
    assert!(x.grad()?.is_none());
    Ok(())
}
