mod utils;

use linkgrad_core::{
    array::NdArray,
    device::{get_default_device, Device},
    dtype::DType,
    error::{Error, Result},
};
use linkgrad_graph::{
    apply, no_backprop_mode, Backend, Function, FunctionNode, FunctionOutput, Input, Variable, Volatility,
};
use utils::{array, Add, BadArity, Scale, Split};

#[test]
fn raw_inputs_become_auto_leaves() -> Result<()> {
    let y = apply(Scale(2.0), [array(&[1.0, 2.0], &[2])?])?.one()?;
    assert_eq!(y.volatility(), Volatility::Auto);
    assert_eq!(y.data()?.to_vec::<f32>()?, vec![2.0, 4.0]);

    let node = y.creator()?.expect("graph is built by default");
    let inputs = node.inputs()?.expect("node keeps its inputs");
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].rank(), 0);
    assert!(inputs[0].creator()?.is_none());
    Ok(())
}

#[test]
fn volatile_input_never_builds_graph() -> Result<()> {
    let x = Variable::with_volatility(array(&[1.0], &[1])?, Volatility::On);
    let y = apply(Add, [Input::from(&x), Input::from(array(&[2.0], &[1])?)])?.one()?;
    assert_eq!(y.volatility(), Volatility::On);
    assert!(y.creator()?.is_none());
    assert_eq!(y.rank(), 0);
    Ok(())
}

#[test]
fn off_input_builds_graph_even_without_backprop() -> Result<()> {
    let _guard = no_backprop_mode();
    let x = Variable::with_volatility(array(&[1.0], &[1])?, Volatility::Off);
    let y = apply(Scale(3.0), [&x])?.one()?;
    assert_eq!(y.volatility(), Volatility::Off);
    assert!(y.creator()?.is_some());
    Ok(())
}

#[test]
fn auto_inputs_follow_backprop_mode() -> Result<()> {
    let x = Variable::new(array(&[1.0], &[1])?);
    let y = {
        let _guard = no_backprop_mode();
        apply(Scale(2.0), [&x])?.one()?
    };
    assert_eq!(y.volatility(), Volatility::Auto);
    assert!(y.creator()?.is_none());

    let z = apply(Scale(2.0), [&x])?.one()?;
    assert!(z.creator()?.is_some());
    Ok(())
}

#[test]
fn rank_is_one_above_deepest_input() -> Result<()> {
    let a = Variable::new(array(&[1.0], &[1])?);
    let b = apply(Scale(2.0), [&a])?.one()?;
    let c = apply(Scale(2.0), [&b])?.one()?;
    assert_eq!((a.rank(), b.rank(), c.rank()), (0, 1, 2));

    let d = apply(Add, [&a, &c])?.one()?;
    let node = d.creator()?.expect("graph is built");
    assert_eq!(node.rank(), 2);
    assert_eq!(d.rank(), 3);
    Ok(())
}

#[test]
fn several_outputs_come_back_as_many() -> Result<()> {
    let out = apply(Split, [array(&[1.0, 2.0], &[2])?])?;
    assert_eq!(out.len(), 2);
    let FunctionOutput::Many(ys) = out else {
        panic!("expected two outputs");
    };
    assert_eq!(ys[0].data()?.to_vec::<f32>()?, vec![2.0, 4.0]);
    assert_eq!(ys[1].data()?.to_vec::<f32>()?, vec![3.0, 6.0]);

    let node = ys[0].creator()?.expect("graph is built");
    assert_eq!(node.n_outputs(), 2);
    assert!(ys[1].creator()?.is_some_and(|n| n.id() == node.id()));
    Ok(())
}

#[test]
fn type_error_names_the_function() -> Result<()> {
    let ints = NdArray::zeros(&[2], DType::I32);
    match apply(Scale(1.0), [ints]) {
        Err(Error::TypeMismatch { function, argument, .. }) => {
            assert_eq!(function, "Scale");
            assert_eq!(argument, Some(0));
        }
        other => panic!("unexpected {:?}", other.map(|o| o.len())),
    }

    let too_many = apply(Scale(1.0), [array(&[1.0], &[1])?, array(&[1.0], &[1])?]);
    assert!(matches!(too_many, Err(Error::TypeMismatch { argument: None, .. })));
    Ok(())
}

#[test]
fn type_check_can_be_disabled() -> Result<()> {
    let _guard = linkgrad_graph::using_config(linkgrad_graph::Flag::TypeCheck, false);
    let ints = NdArray::from_vec(vec![1i32, 2], &[2])?;
    let y = apply(Scale(2.0), [ints])?.one()?;
    assert_eq!(y.data()?.to_vec::<i32>()?, vec![2, 4]);
    Ok(())
}

#[test]
#[should_panic(expected = "forward returned 2 outputs, expected 1")]
fn wrong_output_count_panics() {
    let x = NdArray::zeros(&[1], DType::F32);
    let _ = apply(BadArity, [x]);
}

#[test]
fn accelerator_inputs_select_accel_backend() -> Result<()> {
    let x = array(&[1.0, 2.0], &[2])?.to_device(Device::Accel(1));
    let before = get_default_device();
    let y = apply(Scale(2.0), [x])?.one()?;
    assert_eq!(get_default_device(), before);
    assert_eq!(y.device()?, Device::Accel(1));
    assert_eq!(y.creator()?.map(|n| n.backend()), Some(Backend::Accel));
    Ok(())
}

#[test]
fn missing_backend_is_reported() -> Result<()> {
    let x = array(&[1.0], &[1])?.to_device(Device::Accel(0));
    let y = array(&[1.0], &[1])?.to_device(Device::Accel(0));
    assert!(matches!(
        apply(Add, [x, y]),
        Err(Error::UnsupportedBackend { backend: "accel", .. })
    ));
    Ok(())
}

#[test]
fn duplicated_node_applies_again() -> Result<()> {
    let node = FunctionNode::new(Scale(4.0));
    let again = node.duplicate();
    let a = node.apply([array(&[1.0], &[1])?])?.one()?;
    let b = again.apply([array(&[2.0], &[1])?])?.one()?;
    assert_eq!(a.data()?.to_vec::<f32>()?, vec![4.0]);
    assert_eq!(b.data()?.to_vec::<f32>()?, vec![8.0]);
    assert_eq!(Scale(1.0).label(), "Scale");
    Ok(())
}
