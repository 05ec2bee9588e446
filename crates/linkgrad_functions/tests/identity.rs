mod utils;

use linkgrad_core::{array::NdArray, dtype::DType, error::Result};
use linkgrad_functions::identity;
use linkgrad_graph::Variable;
use utils::array;

#[test]
fn passes_inputs_through() -> Result<()> {
    let a = Variable::new(array(&[1.0, 2.0], &[2])?);
    let b = Variable::new(array(&[3.0], &[1])?);
    let ys = identity([&a, &b])?;

    assert_eq!(ys.len(), 2);
    assert_eq!(ys[0].data()?.to_vec::<f32>()?, vec![1.0, 2.0]);
    assert_eq!(ys[1].data()?.to_vec::<f32>()?, vec![3.0]);
    assert!(ys[0].creator()?.is_some());

    ys[0].set_grad(Some(NdArray::full(&[2], DType::F32, 4.0)))?;
    ys[0].backward(false)?;
    assert_eq!(a.grad()?.expect("leaf grad").to_vec::<f32>()?, vec![4.0, 4.0]);
    assert!(b.grad()?.is_none());
    Ok(())
}
