use linkgrad::prelude::*;

fn main() -> Result<()> {
    let values: Vec<f32> = (0..2 * 3 * 8 * 8).map(|i| ((i * 37) % 101) as f32 / 101.0).collect();
    let x = Variable::new(NdArray::from_vec(values, &[2, 3, 8, 8])?);

    let y = max_pooling_2d(&x, 2, Some(2), 0)?;
    println!("y: {:?}", y.shape()?);

    y.set_grad(Some(NdArray::ones(&y.shape()?, DType::F32)))?;
    y.backward(false)?;
    if let Some(gx) = x.grad()? {
        println!("gx: {:?}, sum = {}", gx.shape(), gx.to_f64_vec().iter().sum::<f64>());
    }

    // same computation, optimized kernels cross-checked against the reference ones
    let _cosim = using_config(Flag::Cosim, true);
    let _optimized = using_config(Flag::UseOptimized, true);
    let z = average_pooling_2d(&x, 3, Some(1), 1)?;
    println!("z: {:?}, reports: {}", z.shape()?, linkgrad::graph::take_reports().len());

    Ok(())
}
