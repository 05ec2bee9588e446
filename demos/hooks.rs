use linkgrad::prelude::*;
use std::sync::Arc;

fn main() -> Result<()> {
    let timer = Arc::new(TimerHook::new());

    let x = Variable::new(NdArray::ones(&[1, 2, 6, 6], DType::F32));
    let w = Variable::new(NdArray::full(&[4, 2, 3, 3], DType::F32, 0.1));

    with_hook(timer.clone(), || -> Result<()> {
        let h = convolution_2d(&x, &w, None, 1, 1)?;
        let y = max_pooling_2d(&h, 2, None, 0)?;
        y.set_grad(Some(NdArray::ones(&y.shape()?, DType::F32)))?;
        y.backward(false)
    })??;

    for record in timer.records() {
        let phase = if record.backward { "backward" } else { "forward" };
        println!("{:<24} {:<8} {:?}", record.label, phase, record.elapsed);
    }
    println!("total: {:?}", timer.total_time());

    Ok(())
}
