use criterion::{black_box, Criterion};
use linkgrad_core::array::NdArray;
use linkgrad_functions::convolution_2d;
use linkgrad_graph::{with_config, Flag, Variable};

// (input, weight)
const SHAPES: [([usize; 4], [usize; 4], &str); 2] = [
    ([2, 3, 16, 16], [8, 3, 3, 3], "small"),
    ([4, 16, 32, 32], [32, 16, 3, 3], "medium"),
];

fn filled(shape: &[usize], modulus: usize) -> NdArray {
    let size: usize = shape.iter().product();
    let data: Vec<f32> = (0..size).map(|i| (i % modulus) as f32 / modulus as f32 - 0.5).collect();
    NdArray::from_vec(data, shape).unwrap()
}

pub fn basic(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("conv/basic");
    group.warm_up_time(core::time::Duration::from_millis(500));
    group.measurement_time(core::time::Duration::from_secs(3));
    group.sample_size(20);

    for (x_shape, w_shape, size_name) in &SHAPES {
        let x = filled(x_shape, 13);
        let w = filled(w_shape, 7);
        for (optimized, imp) in [(false, "reference"), (true, "optimized")] {
            let bench_name = format!("convolution_2d/{}/{}", imp, size_name);
            group.bench_function(&bench_name, |b| {
                b.iter(|| {
                    with_config(Flag::UseOptimized, optimized, || {
                        let xv = Variable::new(x.clone());
                        let wv = Variable::new(w.clone());
                        let y = convolution_2d(&xv, &wv, None, 1, 1).unwrap();
                        y.set_grad(Some(y.data().unwrap().ones_like())).unwrap();
                        y.backward(false).unwrap();
                        black_box(wv.grad().unwrap())
                    })
                })
            });
        }
    }

    group.finish();
}
