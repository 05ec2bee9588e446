use criterion::{black_box, Criterion};
use linkgrad_core::{array::NdArray, error::Result};
use linkgrad_functions::{average_pooling_2d, max_pooling_2d};
use linkgrad_graph::{with_config, Flag, Variable};

const SHAPES: [([usize; 4], &str); 2] = [([2, 3, 32, 32], "small"), ([8, 16, 64, 64], "medium")];

fn input(shape: &[usize]) -> NdArray {
    let size: usize = shape.iter().product();
    let data: Vec<f32> = (0..size).map(|i| ((i * 31) % 97) as f32 / 97.0).collect();
    NdArray::from_vec(data, shape).unwrap()
}

fn bench_pool<F>(b: &mut criterion::Bencher, x: &NdArray, optimized: bool, op_fn: F)
where
    F: Fn(&Variable) -> Result<Variable>,
{
    b.iter(|| {
        with_config(Flag::UseOptimized, optimized, || {
            let v = Variable::new(x.clone());
            let y = op_fn(&v).unwrap();
            y.set_grad(Some(y.data().unwrap().ones_like())).unwrap();
            y.backward(false).unwrap();
            black_box(v.grad().unwrap())
        })
    })
}

pub fn basic(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("pool/basic");
    group.warm_up_time(core::time::Duration::from_millis(500));
    group.measurement_time(core::time::Duration::from_secs(3));
    group.sample_size(30);

    let operations: Vec<(&str, Box<dyn Fn(&Variable) -> Result<Variable>>)> = vec![
        ("max_pooling_2d", Box::new(|x| max_pooling_2d(x, 3, Some(2), 1))),
        ("average_pooling_2d", Box::new(|x| average_pooling_2d(x, 3, Some(2), 1))),
    ];

    for (op_name, op_fn) in &operations {
        for (shape, size_name) in &SHAPES {
            let x = input(shape);
            for (optimized, imp) in [(false, "reference"), (true, "optimized")] {
                let bench_name = format!("{}/{}/{}", op_name, imp, size_name);
                group.bench_function(&bench_name, |b| bench_pool(b, &x, optimized, op_fn));
            }
        }
    }

    group.finish();
}
