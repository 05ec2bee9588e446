#![allow(dead_code)]

use linkgrad_core::{array::NdArray, error::Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub fn array(values: &[f32], shape: &[usize]) -> Result<NdArray> {
    NdArray::from_slice(values, shape)
}

pub fn arange(shape: &[usize]) -> Result<NdArray> {
    let size: usize = shape.iter().product();
    NdArray::from_vec((0..size).map(|i| i as f32).collect(), shape)
}

/// Uniform values in [-1, 1), reproducible per seed.
pub fn random(shape: &[usize], seed: u64) -> Result<NdArray> {
    let mut rng = StdRng::seed_from_u64(seed);
    let size: usize = shape.iter().product();
    NdArray::from_vec((0..size).map(|_| rng.gen_range(-1.0f32..1.0)).collect(), shape)
}

pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= tol, "index {}: {} != {}", i, a, e);
    }
}
