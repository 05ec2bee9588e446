#![allow(dead_code)]

use linkgrad_core::{
    array::NdArray,
    dtype::DType,
    error::{Error, Result},
};
use linkgrad_graph::{config::is_optimized_enabled, Function, FunctionHook, TypeInfoTuple};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::{Arc, Mutex};

pub fn array(values: &[f32], shape: &[usize]) -> Result<NdArray> {
    NdArray::from_slice(values, shape)
}

/// Uniform values in [-1, 1), reproducible per seed.
pub fn random(shape: &[usize], seed: u64) -> Result<NdArray> {
    let mut rng = StdRng::seed_from_u64(seed);
    let size: usize = shape.iter().product();
    NdArray::from_vec((0..size).map(|_| rng.gen_range(-1.0f32..1.0)).collect(), shape)
}

pub fn scalar(value: f32) -> Result<NdArray> {
    NdArray::from_vec(vec![value], &[1])
}

pub fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-6, "index {}: {} != {}", i, a, e);
    }
}

fn scale(x: &NdArray, factor: f64) -> Result<NdArray> {
    x.mul(&NdArray::full(x.shape(), x.dtype(), factor).with_device(x.device()))
}

/// y = factor * x
#[derive(Clone)]
pub struct Scale(pub f64);

impl Function for Scale {
    fn check_type_forward(&self, in_types: &TypeInfoTuple) -> Result<()> {
        in_types.expect_size(1)?;
        in_types.arg(0)?.expect_float()
    }

    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Ok(vec![scale(&inputs[0], self.0)?])
    }

    fn forward_accel(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        self.forward_cpu(inputs)
    }

    fn backward_cpu(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        Ok(vec![grad_outputs[0].as_ref().map(|gy| scale(gy, self.0)).transpose()?])
    }

    fn backward_accel(&mut self, inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        self.backward_cpu(inputs, grad_outputs)
    }
}

/// y = a + b
#[derive(Clone)]
pub struct Add;

impl Function for Add {
    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Ok(vec![inputs[0].add(&inputs[1])?])
    }

    fn backward_cpu(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        Ok(vec![grad_outputs[0].clone(), grad_outputs[0].clone()])
    }
}

/// Returns every input twice scaled: (2x, 3x).
#[derive(Clone)]
pub struct Split;

impl Function for Split {
    fn n_out(&self, _n_inputs: usize) -> usize {
        2
    }

    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Ok(vec![scale(&inputs[0], 2.0)?, scale(&inputs[0], 3.0)?])
    }

    fn backward_cpu(&mut self, inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        let mut gx = NdArray::zeros(inputs[0].shape(), inputs[0].dtype());
        if let Some(g) = &grad_outputs[0] {
            gx = gx.add(&scale(g, 2.0)?)?;
        }
        if let Some(g) = &grad_outputs[1] {
            gx = gx.add(&scale(g, 3.0)?)?;
        }
        Ok(vec![Some(gx)])
    }
}

/// Claims one output but returns two.
#[derive(Clone)]
pub struct BadArity;

impl Function for BadArity {
    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Ok(vec![inputs[0].clone(), inputs[0].clone()])
    }
}

/// Optimized path disagrees with the reference path by a factor of ten.
#[derive(Clone)]
pub struct Divergent;

impl Function for Divergent {
    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        let factor = if is_optimized_enabled() { 10.0 } else { 1.0 };
        Ok(vec![scale(&inputs[0], factor)?])
    }
}

/// Forward output shape depends on the kernel family.
#[derive(Clone)]
pub struct ShapeShifter;

impl Function for ShapeShifter {
    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        if is_optimized_enabled() {
            Ok(vec![inputs[0].clone()])
        } else {
            Ok(vec![inputs[0].reshape(&[inputs[0].size()])?])
        }
    }
}

/// Reference backward yields no gradient where the optimized one does.
#[derive(Clone)]
pub struct NoneGrad;

impl Function for NoneGrad {
    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Ok(vec![inputs[0].clone()])
    }

    fn backward_cpu(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        if is_optimized_enabled() {
            Ok(vec![grad_outputs[0].clone()])
        } else {
            Ok(vec![None])
        }
    }
}

/// Produces NaN.
#[derive(Clone)]
pub struct NanMaker;

impl Function for NanMaker {
    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        let x = &inputs[0];
        Ok(vec![NdArray::full(x.shape(), DType::F32, f64::NAN)])
    }
}

/// Appends `"<phase> <name> <function>"` to a shared log.
pub struct RecordingHook {
    pub name: String,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl RecordingHook {
    pub fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: Arc::clone(log),
        })
    }

    fn push(&self, phase: &str, function: &dyn Function) -> Result<()> {
        self.log
            .lock()
            .map_err(|_| Error::Lock)?
            .push(format!("{} {} {}", phase, self.name, function.label()));
        Ok(())
    }
}

impl FunctionHook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward_preprocess(&self, function: &dyn Function, _in_data: &[NdArray]) -> Result<()> {
        self.push("pre", function)
    }

    fn forward_postprocess(&self, function: &dyn Function, _in_data: &[NdArray]) -> Result<()> {
        self.push("post", function)
    }

    fn backward_preprocess(&self, function: &dyn Function, _in_data: &[NdArray], _out_grad: &[Option<NdArray>]) -> Result<()> {
        self.push("bpre", function)
    }

    fn backward_postprocess(&self, function: &dyn Function, _in_data: &[NdArray], _out_grad: &[Option<NdArray>]) -> Result<()> {
        self.push("bpost", function)
    }
}

/// Fails in forward preprocessing.
pub struct FailingHook;

impl FunctionHook for FailingHook {
    fn name(&self) -> &str {
        "FailingHook"
    }

    fn forward_preprocess(&self, function: &dyn Function, _in_data: &[NdArray]) -> Result<()> {
        Err(Error::InvalidState(format!("refusing to run {}", function.label())))
    }
}

/// Refuses to be registered.
pub struct RejectingHook;

impl FunctionHook for RejectingHook {
    fn name(&self) -> &str {
        "RejectingHook"
    }

    fn added(&self, _function: Option<&dyn Function>) -> Result<()> {
        Err(Error::InvalidState("RejectingHook cannot be added".into()))
    }
}

pub fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().map(|l| l.clone()).unwrap_or_default()
}
