use linkgrad_core::{array::NdArray, error::Result};
use linkgrad_graph::{apply, Function, Input, Variable};

/// Passes every input through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Function for Identity {
    fn n_out(&self, n_inputs: usize) -> usize {
        n_inputs
    }

    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Ok(inputs.to_vec())
    }

    fn forward_accel(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Ok(inputs.to_vec())
    }

    fn backward_cpu(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        Ok(grad_outputs.to_vec())
    }

    fn backward_accel(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        Ok(grad_outputs.to_vec())
    }
}

pub fn identity<I, T>(inputs: I) -> Result<Vec<Variable>>
where
    I: IntoIterator<Item = T>,
    T: Into<Input>,
{
    Ok(apply(Identity, inputs)?.into_vec())
}
