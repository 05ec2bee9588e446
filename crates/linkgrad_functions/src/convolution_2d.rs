use crate::kernel_impl;
use linkgrad_core::{
    array::NdArray,
    be::{
        nn::conv::{conv2d_backward, conv2d_forward},
        Geometry, KernelImpl,
    },
    error::{Error, Result},
};
use linkgrad_graph::{apply, Function, Input, TypeInfoTuple, Variable};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Two-dimensional convolution of `x (N, C, H, W)` with `W (O, C, KH, KW)` and an
/// optional bias `b (O,)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Convolution2DFunction {
    pub stride: (usize, usize),
    pub pad: (usize, usize),
    pub cover_all: bool,
}

fn data_and_weight(inputs: &[NdArray]) -> Result<(&NdArray, &NdArray)> {
    match inputs {
        [x, weight] | [x, weight, _] => Ok((x, weight)),
        _ => Err(Error::InvalidArgument(format!(
            "Convolution2DFunction expects 2 or 3 inputs, got {}",
            inputs.len()
        ))),
    }
}

impl Default for Convolution2DFunction {
    fn default() -> Self {
        Self {
            stride: (1, 1),
            pad: (0, 0),
            cover_all: false,
        }
    }
}

impl Convolution2DFunction {
    pub fn new(stride: usize, pad: usize) -> Self {
        Self {
            stride: (stride, stride),
            pad: (pad, pad),
            cover_all: false,
        }
    }

    pub fn with_cover_all(mut self, cover_all: bool) -> Self {
        self.cover_all = cover_all;
        self
    }

    fn geometry(&self, x: &NdArray, weight: &NdArray) -> Result<Geometry> {
        let kernel = match weight.shape() {
            [_, _, kh, kw] => (*kh, *kw),
            _ => (0, 0),
        };
        Geometry::new(x.shape(), kernel, self.stride, self.pad, self.cover_all)
    }

    fn run_forward(&self, imp: KernelImpl, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        let (x, weight) = data_and_weight(inputs)?;
        let geom = self.geometry(x, weight)?;
        Ok(vec![conv2d_forward(imp, x, weight, inputs.get(2), &geom)?])
    }

    fn run_backward(
        &self,
        imp: KernelImpl,
        inputs: &[NdArray],
        grad_outputs: &[Option<NdArray>],
    ) -> Result<Vec<Option<NdArray>>> {
        let Some(gy) = &grad_outputs[0] else {
            return Ok(vec![None; inputs.len()]);
        };
        let (x, weight) = data_and_weight(inputs)?;
        let geom = self.geometry(x, weight)?;
        let with_bias = inputs.len() == 3;

        let (gx, gw, gb) = conv2d_backward(imp, x, weight, gy, with_bias, &geom)?;
        let mut grads = vec![Some(gx), Some(gw)];
        if with_bias {
            grads.push(gb);
        }
        Ok(grads)
    }
}

impl Function for Convolution2DFunction {
    fn check_type_forward(&self, in_types: &TypeInfoTuple) -> Result<()> {
        in_types.expect_size_between(2, 3)?;

        let x = in_types.arg(0)?;
        let w = in_types.arg(1)?;
        x.expect_float()?;
        w.expect_float()?;
        x.expect_ndim(4)?;
        w.expect_ndim(4)?;
        x.expect_dim_eq(1, w, 1)?;

        if let Some(b) = in_types.get(2) {
            b.expect_dtype(x.dtype())?;
            b.expect_ndim(1)?;
            b.expect_dim_eq(0, w, 0)?;
        }
        Ok(())
    }

    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        self.run_forward(kernel_impl(), inputs)
    }

    fn forward_accel(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        self.run_forward(KernelImpl::Optimized, inputs)
    }

    fn backward_cpu(&mut self, inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        self.run_backward(kernel_impl(), inputs, grad_outputs)
    }

    fn backward_accel(&mut self, inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        self.run_backward(KernelImpl::Optimized, inputs, grad_outputs)
    }
}

pub fn convolution_2d(
    x: impl Into<Input>,
    weight: impl Into<Input>,
    bias: Option<Input>,
    stride: usize,
    pad: usize,
) -> Result<Variable> {
    let mut inputs = vec![x.into(), weight.into()];
    inputs.extend(bias);
    apply(Convolution2DFunction::new(stride, pad), inputs)?.one()
}
