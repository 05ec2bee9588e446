use crate::kernel_impl;
use linkgrad_core::{
    array::NdArray,
    be::{
        nn::pool::{avg_pool2d_backward, avg_pool2d_forward, max_pool2d_backward, max_pool2d_forward},
        Geometry, KernelImpl,
    },
    error::{Error, Result},
};
use linkgrad_graph::{apply, Function, Input, TypeInfoTuple, Variable};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Window parameters shared by the 2-d pooling functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pooling2DParams {
    pub kh: usize,
    pub kw: usize,
    pub sy: usize,
    pub sx: usize,
    pub ph: usize,
    pub pw: usize,
    pub cover_all: bool,
}

impl Pooling2DParams {
    /// Stride defaults to the window size.
    pub fn new(ksize: (usize, usize), stride: Option<(usize, usize)>, pad: (usize, usize)) -> Self {
        let (sy, sx) = stride.unwrap_or(ksize);
        Self {
            kh: ksize.0,
            kw: ksize.1,
            sy,
            sx,
            ph: pad.0,
            pw: pad.1,
            cover_all: false,
        }
    }

    pub fn square(ksize: usize, stride: Option<usize>, pad: usize) -> Self {
        Self::new((ksize, ksize), stride.map(|s| (s, s)), (pad, pad))
    }

    pub fn with_cover_all(mut self, cover_all: bool) -> Self {
        self.cover_all = cover_all;
        self
    }

    pub fn geometry(&self, input_shape: &[usize]) -> Result<Geometry> {
        Geometry::new(
            input_shape,
            (self.kh, self.kw),
            (self.sy, self.sx),
            (self.ph, self.pw),
            self.cover_all,
        )
    }
}

fn single_input<'a>(function: &str, inputs: &'a [NdArray]) -> Result<&'a NdArray> {
    match inputs {
        [x] => Ok(x),
        _ => Err(Error::InvalidArgument(format!(
            "{} expects one input, got {}",
            function,
            inputs.len()
        ))),
    }
}

fn check_pooling_input(in_types: &TypeInfoTuple) -> Result<()> {
    in_types.expect_size(1)?;
    let x = in_types.arg(0)?;
    x.expect_float()?;
    x.expect_ndim(4)
}

// ────────────────────────────────────────────────────────────────────────────
// max pooling

#[derive(Debug, Clone)]
pub struct MaxPooling2D {
    params: Pooling2DParams,
    // geometry and argmax of the last forward
    saved: Option<(Geometry, Vec<usize>)>,
}

impl MaxPooling2D {
    pub fn new(params: Pooling2DParams) -> Self {
        Self { params, saved: None }
    }

    pub fn params(&self) -> &Pooling2DParams {
        &self.params
    }

    fn run_forward(&mut self, imp: KernelImpl, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        let x = single_input("MaxPooling2D", inputs)?;
        let geom = self.params.geometry(x.shape())?;
        let (y, indexes) = max_pool2d_forward(imp, x, &geom)?;
        self.saved = Some((geom, indexes));
        Ok(vec![y])
    }

    fn run_backward(&self, imp: KernelImpl, grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        let Some(gy) = &grad_outputs[0] else {
            return Ok(vec![None]);
        };
        let (geom, indexes) = self
            .saved
            .as_ref()
            .ok_or_else(|| Error::InvalidState("MaxPooling2D: backward before forward".into()))?;
        Ok(vec![Some(max_pool2d_backward(imp, geom, indexes, gy)?)])
    }
}

impl Function for MaxPooling2D {
    fn check_type_forward(&self, in_types: &TypeInfoTuple) -> Result<()> {
        check_pooling_input(in_types)
    }

    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        self.run_forward(kernel_impl(), inputs)
    }

    fn forward_accel(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        self.run_forward(KernelImpl::Optimized, inputs)
    }

    fn backward_cpu(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        self.run_backward(kernel_impl(), grad_outputs)
    }

    fn backward_accel(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        self.run_backward(KernelImpl::Optimized, grad_outputs)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// average pooling

/// Padding counts towards the window, so every output divides by `kh * kw`.
#[derive(Debug, Clone)]
pub struct AveragePooling2D {
    params: Pooling2DParams,
}

impl AveragePooling2D {
    pub fn new(params: Pooling2DParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Pooling2DParams {
        &self.params
    }

    fn run_forward(&self, imp: KernelImpl, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        let x = single_input("AveragePooling2D", inputs)?;
        let geom = self.params.geometry(x.shape())?;
        Ok(vec![avg_pool2d_forward(imp, x, &geom)?])
    }

    fn run_backward(
        &self,
        imp: KernelImpl,
        inputs: &[NdArray],
        grad_outputs: &[Option<NdArray>],
    ) -> Result<Vec<Option<NdArray>>> {
        let Some(gy) = &grad_outputs[0] else {
            return Ok(vec![None]);
        };
        let x = single_input("AveragePooling2D", inputs)?;
        let geom = self.params.geometry(x.shape())?;
        Ok(vec![Some(avg_pool2d_backward(imp, &geom, x, gy)?)])
    }
}

impl Function for AveragePooling2D {
    fn check_type_forward(&self, in_types: &TypeInfoTuple) -> Result<()> {
        check_pooling_input(in_types)
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

/// Spatial max pooling with a square window.
pub fn max_pooling_2d(x: impl Into<Input>, ksize: usize, stride: Option<usize>, pad: usize) -> Result<Variable> {
    apply(MaxPooling2D::new(Pooling2DParams::square(ksize, stride, pad)), [x])?.one()
}

/// Spatial average pooling with a square window.
pub fn average_pooling_2d(x: impl Into<Input>, ksize: usize, stride: Option<usize>, pad: usize) -> Result<Variable> {
    apply(AveragePooling2D::new(Pooling2DParams::square(ksize, stride, pad)), [x])?.one()
}
