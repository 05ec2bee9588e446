pub mod nn;

use crate::error::{Error, Result};

/// Which kernel family executes a host-side computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelImpl {
    /// im2col based kernels from `linkgrad_cpu`.
    Reference,
    /// Gather-table kernels from `linkgrad_opt`, sharing cached primitives.
    Optimized,
}

impl KernelImpl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Optimized => "optimized",
        }
    }
}

/// Output extent of a sliding window along one axis.
///
/// With `cover_all` the last window may run past the padded input so that every
/// input element is covered by at least one window.
pub fn get_conv_outsize(size: usize, kernel: usize, stride: usize, pad: usize, cover_all: bool) -> Result<usize> {
    if stride == 0 {
        return Err(Error::InvalidArgument("stride must be positive".into()));
    }
    if kernel == 0 {
        return Err(Error::InvalidArgument("kernel size must be positive".into()));
    }
    let padded = size + 2 * pad;
    if padded < kernel {
        return Err(Error::IncompatibleShape(format!(
            "kernel {} does not fit into padded extent {}",
            kernel, padded
        )));
    }

    Ok(if cover_all {
        (padded - kernel + stride - 1) / stride + 1
    } else {
        (padded - kernel) / stride + 1
    })
}

/// Sliding window geometry over an (N, C, H, W) input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub batch_size: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub pad_h: usize,
    pub pad_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
}

impl Geometry {
    pub fn new(
        input_shape: &[usize],
        kernel: (usize, usize),
        stride: (usize, usize),
        pad: (usize, usize),
        cover_all: bool,
    ) -> Result<Self> {
        let [batch_size, channels, height, width] = <[usize; 4]>::try_from(input_shape).map_err(|_| {
            Error::IncompatibleShape(format!("expected a 4-d (N, C, H, W) input, got {:?}", input_shape))
        })?;

        Ok(Self {
            batch_size,
            channels,
            height,
            width,
            kernel_h: kernel.0,
            kernel_w: kernel.1,
            out_h: get_conv_outsize(height, kernel.0, stride.0, pad.0, cover_all)?,
            out_w: get_conv_outsize(width, kernel.1, stride.1, pad.1, cover_all)?,
            pad_h: pad.0,
            pad_w: pad.1,
            stride_h: stride.0,
            stride_w: stride.1,
        })
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [self.batch_size, self.channels, self.height, self.width]
    }

    pub fn output_shape(&self, channels: usize) -> [usize; 4] {
        [self.batch_size, channels, self.out_h, self.out_w]
    }

    pub fn to_dims(&self) -> [usize; 12] {
        [
            self.batch_size,
            self.channels,
            self.height,
            self.width,
            self.kernel_h,
            self.kernel_w,
            self.out_h,
            self.out_w,
            self.pad_h,
            self.pad_w,
            self.stride_h,
            self.stride_w,
        ]
    }
}
