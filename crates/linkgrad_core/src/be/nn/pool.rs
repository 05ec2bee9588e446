#![allow(unreachable_patterns)]

use crate::{
    array::{NdArray, Storage},
    be::{Geometry, KernelImpl},
    error::{Error, Result},
};
use linkgrad_cpu::nn::pool::*;
use linkgrad_opt::nn::pool::*;

fn check_shape(array: &NdArray, expected: &[usize], msg: &str) -> Result<()> {
    if array.shape() != expected {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            got: array.shape().to_vec(),
            msg: msg.into(),
        });
    }
    Ok(())
}

fn check_dtype(array: &NdArray, like: &NdArray) -> Result<()> {
    if array.dtype() != like.dtype() {
        return Err(Error::DTypeMismatch {
            expected: like.dtype(),
            got: array.dtype(),
        });
    }
    Ok(())
}

macro_rules! declare_pool2d_op {
    ([$($dtype:ident),* $(,)?]) => {
        paste::paste! {
            /// Returns the pooled array together with the winning in-window position of
            /// every output element.
            pub fn max_pool2d_forward(imp: KernelImpl, x: &NdArray, geom: &Geometry) -> Result<(NdArray, Vec<usize>)> {
                check_shape(x, &geom.input_shape(), "max pooling input")?;
                let dims = geom.to_dims();
                let out_shape = geom.output_shape(geom.channels);
                let size: usize = out_shape.iter().product();
                let mut indexes = vec![0usize; size];

                let storage = match x.storage() {
                    $(
                        Storage::$dtype(input) => {
                            let mut output = vec![[<$dtype:lower>]::default(); size];
                            match imp {
                                KernelImpl::Reference => [<max_pool2d_forward_ $dtype:lower>](&dims, input, &mut output, &mut indexes),
                                KernelImpl::Optimized => [<opt_max_pool2d_forward_ $dtype:lower>](&dims, input, &mut output, &mut indexes),
                            }
                            Storage::$dtype(output)
                        }
                    )*
                    _ => return Err(Error::UnsupportedDType),
                };

                Ok((NdArray::from_storage(storage, &out_shape)?.with_device(x.device()), indexes))
            }

            pub fn max_pool2d_backward(
                imp: KernelImpl,
                geom: &Geometry,
                indexes: &[usize],
                gy: &NdArray,
            ) -> Result<NdArray> {
                check_shape(gy, &geom.output_shape(geom.channels), "max pooling output gradient")?;
                if indexes.len() != gy.size() {
                    return Err(Error::InvalidState(format!(
                        "{} argmax indexes recorded for {} outputs",
                        indexes.len(),
                        gy.size()
                    )));
                }
                let dims = geom.to_dims();
                let in_shape = geom.input_shape();
                let size: usize = in_shape.iter().product();

                let storage = match gy.storage() {
                    $(
                        Storage::$dtype(grad_output) => {
                            let mut grad_input = vec![[<$dtype:lower>]::default(); size];
                            match imp {
                                KernelImpl::Reference => [<max_pool2d_backward_ $dtype:lower>](&dims, indexes, grad_output, &mut grad_input),
                                KernelImpl::Optimized => [<opt_max_pool2d_backward_ $dtype:lower>](&dims, indexes, grad_output, &mut grad_input),
                            }
                            Storage::$dtype(grad_input)
                        }
                    )*
                    _ => return Err(Error::UnsupportedDType),
                };

                Ok(NdArray::from_storage(storage, &in_shape)?.with_device(gy.device()))
            }

            pub fn avg_pool2d_forward(imp: KernelImpl, x: &NdArray, geom: &Geometry) -> Result<NdArray> {
                check_shape(x, &geom.input_shape(), "average pooling input")?;
                let dims = geom.to_dims();
                let out_shape = geom.output_shape(geom.channels);
                let size: usize = out_shape.iter().product();

                let storage = match x.storage() {
                    $(
                        Storage::$dtype(input) => {
                            let mut output = vec![[<$dtype:lower>]::default(); size];
                            match imp {
                                KernelImpl::Reference => [<avg_pool2d_forward_ $dtype:lower>](&dims, input, &mut output),
                                KernelImpl::Optimized => [<opt_avg_pool2d_forward_ $dtype:lower>](&dims, input, &mut output),
                            }
                            Storage::$dtype(output)
                        }
                    )*
                    _ => return Err(Error::UnsupportedDType),
                };

                Ok(NdArray::from_storage(storage, &out_shape)?.with_device(x.device()))
            }

            pub fn avg_pool2d_backward(imp: KernelImpl, geom: &Geometry, x: &NdArray, gy: &NdArray) -> Result<NdArray> {
                check_shape(gy, &geom.output_shape(geom.channels), "average pooling output gradient")?;
                check_dtype(gy, x)?;
                let dims = geom.to_dims();
                let in_shape = geom.input_shape();
                let size: usize = in_shape.iter().product();

                let storage = match gy.storage() {
                    $(
                        Storage::$dtype(grad_output) => {
                            let mut grad_input = vec![[<$dtype:lower>]::default(); size];
                            match imp {
                                KernelImpl::Reference => [<avg_pool2d_backward_ $dtype:lower>](&dims, grad_output, &mut grad_input),
                                KernelImpl::Optimized => [<opt_avg_pool2d_backward_ $dtype:lower>](&dims, grad_output, &mut grad_input),
                            }
                            Storage::$dtype(grad_input)
                        }
                    )*
                    _ => return Err(Error::UnsupportedDType),
                };

                Ok(NdArray::from_storage(storage, &in_shape)?.with_device(x.device()))
            }
        }
    };
}

declare_pool2d_op!([F32, F64]);
