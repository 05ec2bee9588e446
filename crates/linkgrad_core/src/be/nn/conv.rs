#![allow(unreachable_patterns)]

use crate::{
    array::{NdArray, Storage},
    be::{Geometry, KernelImpl},
    error::{Error, Result},
};
use linkgrad_cpu::nn::conv::*;
use linkgrad_opt::nn::conv::*;

/// Validates `weight` as (OC, C, KH, KW) against `geom` and returns OC.
fn out_channels(weight: &NdArray, geom: &Geometry) -> Result<usize> {
    let expected = [weight.dim_size(0).unwrap_or(0), geom.channels, geom.kernel_h, geom.kernel_w];
    if weight.shape() != expected {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            got: weight.shape().to_vec(),
            msg: "convolution weight".into(),
        });
    }
    Ok(expected[0])
}

macro_rules! declare_conv2d_op {
    ([$($dtype:ident),* $(,)?]) => {
        paste::paste! {
            pub fn conv2d_forward(
                imp: KernelImpl,
                x: &NdArray,
                weight: &NdArray,
                bias: Option<&NdArray>,
                geom: &Geometry,
            ) -> Result<NdArray> {
                let out_channels = out_channels(weight, geom)?;
                if x.shape() != geom.input_shape() {
                    return Err(Error::ShapeMismatch {
                        expected: geom.input_shape().to_vec(),
                        got: x.shape().to_vec(),
                        msg: "convolution input".into(),
                    });
                }
                let dims = geom.to_dims();
                let out_shape = geom.output_shape(out_channels);
                let size: usize = out_shape.iter().product();

                let storage = match x.storage() {
                    $(
                        Storage::$dtype(input) => {
                            let w = weight.as_slice::<[<$dtype:lower>]>()?;
                            let b = bias.map(|b| b.as_slice::<[<$dtype:lower>]>()).transpose()?;
                            let mut output = vec![[<$dtype:lower>]::default(); size];
                            match imp {
                                KernelImpl::Reference => [<conv2d_forward_ $dtype:lower>](&dims, out_channels, input, w, b, &mut output),
                                KernelImpl::Optimized => [<opt_conv2d_forward_ $dtype:lower>](&dims, out_channels, input, w, b, &mut output),
                            }
                            Storage::$dtype(output)
                        }
                    )*
                    _ => return Err(Error::UnsupportedDType),
                };

                Ok(NdArray::from_storage(storage, &out_shape)?.with_device(x.device()))
            }

            /// Returns the gradients of input, weight and (when requested) bias.
            pub fn conv2d_backward(
                imp: KernelImpl,
                x: &NdArray,
                weight: &NdArray,
                gy: &NdArray,
                with_bias: bool,
                geom: &Geometry,
            ) -> Result<(NdArray, NdArray, Option<NdArray>)> {
                let out_channels = out_channels(weight, geom)?;
                let out_shape = geom.output_shape(out_channels);
                if gy.shape() != out_shape {
                    return Err(Error::ShapeMismatch {
                        expected: out_shape.to_vec(),
                        got: gy.shape().to_vec(),
                        msg: "convolution output gradient".into(),
                    });
                }
                let dims = geom.to_dims();
                let in_shape = geom.input_shape();

                let (gx, gw, gb) = match gy.storage() {
                    $(
                        Storage::$dtype(grad_output) => {
                            let input = x.as_slice::<[<$dtype:lower>]>()?;
                            let w = weight.as_slice::<[<$dtype:lower>]>()?;
                            let mut gx = vec![[<$dtype:lower>]::default(); x.size()];
                            let mut gw = vec![[<$dtype:lower>]::default(); weight.size()];
                            let mut gb = vec![[<$dtype:lower>]::default(); if with_bias { out_channels } else { 0 }];
                            match imp {
                                KernelImpl::Reference => {
                                    [<conv2d_backward_data_ $dtype:lower>](&dims, out_channels, w, grad_output, &mut gx);
                                    [<conv2d_backward_weight_ $dtype:lower>](&dims, out_channels, input, grad_output, &mut gw);
                                    [<conv2d_backward_bias_ $dtype:lower>](&dims, out_channels, grad_output, &mut gb);
                                }
                                KernelImpl::Optimized => {
                                    [<opt_conv2d_backward_data_ $dtype:lower>](&dims, out_channels, w, grad_output, &mut gx);
                                    [<opt_conv2d_backward_weight_ $dtype:lower>](&dims, out_channels, input, grad_output, &mut gw);
                                    [<opt_conv2d_backward_bias_ $dtype:lower>](&dims, out_channels, grad_output, &mut gb);
                                }
                            }
                            (Storage::$dtype(gx), Storage::$dtype(gw), Storage::$dtype(gb))
                        }
                    )*
                    _ => return Err(Error::UnsupportedDType),
                };

                let device = x.device();
                let gx = NdArray::from_storage(gx, &in_shape)?.with_device(device);
                let gw = NdArray::from_storage(gw, weight.shape())?.with_device(device);
                let gb = if with_bias {
                    Some(NdArray::from_storage(gb, &[out_channels])?.with_device(device))
                } else {
                    None
                };
                Ok((gx, gw, gb))
            }
        }
    };
}

declare_conv2d_op!([F32, F64]);
