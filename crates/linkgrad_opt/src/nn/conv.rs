use crate::primitive::{get_or_create, PrimitiveKey, PrimitiveKind};
use rayon::prelude::*;

macro_rules! conv2d_op {
    ($type:ident, $zero:expr) => {
        paste::paste! {
            /// Direct convolution: one task per (batch, out channel) plane.
            pub fn [<opt_conv2d_forward_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                input: &[$type],
                weight: &[$type],
                bias: Option<&[$type]>,
                output: &mut [$type],
            ) {
                let table = get_or_create(PrimitiveKey::new(PrimitiveKind::Conv2d, dims_and_strides));
                let channels = dims_and_strides[1];
                let plane = dims_and_strides[2] * dims_and_strides[3];
                let window = table.window();
                let output_size = table.output_size();
                if out_channels == 0 || output_size == 0 {
                    return;
                }

                output.par_chunks_mut(output_size).enumerate().for_each(|(i, out_plane)| {
                    let (b, oc) = (i / out_channels, i % out_channels);
                    let init = bias.map_or($zero, |bias| bias[oc]);
                    for p in 0..output_size {
                        let taps = table.taps(p);
                        let mut acc = init;
                        for c in 0..channels {
                            let x = &input[(b * channels + c) * plane..(b * channels + c + 1) * plane];
                            let w = &weight[(oc * channels + c) * window..(oc * channels + c + 1) * window];
                            for (k, tap) in taps.iter().enumerate() {
                                if let Some(offset) = tap {
                                    acc += w[k] * x[*offset];
                                }
                            }
                        }
                        out_plane[p] = acc;
                    }
                });
            }

            pub fn [<opt_conv2d_backward_data_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                weight: &[$type],
                grad_output: &[$type],
                grad_input: &mut [$type],
            ) {
                let table = get_or_create(PrimitiveKey::new(PrimitiveKind::Conv2d, dims_and_strides));
                let channels = dims_and_strides[1];
                let plane = dims_and_strides[2] * dims_and_strides[3];
                let window = table.window();
                let output_size = table.output_size();

                grad_input.fill($zero);
                if plane == 0 || channels == 0 {
                    return;
                }

                grad_input.par_chunks_mut(plane).enumerate().for_each(|(i, gx)| {
                    let (b, c) = (i / channels, i % channels);
                    for oc in 0..out_channels {
                        let gy = &grad_output[(b * out_channels + oc) * output_size..(b * out_channels + oc + 1) * output_size];
                        let w = &weight[(oc * channels + c) * window..(oc * channels + c + 1) * window];
                        for p in 0..output_size {
                            for (k, tap) in table.taps(p).iter().enumerate() {
                                if let Some(offset) = tap {
                                    gx[*offset] += w[k] * gy[p];
                                }
                            }
                        }
                    }
                });
            }

            pub fn [<opt_conv2d_backward_weight_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                input: &[$type],
                grad_output: &[$type],
                grad_weight: &mut [$type],
            ) {
                let table = get_or_create(PrimitiveKey::new(PrimitiveKind::Conv2d, dims_and_strides));
                let batch_size = dims_and_strides[0];
                let channels = dims_and_strides[1];
                let plane = dims_and_strides[2] * dims_and_strides[3];
                let window = table.window();
                let output_size = table.output_size();

                grad_weight.fill($zero);
                if window == 0 || channels == 0 {
                    return;
                }

                grad_weight.par_chunks_mut(window).enumerate().for_each(|(i, gw)| {
                    let (oc, c) = (i / channels, i % channels);
                    for b in 0..batch_size {
                        let x = &input[(b * channels + c) * plane..(b * channels + c + 1) * plane];
                        let gy = &grad_output[(b * out_channels + oc) * output_size..(b * out_channels + oc + 1) * output_size];
                        for p in 0..output_size {
                            for (k, tap) in table.taps(p).iter().enumerate() {
                                if let Some(offset) = tap {
                                    gw[k] += gy[p] * x[*offset];
                                }
                            }
                        }
                    }
                });
            }

            pub fn [<opt_conv2d_backward_bias_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                grad_output: &[$type],
                grad_bias: &mut [$type],
            ) {
                let batch_size = dims_and_strides[0];
                let output_size = dims_and_strides[6] * dims_and_strides[7];

                grad_bias.par_iter_mut().enumerate().take(out_channels).for_each(|(oc, gb)| {
                    *gb = (0..batch_size)
                        .flat_map(|b| {
                            let start = (b * out_channels + oc) * output_size;
                            grad_output[start..start + output_size].iter()
                        })
                        .fold($zero, |acc, &y| acc + y);
                });
            }
        }
    };
}

conv2d_op!(f32, 0.0f32);
conv2d_op!(f64, 0.0f64);
