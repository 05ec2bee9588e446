use crate::primitive::{get_or_create, PrimitiveKey, PrimitiveKind};
use rayon::prelude::*;

macro_rules! pool2d_op {
    ($type:ident, $zero:expr) => {
        paste::paste! {
            pub fn [<opt_max_pool2d_forward_ $type>](
                dims_and_strides: &[usize],
                input: &[$type],
                output: &mut [$type],
                indexes: &mut [usize],
            ) {
                let table = get_or_create(PrimitiveKey::new(PrimitiveKind::MaxPool2d, dims_and_strides));
                let plane = dims_and_strides[2] * dims_and_strides[3];
                let output_size = table.output_size();
                if table.window() == 0 || output_size == 0 {
                    return;
                }

                output
                    .par_chunks_mut(output_size)
                    .zip(indexes.par_chunks_mut(output_size))
                    .enumerate()
                    .for_each(|(c, (out_plane, idx_plane))| {
                        let x = &input[c * plane..(c + 1) * plane];
                        for p in 0..output_size {
                            let mut best = $type::NEG_INFINITY;
                            let mut best_k = 0;
                            for (k, tap) in table.taps(p).iter().enumerate() {
                                let v = tap.map_or($type::NEG_INFINITY, |offset| x[offset]);
                                if k == 0 || v > best {
                                    best = v;
                                    best_k = k;
                                }
                            }
                            out_plane[p] = best;
                            idx_plane[p] = best_k;
                        }
                    });
            }

            pub fn [<opt_max_pool2d_backward_ $type>](
                dims_and_strides: &[usize],
                indexes: &[usize],
                grad_output: &[$type],
                grad_input: &mut [$type],
            ) {
                let table = get_or_create(PrimitiveKey::new(PrimitiveKind::MaxPool2d, dims_and_strides));
                let plane = dims_and_strides[2] * dims_and_strides[3];
                let output_size = table.output_size();

                grad_input.fill($zero);
                if plane == 0 || output_size == 0 {
                    return;
                }

                grad_input.par_chunks_mut(plane).enumerate().for_each(|(c, gx)| {
                    let gy = &grad_output[c * output_size..(c + 1) * output_size];
                    let idx = &indexes[c * output_size..(c + 1) * output_size];
                    for p in 0..output_size {
                        if let Some(offset) = table.taps(p)[idx[p]] {
                            gx[offset] += gy[p];
                        }
                    }
                });
            }

            pub fn [<opt_avg_pool2d_forward_ $type>](
                dims_and_strides: &[usize],
                input: &[$type],
                output: &mut [$type],
            ) {
                let table = get_or_create(PrimitiveKey::new(PrimitiveKind::AvgPool2d, dims_and_strides));
                let plane = dims_and_strides[2] * dims_and_strides[3];
                let output_size = table.output_size();
                if table.window() == 0 || output_size == 0 {
                    return;
                }

                let coeff = table.window() as $type;
                output.par_chunks_mut(output_size).enumerate().for_each(|(c, out_plane)| {
                    let x = &input[c * plane..(c + 1) * plane];
                    for p in 0..output_size {
                        let sum = table
                            .taps(p)
                            .iter()
                            .flatten()
                            .fold($zero, |acc, &offset| acc + x[offset]);
                        out_plane[p] = sum / coeff;
                    }
                });
            }

            pub fn [<opt_avg_pool2d_backward_ $type>](
                dims_and_strides: &[usize],
                grad_output: &[$type],
                grad_input: &mut [$type],
            ) {
                let table = get_or_create(PrimitiveKey::new(PrimitiveKind::AvgPool2d, dims_and_strides));
                let plane = dims_and_strides[2] * dims_and_strides[3];
                let output_size = table.output_size();

                grad_input.fill($zero);
                if plane == 0 || output_size == 0 || table.window() == 0 {
                    return;
                }

                let coeff = table.window() as $type;
                grad_input.par_chunks_mut(plane).enumerate().for_each(|(c, gx)| {
                    let gy = &grad_output[c * output_size..(c + 1) * output_size];
                    for p in 0..output_size {
                        let g = gy[p] / coeff;
                        for &offset in table.taps(p).iter().flatten() {
                            gx[offset] += g;
                        }
                    }
                });
            }
        }
    };
}

pool2d_op!(f32, 0.0f32);
pool2d_op!(f64, 0.0f64);
