use super::conv::*;
use crate::utils::Dims2d;
use rayon::prelude::*;

macro_rules! pool2d_op {
    ($type:ident, $zero:expr) => {
        paste::paste! {
            /// Writes the window maximum to `output` and the in-window position of the
            /// first maximum to `indexes`. Padding takes part as negative infinity.
            pub fn [<max_pool2d_forward_ $type>](
                dims_and_strides: &[usize],
                input: &[$type],
                output: &mut [$type],
                indexes: &mut [usize],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let window = d.kernel_size();
                let output_size = d.output_size();
                if window == 0 || output_size == 0 {
                    return;
                }

                let mut col = vec![$zero; d.col_len()];
                [<conv2d_im2col_ $type>](dims_and_strides, input, &mut col, $type::NEG_INFINITY);

                output
                    .par_chunks_mut(output_size)
                    .zip(indexes.par_chunks_mut(output_size))
                    .enumerate()
                    .for_each(|(plane, (out_plane, idx_plane))| {
                        let col_plane = &col[plane * window * output_size..(plane + 1) * window * output_size];
                        for p in 0..output_size {
                            let mut best = col_plane[p];
                            let mut best_k = 0;
                            for k in 1..window {
                                let v = col_plane[k * output_size + p];
                                if v > best {
                                    best = v;
                                    best_k = k;
                                }
                            }
                            out_plane[p] = best;
                            idx_plane[p] = best_k;
                        }
                    });
            }

            /// Routes each output gradient to the input element that won its window.
            pub fn [<max_pool2d_backward_ $type>](
                dims_and_strides: &[usize],
                indexes: &[usize],
                grad_output: &[$type],
                grad_input: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let window = d.kernel_size();
                let output_size = d.output_size();
                if window == 0 || output_size == 0 {
                    grad_input.fill($zero);
                    return;
                }

                let mut grad_col = vec![$zero; d.col_len()];
                grad_col.par_chunks_mut(window * output_size).enumerate().for_each(|(plane, col_plane)| {
                    let gy = &grad_output[plane * output_size..(plane + 1) * output_size];
                    let idx = &indexes[plane * output_size..(plane + 1) * output_size];
                    for p in 0..output_size {
                        col_plane[idx[p] * output_size + p] = gy[p];
                    }
                });

                [<conv2d_col2im_ $type>](dims_and_strides, &grad_col, grad_input);
            }

            /// Window mean. Padding counts towards the window size.
            pub fn [<avg_pool2d_forward_ $type>](
                dims_and_strides: &[usize],
                input: &[$type],
                output: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let window = d.kernel_size();
                let output_size = d.output_size();
                if window == 0 || output_size == 0 {
                    return;
                }

                let mut col = vec![$zero; d.col_len()];
                [<conv2d_im2col_ $type>](dims_and_strides, input, &mut col, $zero);

                let coeff = window as $type;
                output.par_chunks_mut(output_size).enumerate().for_each(|(plane, out_plane)| {
                    let col_plane = &col[plane * window * output_size..(plane + 1) * window * output_size];
                    for p in 0..output_size {
                        let mut sum = $zero;
                        for k in 0..window {
                            sum += col_plane[k * output_size + p];
                        }
                        out_plane[p] = sum / coeff;
                    }
                });
            }

            pub fn [<avg_pool2d_backward_ $type>](
                dims_and_strides: &[usize],
                grad_output: &[$type],
                grad_input: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let window = d.kernel_size();
                let output_size = d.output_size();
                if window == 0 || output_size == 0 {
                    grad_input.fill($zero);
                    return;
                }

                let coeff = window as $type;
                let mut grad_col = vec![$zero; d.col_len()];
                grad_col.par_chunks_mut(window * output_size).enumerate().for_each(|(plane, col_plane)| {
                    let gy = &grad_output[plane * output_size..(plane + 1) * output_size];
                    for k in 0..window {
                        for p in 0..output_size {
                            col_plane[k * output_size + p] = gy[p] / coeff;
                        }
                    }
                });

                [<conv2d_col2im_ $type>](dims_and_strides, &grad_col, grad_input);
            }
        }
    };
}

pool2d_op!(f32, 0.0f32);
pool2d_op!(f64, 0.0f64);
