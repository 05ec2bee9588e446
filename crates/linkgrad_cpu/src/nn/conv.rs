use crate::utils::Dims2d;
use rayon::prelude::*;

macro_rules! conv2d_op {
    ($type:ident, $zero:expr) => {
        paste::paste! {
            /// Unfolds `input` (N, C, H, W) into `col` laid out as (N, C, KH, KW, OH, OW).
            /// Taps that fall on padding are filled with `pad_value`.
            pub fn [<conv2d_im2col_ $type>](
                dims_and_strides: &[usize],
                input: &[$type],
                col: &mut [$type],
                pad_value: $type,
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let plane = d.plane_size();
                let output_size = d.output_size();
                let chunk_size = d.channels * d.kernel_size() * output_size;
                if chunk_size == 0 {
                    return;
                }

                col.par_chunks_mut(chunk_size).enumerate().for_each(|(b, col_chunk)| {
                    for c in 0..d.channels {
                        let input_offset = (b * d.channels + c) * plane;
                        for kh in 0..d.kernel_h {
                            for kw in 0..d.kernel_w {
                                let col_offset = (c * d.kernel_size() + kh * d.kernel_w + kw) * output_size;
                                for h_out in 0..d.out_h {
                                    for w_out in 0..d.out_w {
                                        col_chunk[col_offset + h_out * d.out_w + w_out] =
                                            match d.source_offset(h_out, w_out, kh, kw) {
                                                Some(offset) => input[input_offset + offset],
                                                None => pad_value,
                                            };
                                    }
                                }
                            }
                        }
                    }
                });
            }

            /// Folds `col` back onto `output`, summing the taps that overlap.
            pub fn [<conv2d_col2im_ $type>](
                dims_and_strides: &[usize],
                col: &[$type],
                output: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let plane = d.plane_size();
                let output_size = d.output_size();
                let chunk_size = d.channels * plane;
                if chunk_size == 0 {
                    return;
                }

                output.fill($zero);
                output.par_chunks_mut(chunk_size).enumerate().for_each(|(b, out_chunk)| {
                    let col_base = b * d.channels * d.kernel_size() * output_size;
                    for c in 0..d.channels {
                        for kh in 0..d.kernel_h {
                            for kw in 0..d.kernel_w {
                                let col_offset = col_base + (c * d.kernel_size() + kh * d.kernel_w + kw) * output_size;
                                for h_out in 0..d.out_h {
                                    for w_out in 0..d.out_w {
                                        if let Some(offset) = d.source_offset(h_out, w_out, kh, kw) {
                                            out_chunk[c * plane + offset] += col[col_offset + h_out * d.out_w + w_out];
                                        }
                                    }
                                }
                            }
                        }
                    }
                });
            }

            /// `weight` is (OC, C, KH, KW), `output` is (N, OC, OH, OW).
            pub fn [<conv2d_forward_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                input: &[$type],
                weight: &[$type],
                bias: Option<&[$type]>,
                output: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let patch = d.channels * d.kernel_size();
                let output_size = d.output_size();
                if out_channels * output_size == 0 {
                    return;
                }

                let mut col = vec![$zero; d.col_len()];
                [<conv2d_im2col_ $type>](dims_and_strides, input, &mut col, $zero);

                output.par_chunks_mut(out_channels * output_size).enumerate().for_each(|(b, out_chunk)| {
                    let col_chunk = &col[b * patch * output_size..(b + 1) * patch * output_size];
                    for oc in 0..out_channels {
                        let row = &weight[oc * patch..(oc + 1) * patch];
                        let dst = &mut out_chunk[oc * output_size..(oc + 1) * output_size];
                        dst.fill(bias.map_or($zero, |bias| bias[oc]));
                        for (k, &w) in row.iter().enumerate() {
                            let src = &col_chunk[k * output_size..(k + 1) * output_size];
                            for (y, &x) in dst.iter_mut().zip(src) {
                                *y += w * x;
                            }
                        }
                    }
                });
            }

            pub fn [<conv2d_backward_data_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                weight: &[$type],
                grad_output: &[$type],
                grad_input: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let patch = d.channels * d.kernel_size();
                let output_size = d.output_size();
                if patch * output_size == 0 {
                    grad_input.fill($zero);
                    return;
                }

                let mut grad_col = vec![$zero; d.col_len()];
                grad_col.par_chunks_mut(patch * output_size).enumerate().for_each(|(b, col_chunk)| {
                    let gy = &grad_output[b * out_channels * output_size..(b + 1) * out_channels * output_size];
                    for k in 0..patch {
                        let dst = &mut col_chunk[k * output_size..(k + 1) * output_size];
                        for oc in 0..out_channels {
                            let w = weight[oc * patch + k];
                            for (g, &y) in dst.iter_mut().zip(&gy[oc * output_size..(oc + 1) * output_size]) {
                                *g += w * y;
                            }
                        }
                    }
                });

                [<conv2d_col2im_ $type>](dims_and_strides, &grad_col, grad_input);
            }

            pub fn [<conv2d_backward_weight_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                input: &[$type],
                grad_output: &[$type],
                grad_weight: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let patch = d.channels * d.kernel_size();
                let output_size = d.output_size();
                if patch == 0 {
                    return;
                }

                let mut col = vec![$zero; d.col_len()];
                [<conv2d_im2col_ $type>](dims_and_strides, input, &mut col, $zero);

                grad_weight.par_chunks_mut(patch).enumerate().for_each(|(oc, gw_row)| {
                    gw_row.fill($zero);
                    for b in 0..d.batch_size {
                        let gy = &grad_output[(b * out_channels + oc) * output_size..(b * out_channels + oc + 1) * output_size];
                        let col_chunk = &col[b * patch * output_size..(b + 1) * patch * output_size];
                        for (k, gw) in gw_row.iter_mut().enumerate() {
                            let src = &col_chunk[k * output_size..(k + 1) * output_size];
                            *gw += gy.iter().zip(src).fold($zero, |acc, (&y, &x)| acc + y * x);
                        }
                    }
                });
            }

            pub fn [<conv2d_backward_bias_ $type>](
                dims_and_strides: &[usize],
                out_channels: usize,
                grad_output: &[$type],
                grad_bias: &mut [$type],
            ) {
                let d = Dims2d::from_slice(dims_and_strides);
                let output_size = d.output_size();

                for (oc, gb) in grad_bias.iter_mut().enumerate().take(out_channels) {
                    *gb = $zero;
                    for b in 0..d.batch_size {
                        let start = (b * out_channels + oc) * output_size;
                        *gb += grad_output[start..start + output_size].iter().fold($zero, |acc, &y| acc + y);
                    }
                }
            }
        }
    };
}

conv2d_op!(f32, 0.0f32);
conv2d_op!(f64, 0.0f64);

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1x3x3 input, 2x2 kernel, no padding, stride 1
    const DIMS: [usize; 12] = [1, 1, 3, 3, 2, 2, 2, 2, 0, 0, 1, 1];

    #[test]
    fn im2col_col2im_counts_overlaps() {
        let input = [1.0f32; 9];
        let mut col = vec![0.0f32; 16];
        conv2d_im2col_f32(&DIMS, &input, &mut col, 0.0);
        assert!(col.iter().all(|&v| v == 1.0));

        let mut folded = vec![0.0f32; 9];
        conv2d_col2im_f32(&DIMS, &col, &mut folded);
        assert_eq!(folded, vec![1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn forward_matches_hand_computed() {
        let input: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        let weight = [1.0f64, 0.0, 0.0, 1.0];
        let mut output = vec![0.0f64; 4];
        conv2d_forward_f64(&DIMS, 1, &input, &weight, Some(&[0.5]), &mut output);
        assert_eq!(output, vec![6.5, 8.5, 12.5, 14.5]);
    }

    #[test]
    fn backward_shapes_and_values() {
        let input: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        let weight = [1.0f64, 0.0, 0.0, 1.0];
        let gy = [1.0f64; 4];

        let mut gx = vec![0.0f64; 9];
        conv2d_backward_data_f64(&DIMS, 1, &weight, &gy, &mut gx);
        assert_eq!(gx, vec![1.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 1.0]);

        let mut gw = vec![0.0f64; 4];
        conv2d_backward_weight_f64(&DIMS, 1, &input, &gy, &mut gw);
        assert_eq!(gw, vec![12.0, 16.0, 24.0, 28.0]);

        let mut gb = vec![0.0f64; 1];
        conv2d_backward_bias_f64(&DIMS, 1, &gy, &mut gb);
        assert_eq!(gb, vec![4.0]);
    }
}
