/// Window geometry shared by convolution and pooling kernels.
///
/// Kernels receive it flattened as
/// `[batch, channels, height, width, kernel_h, kernel_w, out_h, out_w, pad_h, pad_w, stride_h, stride_w]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dims2d {
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

impl Dims2d {
    pub const LEN: usize = 12;

    /// # Panics
    ///
    /// Panics if `dims_and_strides` holds fewer than [`Dims2d::LEN`] entries.
    #[inline]
    pub fn from_slice(dims_and_strides: &[usize]) -> Self {
        Self {
            batch_size: dims_and_strides[0],
            channels: dims_and_strides[1],
            height: dims_and_strides[2],
            width: dims_and_strides[3],
            kernel_h: dims_and_strides[4],
            kernel_w: dims_and_strides[5],
            out_h: dims_and_strides[6],
            out_w: dims_and_strides[7],
            pad_h: dims_and_strides[8],
            pad_w: dims_and_strides[9],
            stride_h: dims_and_strides[10],
            stride_w: dims_and_strides[11],
        }
    }

    #[inline]
    pub fn plane_size(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn kernel_size(&self) -> usize {
        self.kernel_h * self.kernel_w
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.out_h * self.out_w
    }

    #[inline]
    pub fn col_len(&self) -> usize {
        self.batch_size * self.channels * self.kernel_size() * self.output_size()
    }

    /// Offset inside an input plane read by output position `(h_out, w_out)` at
    /// kernel tap `(kh, kw)`, or `None` when the tap falls on padding.
    #[inline]
    pub fn source_offset(&self, h_out: usize, w_out: usize, kh: usize, kw: usize) -> Option<usize> {
        let h_in = (h_out * self.stride_h + kh).checked_sub(self.pad_h)?;
        let w_in = (w_out * self.stride_w + kw).checked_sub(self.pad_w)?;
        if h_in < self.height && w_in < self.width {
            Some(h_in * self.width + w_in)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_offset_skips_padding() {
        let dims = Dims2d::from_slice(&[1, 1, 4, 4, 3, 3, 2, 2, 1, 1, 2, 2]);
        assert_eq!(dims.source_offset(0, 0, 0, 0), None);
        assert_eq!(dims.source_offset(0, 0, 1, 1), Some(0));
        assert_eq!(dims.source_offset(1, 1, 2, 2), Some(15));
        assert_eq!(dims.source_offset(1, 1, 3, 0), None);
        assert_eq!(dims.col_len(), 9 * 4);
    }
}
