use dashmap::DashMap;
use linkgrad_cpu::utils::Dims2d;
use std::sync::{Arc, LazyLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    MaxPool2d,
    AvgPool2d,
    Conv2d,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxPool2d => "max_pool2d",
            Self::AvgPool2d => "avg_pool2d",
            Self::Conv2d => "conv2d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveKey {
    pub kind: PrimitiveKind,
    pub dims: Dims2d,
}

impl PrimitiveKey {
    pub fn new(kind: PrimitiveKind, dims_and_strides: &[usize]) -> Self {
        Self {
            kind,
            dims: Dims2d::from_slice(dims_and_strides),
        }
    }
}

/// Gather table for one input plane.
///
/// Entry `p * window + k` is the plane offset read by output position `p` at kernel
/// tap `k`, or `None` when that tap lands on padding.
#[derive(Debug)]
pub struct WindowTable {
    window: usize,
    output_size: usize,
    offsets: Vec<Option<usize>>,
}

impl WindowTable {
    pub fn build(dims: &Dims2d) -> Self {
        let window = dims.kernel_size();
        let output_size = dims.output_size();
        let mut offsets = Vec::with_capacity(window * output_size);
        for h_out in 0..dims.out_h {
            for w_out in 0..dims.out_w {
                for kh in 0..dims.kernel_h {
                    for kw in 0..dims.kernel_w {
                        offsets.push(dims.source_offset(h_out, w_out, kh, kw));
                    }
                }
            }
        }

        Self {
            window,
            output_size,
            offsets,
        }
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Taps of output position `p`.
    #[inline]
    pub fn taps(&self, p: usize) -> &[Option<usize>] {
        &self.offsets[p * self.window..(p + 1) * self.window]
    }
}

static PRIMITIVES: LazyLock<DashMap<PrimitiveKey, Arc<WindowTable>>> =
    LazyLock::new(|| DashMap::with_capacity_and_shard_amount(1 << 6, 16));

/// Returns the cached table for `key`, building it on first use.
pub fn get_or_create(key: PrimitiveKey) -> Arc<WindowTable> {
    if let Some(table) = PRIMITIVES.get(&key) {
        return Arc::clone(table.value());
    }

    Arc::clone(
        PRIMITIVES
            .entry(key)
            .or_insert_with(|| {
                log::trace!("building {} primitive for {:?}", key.kind.as_str(), key.dims);
                Arc::new(WindowTable::build(&key.dims))
            })
            .value(),
    )
}

pub fn cache_len() -> usize {
    PRIMITIVES.len()
}

pub fn clear_cache() {
    PRIMITIVES.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_geometry_shares_table() {
        let dims = [1, 2, 5, 5, 3, 3, 2, 2, 0, 0, 2, 2];
        let a = get_or_create(PrimitiveKey::new(PrimitiveKind::MaxPool2d, &dims));
        let b = get_or_create(PrimitiveKey::new(PrimitiveKind::MaxPool2d, &dims));
        assert!(Arc::ptr_eq(&a, &b));

        let c = get_or_create(PrimitiveKey::new(PrimitiveKind::AvgPool2d, &dims));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(cache_len() >= 2);
    }

    #[test]
    fn table_marks_padding() {
        let dims = Dims2d::from_slice(&[1, 1, 2, 2, 2, 2, 2, 2, 1, 1, 2, 2]);
        let table = WindowTable::build(&dims);
        assert_eq!(table.window(), 4);
        assert_eq!(table.output_size(), 4);
        assert_eq!(table.taps(0), &[None, None, None, Some(0)]);
        assert_eq!(table.taps(3), &[Some(3), None, None, None]);
    }
}
