use crate::{
    device::{get_default_device, Device},
    dtype::DType,
    error::{Error, Result},
    layout::Layout,
};
use half::{bf16, f16};
use std::{fmt, sync::Arc};

/// Scalar types that can back an [`NdArray`].
pub trait Element: Copy + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    fn into_storage(data: Vec<Self>) -> Storage;
    fn slice(storage: &Storage) -> Option<&[Self]>;
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! declare_storage {
    ($($variant:ident => $type:ty, |$x:ident| $to:expr, |$v:ident| $from:expr);* $(;)?) => {
        #[derive(Clone, Debug, PartialEq)]
        pub enum Storage {
            $($variant(Vec<$type>),)*
        }

        impl Storage {
            pub fn dtype(&self) -> DType {
                match self {
                    $(Self::$variant(_) => DType::$variant,)*
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(data) => data.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            pub fn from_f64_slice(values: &[f64], dtype: DType) -> Self {
                match dtype {
                    $(DType::$variant => Self::$variant(values.iter().map(|&v| <$type as Element>::from_f64(v)).collect()),)*
                }
            }

            pub fn to_f64_vec(&self) -> Vec<f64> {
                match self {
                    $(Self::$variant(data) => data.iter().map(|&x| x.to_f64()).collect(),)*
                }
            }
        }

        $(
            impl Element for $type {
                const DTYPE: DType = DType::$variant;

                fn into_storage(data: Vec<Self>) -> Storage {
                    Storage::$variant(data)
                }

                fn slice(storage: &Storage) -> Option<&[Self]> {
                    match storage {
                        Storage::$variant(data) => Some(data),
                        _ => None,
                    }
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    let $x = self;
                    $to
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    let $v = value;
                    $from
                }
            }
        )*
    };
}

declare_storage! {
    BF16 => bf16, |x| x.to_f64(), |v| bf16::from_f64(v);
    F16 => f16, |x| x.to_f64(), |v| f16::from_f64(v);
    F32 => f32, |x| x as f64, |v| v as f32;
    F64 => f64, |x| x, |v| v;
    BOOL => bool, |x| if x { 1.0 } else { 0.0 }, |v| v != 0.0;
    U8 => u8, |x| x as f64, |v| v as u8;
    I32 => i32, |x| x as f64, |v| v as i32;
    I64 => i64, |x| x as f64, |v| v as i64;
}

#[derive(Clone, Copy)]
enum BinaryOp {
    Add,
    Mul,
}

macro_rules! zip_storage {
    ($lhs:expr, $rhs:expr, $op:expr;
     float: [$($f:ident),*];
     half: [$($h:ident => $hty:ty),*];
     int: [$($i:ident),*]) => {
        match ($lhs, $rhs) {
            $(
                (Storage::$f(a), Storage::$f(b)) => Storage::$f(
                    a.iter()
                        .zip(b.iter())
                        .map(|(&x, &y)| match $op {
                            BinaryOp::Add => x + y,
                            BinaryOp::Mul => x * y,
                        })
                        .collect(),
                ),
            )*
            $(
                (Storage::$h(a), Storage::$h(b)) => Storage::$h(
                    a.iter()
                        .zip(b.iter())
                        .map(|(&x, &y)| {
                            let (x, y) = (x.to_f32(), y.to_f32());
                            <$hty>::from_f32(match $op {
                                BinaryOp::Add => x + y,
                                BinaryOp::Mul => x * y,
                            })
                        })
                        .collect(),
                ),
            )*
            $(
                (Storage::$i(a), Storage::$i(b)) => Storage::$i(
                    a.iter()
                        .zip(b.iter())
                        .map(|(&x, &y)| match $op {
                            BinaryOp::Add => x.wrapping_add(y),
                            BinaryOp::Mul => x.wrapping_mul(y),
                        })
                        .collect(),
                ),
            )*
            _ => return Err(Error::UnsupportedDType),
        }
    };
}

/// Dense, contiguous, immutable N-dimensional array.
///
/// Cloning is cheap: the storage is shared. Every operation returns a new array, so
/// a shared buffer is never written through.
#[derive(Clone)]
pub struct NdArray {
    storage: Arc<Storage>,
    layout: Layout,
    device: Device,
}

impl NdArray {
    pub fn from_storage(storage: Storage, shape: &[usize]) -> Result<Self> {
        let size = Layout::compute_size(shape);
        if storage.len() != size {
            return Err(Error::IncompatibleShape(format!(
                "{} elements cannot be viewed as {:?}",
                storage.len(),
                shape
            )));
        }

        Ok(Self {
            storage: Arc::new(storage),
            layout: Layout::from_shape(shape),
            device: get_default_device(),
        })
    }

    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        Self::from_storage(T::into_storage(data), shape)
    }

    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        Self::from_vec(data.to_vec(), shape)
    }

    pub fn from_f64_vec(values: &[f64], shape: &[usize], dtype: DType) -> Result<Self> {
        Self::from_storage(Storage::from_f64_slice(values, dtype), shape)
    }

    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            storage: Arc::new(T::into_storage(vec![value])),
            layout: Layout::from_shape(&[]),
            device: get_default_device(),
        }
    }

    pub fn full(shape: &[usize], dtype: DType, value: f64) -> Self {
        let size = Layout::compute_size(shape);
        Self {
            storage: Arc::new(Storage::from_f64_slice(&vec![value; size], dtype)),
            layout: Layout::from_shape(shape),
            device: get_default_device(),
        }
    }

    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        Self::full(shape, dtype, 0.0)
    }

    pub fn ones(shape: &[usize], dtype: DType) -> Self {
        Self::full(shape, dtype, 1.0)
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape(), self.dtype()).with_device(self.device)
    }

    pub fn ones_like(&self) -> Self {
        Self::ones(self.shape(), self.dtype()).with_device(self.device)
    }

    // metadata

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn strides(&self) -> &[usize] {
        self.layout.strides()
    }

    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    pub fn dim_size(&self, dim: usize) -> Option<usize> {
        self.layout.dim_size(dim)
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    // data

    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::slice(&self.storage).ok_or(Error::DTypeMismatch {
            expected: T::DTYPE,
            got: self.dtype(),
        })
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.as_slice::<T>().map(<[T]>::to_vec)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.storage.to_f64_vec()
    }

    pub fn has_nan(&self) -> bool {
        match self.storage.as_ref() {
            Storage::BF16(data) => data.iter().any(|x| x.is_nan()),
            Storage::F16(data) => data.iter().any(|x| x.is_nan()),
            Storage::F32(data) => data.iter().any(|x| x.is_nan()),
            Storage::F64(data) => data.iter().any(|x| x.is_nan()),
            _ => false,
        }
    }

    pub fn shares_storage(&self, other: &NdArray) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    // transforms

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn to_device(&self, device: Device) -> Self {
        self.clone().with_device(device)
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        Ok(Self {
            storage: Arc::clone(&self.storage),
            layout: self.layout.reshape(shape)?,
            device: self.device,
        })
    }

    /// Copies the storage so the result shares nothing with `self`.
    pub fn deep_copy(&self) -> Self {
        Self {
            storage: Arc::new(self.storage.as_ref().clone()),
            layout: self.layout.clone(),
            device: self.device,
        }
    }

    pub fn add(&self, other: &NdArray) -> Result<Self> {
        self.zip_with(other, BinaryOp::Add)
    }

    pub fn mul(&self, other: &NdArray) -> Result<Self> {
        self.zip_with(other, BinaryOp::Mul)
    }

    fn zip_with(&self, other: &NdArray, op: BinaryOp) -> Result<Self> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: other.shape().to_vec(),
                msg: "elementwise operands".into(),
            });
        }
        if self.dtype() != other.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: other.dtype(),
            });
        }
        if self.device != other.device {
            return Err(Error::DeviceMismatch {
                expected: self.device,
                got: other.device,
            });
        }

        let storage = zip_storage!(self.storage.as_ref(), other.storage.as_ref(), op;
            float: [F32, F64];
            half: [BF16 => bf16, F16 => f16];
            int: [U8, I32, I64]);

        Ok(Self {
            storage: Arc::new(storage),
            layout: self.layout.clone(),
            device: self.device,
        })
    }
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("device", &self.device)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_element_count() {
        assert!(NdArray::from_vec(vec![1.0f32, 2.0, 3.0], &[2, 2]).is_err());
        assert!(NdArray::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).is_ok());
    }

    #[test]
    fn typed_access_checks_dtype() -> Result<()> {
        let x = NdArray::from_vec(vec![1.0f64, 2.0], &[2])?;
        assert_eq!(x.as_slice::<f64>()?, &[1.0, 2.0]);
        assert!(matches!(
            x.as_slice::<f32>(),
            Err(Error::DTypeMismatch {
                expected: DType::F32,
                got: DType::F64
            })
        ));
        Ok(())
    }

    #[test]
    fn add_and_mul() -> Result<()> {
        let a = NdArray::from_vec(vec![1.0f32, 2.0, 3.0], &[3])?;
        let b = NdArray::from_vec(vec![4.0f32, 5.0, 6.0], &[3])?;
        assert_eq!(a.add(&b)?.to_vec::<f32>()?, vec![5.0, 7.0, 9.0]);
        assert_eq!(a.mul(&b)?.to_vec::<f32>()?, vec![4.0, 10.0, 18.0]);

        let h = NdArray::from_vec(vec![f16::from_f32(1.5), f16::from_f32(2.0)], &[2])?;
        assert_eq!(h.add(&h)?.to_f64_vec(), vec![3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn add_rejects_mismatched_operands() -> Result<()> {
        let a = NdArray::zeros(&[2, 2], DType::F32);
        assert!(matches!(
            a.add(&NdArray::zeros(&[4], DType::F32)),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            a.add(&NdArray::zeros(&[2, 2], DType::F64)),
            Err(Error::DTypeMismatch { .. })
        ));
        assert!(matches!(
            a.add(&a.to_device(Device::Accel(0))),
            Err(Error::DeviceMismatch { .. })
        ));
        let flags = NdArray::from_vec(vec![true, false], &[2])?;
        assert!(matches!(flags.add(&flags), Err(Error::UnsupportedDType)));
        Ok(())
    }

    #[test]
    fn deep_copy_detaches_storage() -> Result<()> {
        let a = NdArray::from_vec(vec![1i64, 2, 3, 4], &[2, 2])?;
        let view = a.reshape(&[4])?;
        assert!(view.shares_storage(&a));
        let copy = a.deep_copy();
        assert!(!copy.shares_storage(&a));
        assert_eq!(copy.to_vec::<i64>()?, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn nan_scan_only_sees_floats() -> Result<()> {
        assert!(NdArray::from_vec(vec![1.0f32, f32::NAN], &[2])?.has_nan());
        assert!(!NdArray::from_vec(vec![1.0f64, 2.0], &[2])?.has_nan());
        assert!(!NdArray::from_vec(vec![1i32, 2], &[2])?.has_nan());
        Ok(())
    }
}
