//! Define-by-run automatic differentiation.
//!
//! ```
//! use linkgrad::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let x = Variable::new(NdArray::ones(&[1, 1, 4, 4], DType::F32));
//! let y = max_pooling_2d(&x, 2, None, 0)?;
//! assert_eq!(y.shape()?, vec![1, 1, 2, 2]);
//! # Ok(())
//! # }
//! ```

pub use linkgrad_internal::*;
