//! Reference kernels.
//!
//! Every kernel here goes through an explicit column buffer (im2col) so the result
//! can serve as ground truth for the optimized backend.

pub mod nn;
pub mod utils;
