//! Optimized kernels.
//!
//! Instead of materializing a column buffer, each kernel walks a precomputed gather
//! table. Tables are built once per geometry and shared through [`primitive`].

pub mod nn;
pub mod primitive;
