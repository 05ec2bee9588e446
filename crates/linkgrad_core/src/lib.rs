pub mod array;
pub mod be;
pub mod device;
pub mod dtype;
pub mod error;
pub mod layout;

pub use linkgrad_cpu as cpu;
pub use linkgrad_opt as opt;
