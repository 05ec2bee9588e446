pub mod convolution_2d;
pub mod dropout;
pub mod identity;
pub mod pooling_2d;

pub use convolution_2d::{convolution_2d, Convolution2DFunction};
pub use dropout::{dropout, Dropout};
pub use identity::{identity, Identity};
pub use pooling_2d::{average_pooling_2d, max_pooling_2d, AveragePooling2D, MaxPooling2D, Pooling2DParams};

use linkgrad_core::be::KernelImpl;
use linkgrad_graph::config::is_optimized_enabled;

/// Kernel family for host-side computations under the current configuration.
pub fn kernel_impl() -> KernelImpl {
    if is_optimized_enabled() {
        KernelImpl::Optimized
    } else {
        KernelImpl::Reference
    }
}
