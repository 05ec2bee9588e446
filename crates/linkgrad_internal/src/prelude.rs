pub use crate::core::{
    array::NdArray,
    device::{get_default_device, set_default_device, Device},
    dtype::DType,
    error::{Error, Result},
};
#[cfg(feature = "functions")]
pub use crate::functions::{
    average_pooling_2d, convolution_2d, dropout, identity, max_pooling_2d, AveragePooling2D, Convolution2DFunction,
    Dropout, Identity, MaxPooling2D, Pooling2DParams,
};
pub use crate::graph::{
    apply, force_backprop, force_backprop_mode, install_hook, no_backprop, no_backprop_mode, using_config, with_config,
    with_hook, Flag, Function, FunctionHook, FunctionNode, TimerHook, TypeInfoTuple, Variable, Volatility,
};
