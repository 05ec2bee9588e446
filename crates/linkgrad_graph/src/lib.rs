//! Define-by-run computational graph.
//!
//! Applying a [`Function`] to arrays or [`Variable`]s computes the result right away
//! and, unless volatility or the thread's configuration rules it out, records a
//! [`Node`] so gradients can later flow back with [`Variable::backward`].

mod backward;
pub mod config;
pub mod cosim;
pub mod function;
pub mod hook;
pub mod node;
pub mod timer;
pub mod type_check;
pub mod variable;
pub mod volatility;

pub use config::{
    force_backprop_mode, no_backprop_mode, using_config, with_config, Config, ConfigGuard, Flag, GlobalConfig,
};
pub use cosim::{take_reports, CosimPhase, CosimReport};
pub use function::{apply, Backend, Function, FunctionClone, FunctionNode, FunctionOutput, Input};
pub use hook::{install_hook, install_hook_named, with_hook, FunctionHook, HookGuard, HookRegistry};
pub use node::{Node, NodeId};
pub use timer::{TimerHook, TimerRecord};
pub use type_check::{TypeInfo, TypeInfoTuple};
pub use variable::{Variable, VariableId, WeakVariable};
pub use volatility::Volatility;
