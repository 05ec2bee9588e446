pub mod prelude;

pub use linkgrad_core as core;
#[cfg(feature = "functions")]
pub use linkgrad_functions as functions;
pub use linkgrad_graph as graph;
