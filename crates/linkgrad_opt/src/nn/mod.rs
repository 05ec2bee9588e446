pub mod conv;
pub mod pool;
