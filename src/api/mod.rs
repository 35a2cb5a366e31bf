mod common;
pub mod departure_monitor;
pub mod errors;
pub mod stop_finder;

pub use common::*;

/// Trip-planner API protocol version sent with every request.
pub const TFNSW_API_VERSION: &str = "10.2.1.42";
