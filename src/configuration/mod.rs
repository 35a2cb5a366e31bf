mod structure;
mod traits;
mod utilities;

pub use structure::*;
pub use traits::ResolvableConfiguration;
