mod hash;
pub use hash::*;
mod json;
pub use json::*;
mod norm;
pub use norm::*;
