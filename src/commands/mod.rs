pub mod authentication;
pub mod realplay;

pub use authentication::*;
pub use realplay::*;
