//! Shared types for the GitHub bridge workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
