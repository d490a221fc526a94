//! Shared types for the pet registry workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
