//! Common types shared by the IB OAuth client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
