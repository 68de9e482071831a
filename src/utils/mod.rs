//! The `utils` module provides the pieces shared by every other module of
//! `topichub`: the crate error type and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{HubError, Result};

#[cfg(test)]
mod tests;
