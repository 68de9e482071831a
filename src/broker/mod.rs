//! The `broker` module holds the topic registry (`Hub`) shared by every
//! connection, and the per-topic subscriber sets it is made of.

pub mod engine;
pub mod topic;

pub use engine::Hub;

#[cfg(test)]
mod tests;
