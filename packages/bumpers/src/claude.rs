//! Integration with the assistant's hook protocol.

pub mod generator;
pub mod hook;
pub mod transcript;
