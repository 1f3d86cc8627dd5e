//! Rule data types and matching.

pub use matcher::*;
pub use schema::*;

pub mod fields;
mod matcher;
mod schema;
