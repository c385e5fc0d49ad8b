//! # Domain Module
//!
//! Core domain types for sign acceptance: requests, build args, the dedup
//! cache, the error taxonomy and the decision table.

pub mod cache;
pub mod config;
pub mod decision;
pub mod entities;
pub mod errors;
pub mod outcome;
pub mod value_objects;

pub use cache::*;
pub use config::*;
pub use decision::*;
pub use entities::*;
pub use errors::*;
pub use outcome::*;
pub use value_objects::*;
