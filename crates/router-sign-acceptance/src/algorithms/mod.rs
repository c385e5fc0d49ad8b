//! # Algorithms Module
//!
//! Verification of sign requests against source and destination chains.

pub mod verify;

pub use verify::{record_swap_fields, request_span, SignInfoVerifier};
