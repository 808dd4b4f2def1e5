//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `tfhe`: tfhe-rs for FHE operations, plus the client-side helper
//! - `sanitize`: key material and client data filtering for logs

pub mod sanitize;
pub mod tfhe;

#[cfg(test)]
pub(crate) mod clear;
