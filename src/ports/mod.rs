//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundary
//! between the scoring protocol and the FHE library.

mod fhe_engine;

pub use fhe_engine::{ContextMode, FheContext, FheEngine};
