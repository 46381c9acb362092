//! Domain layer - Typed records and client ports
//!
//! Wire records from both management endpoints are translated into the
//! types defined here before any pairing decision is made.

pub mod ports;

pub use ports::*;
