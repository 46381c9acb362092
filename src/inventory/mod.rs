//! Inventory Module
//!
//! Reads the virtualization inventory and extracts the device identities
//! the pairing run joins against the array.

pub mod model;
pub mod extractor;
pub mod vsphere;
pub mod memory;

pub use model::*;
pub use extractor::*;
pub use vsphere::*;
pub use memory::*;
