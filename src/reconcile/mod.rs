//! Reconcile Module
//!
//! The pairing core: pool classification, in-use filtering, existing pair
//! discovery, the capacity resolver and the engine that runs them in order.

pub mod classifier;
pub mod engine;
pub mod existing;
pub mod resolver;
pub mod storage_group;
pub mod usage;

pub use classifier::*;
pub use engine::*;
pub use existing::*;
pub use resolver::*;
pub use storage_group::*;
pub use usage::*;
