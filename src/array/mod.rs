//! Array Module
//!
//! Talks to the array management provider: the CIM-XML codec, the WBEM
//! HTTP adapter, an in-memory adapter, and local-array resolution.

pub mod cim;
pub mod datetime;
pub mod wbem;
pub mod memory;
pub mod system;

pub use datetime::parse_cim_datetime;
pub use wbem::*;
pub use memory::*;
pub use system::*;
