//! Replica Pairing
//!
//! Pairs storage-array replication volumes with the devices a
//! virtualization cluster actually consumes, and exports the result as the
//! failover and masking configuration read by the array's replication
//! adapter.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐          ┌──────────────────────────────┐
//! │   Inventory endpoint     │          │  Array management provider   │
//! │ (clusters, datastores,   │          │  (CIM-XML over HTTP)         │
//! │  VM disk backings)       │          │                              │
//! └────────────┬─────────────┘          └───────────────┬──────────────┘
//!              │                                        │
//!   ┌──────────┴──────────┐               ┌─────────────┴─────────────┐
//!   │  IdentityExtractor  │               │    LocalArrayResolver     │
//!   │  known WWNs/extents │               │  (one local array, fresh) │
//!   └──────────┬──────────┘               └─────────────┬─────────────┘
//!              └───────────────┬────────────────────────┘
//!                              │
//!   ┌──────────────────────────┴───────────────────────────────────┐
//!   │ ReconcileEngine                                              │
//!   │  VolumeClassifier → UsageFilter → PairDiscovery →            │
//!   │  PairingResolver → storage group                             │
//!   └──────────────────────────┬───────────────────────────────────┘
//!                              │
//!                  ┌───────────┴────────────┐
//!                  │      ExportWriter      │
//!                  │  failover / masking    │
//!                  └────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`inventory`]: Inventory model, identity extraction, inventory clients
//! - [`array`]: CIM-XML codec, WBEM client, local array resolution
//! - [`reconcile`]: Pool classification, filtering and pairing
//! - [`export`]: Failover and masking documents
//! - [`config`]: Run configuration
//! - [`domain`]: Core records and client traits
//! - [`error`]: Error types and exit statuses

pub mod array;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod inventory;
pub mod reconcile;

// Re-export commonly used types
pub use array::{InMemoryArrayClient, LocalArrayResolver, WbemClient, WbemConfig};

pub use config::{Credentials, PairingConfig};

pub use domain::ports::{
    ArrayManagementClient, ArraySystem, CimInstance, InventoryClient, ObjectPath, PairOrigin,
    PairingMap, ReplicaPair, UsageMode, Volume, VolumeRole,
};

pub use error::{Error, Result};

pub use export::{CopySettings, ExportWriter};

pub use inventory::{
    HttpInventoryClient, IdentityExtractor, InventoryClientConfig, InventoryIdentities,
    StaticInventoryClient,
};

pub use reconcile::{
    EngineConfig, PairingOutcome, PairingResolver, ReconcileEngine, ReconcileReport,
    UsageFilter, VolumeClassifier,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
