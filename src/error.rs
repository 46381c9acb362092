//! Error types for replica pairing
//!
//! Provides structured error types for the inventory and array clients,
//! topology resolution, pairing and export, plus the mapping from each error
//! to the process exit status reported by the CLI.

use thiserror::Error;

/// Unified error type for a reconciliation run
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Inventory Errors
    // =========================================================================
    #[error("Inventory connection error: {endpoint} - {reason}")]
    InventoryConnection { endpoint: String, reason: String },

    #[error("Inventory response parse error: {0}")]
    InventoryResponseParse(String),

    // =========================================================================
    // Array Management Errors
    // =========================================================================
    #[error("Array connection error: {endpoint} - {reason}")]
    ArrayConnection { endpoint: String, reason: String },

    #[error("CIM operation failed: code {code} - {description}")]
    Cim { code: u32, description: String },

    #[error("CIM-XML parse error: {0}")]
    CimParse(String),

    #[error("Missing or invalid {field} on {record}")]
    Validation { record: String, field: String },

    // =========================================================================
    // Topology Errors
    // =========================================================================
    #[error("No local array is visible to the management provider")]
    NoLocalArray,

    #[error("Management provider sees {count} local arrays; only one local array is supported")]
    AmbiguousTopology { count: usize },

    #[error(
        "Array data is stale: last sync was {minutes} minutes ago (threshold {threshold} minutes). \
         Refresh the provider (refsys) before running again"
    )]
    StaleArrayData { minutes: i64, threshold: i64 },

    // =========================================================================
    // Pairing Errors
    // =========================================================================
    #[error("Pairing failed: {0}")]
    PairingFailed(String),

    // =========================================================================
    // Export Errors
    // =========================================================================
    #[error("Export failed: {0}")]
    Export(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InventoryConnection { .. }
            | Error::ArrayConnection { .. }
            | Error::Cim { .. } => 2,

            Error::NoLocalArray | Error::AmbiguousTopology { .. } => 3,

            Error::StaleArrayData { .. } => 4,

            Error::PairingFailed(_) => 5,

            Error::Configuration(_)
            | Error::Validation { .. }
            | Error::YamlParse(_) => 6,

            _ => 1,
        }
    }

    /// Check if this error came from one of the two management endpoints
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Error::InventoryConnection { .. } | Error::ArrayConnection { .. }
        )
    }

    pub(crate) fn validation(record: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Validation {
            record: record.into(),
            field: field.into(),
        }
    }
}

/// Result type alias for replica pairing
pub type Result<T> = std::result::Result<T, Error>;
