//! Domain Ports - Core records and client traits for replica pairing
//!
//! These types define the boundary between the pairing logic and the two
//! external management endpoints. Adapters implement the client traits and
//! translate wire records into the typed records below.

use crate::error::{Error, Result};
use crate::inventory::Datacenter;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

// =============================================================================
// Management Model Constants
// =============================================================================

/// Storage system class on the management provider
pub const STORAGE_SYSTEM_CLASS: &str = "Symm_StorageSystem";
/// Storage volume class on the management provider
pub const STORAGE_VOLUME_CLASS: &str = "Symm_StorageVolume";
/// Replica pair association result class
pub const REPLICA_PAIR_VIEW_CLASS: &str = "SE_ReplicaPairView";
/// Masking group association result class
pub const MASKING_GROUP_CLASS: &str = "SE_DeviceMaskingGroup";

// =============================================================================
// Run Mode
// =============================================================================

/// Which artifact a run produces, and therefore which targets it wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageMode {
    /// Targets already presented to the virtualization layer
    Failover,
    /// Unpresented scratch targets
    Masking,
}

impl std::fmt::Display for UsageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageMode::Failover => write!(f, "failover"),
            UsageMode::Masking => write!(f, "masking"),
        }
    }
}

// =============================================================================
// Volume Roles
// =============================================================================

/// Replication role reported by the array for a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeRole {
    ReplicationSource,
    ReplicationTarget,
    PairedTarget,
}

impl VolumeRole {
    /// Usage code the array reports for this role
    pub fn usage_code(&self) -> u16 {
        match self {
            VolumeRole::ReplicationSource => 9,
            VolumeRole::ReplicationTarget => 2,
            VolumeRole::PairedTarget => 8,
        }
    }

    /// Role for a usage code, if it is one of the replication roles
    pub fn from_usage_code(code: u16) -> Option<Self> {
        match code {
            9 => Some(VolumeRole::ReplicationSource),
            2 => Some(VolumeRole::ReplicationTarget),
            8 => Some(VolumeRole::PairedTarget),
            _ => None,
        }
    }
}

impl std::fmt::Display for VolumeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeRole::ReplicationSource => write!(f, "source"),
            VolumeRole::ReplicationTarget => write!(f, "target"),
            VolumeRole::PairedTarget => write!(f, "paired-target"),
        }
    }
}

// =============================================================================
// CIM Records
// =============================================================================

/// A property value as it arrives from the management provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CimValue {
    Null,
    Scalar(String),
    Array(Vec<String>),
}

impl CimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CimValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// Instance path used to address an object in association walks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPath {
    /// Class of the addressed instance
    pub class_name: String,
    /// Key properties in the order the provider returned them
    pub keybindings: Vec<(String, String)>,
}

impl ObjectPath {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            keybindings: Vec::new(),
        }
    }

    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keybindings.push((name.into(), value.into()));
        self
    }

    /// Look up a key binding (case-insensitive, like the management model)
    pub fn key(&self, name: &str) -> Option<&str> {
        self.keybindings
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.class_name)?;
        for (i, (name, value)) in self.keybindings.iter().enumerate() {
            let sep = if i == 0 { '.' } else { ',' };
            write!(f, "{}{}=\"{}\"", sep, name, value)?;
        }
        Ok(())
    }
}

/// An instance returned by the management provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CimInstance {
    /// Class name of the instance
    pub class_name: String,
    /// Instance path, when the operation returns one
    pub path: Option<ObjectPath>,
    /// Properties by name
    pub properties: BTreeMap<String, CimValue>,
}

impl CimInstance {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .insert(name.into(), CimValue::Scalar(value.into()));
        self
    }

    pub fn with_path(mut self, path: ObjectPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Property lookup, case-insensitive on the name
    pub fn get(&self, name: &str) -> Option<&CimValue> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Scalar string property, if present and non-null
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(CimValue::as_str)
    }

    /// Required scalar property, or a validation error naming it
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.get_str(name)
            .ok_or_else(|| Error::validation(self.class_name.as_str(), name))
    }

    /// Required unsigned integer property
    pub fn require_u64(&self, name: &str) -> Result<u64> {
        self.require_str(name)?
            .trim()
            .parse()
            .map_err(|_| Error::validation(self.class_name.as_str(), name))
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// A replication volume as reported by the array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Array-local device identifier
    pub device_id: String,
    /// Global device identity
    pub wwn: String,
    /// Capacity in blocks
    pub blocks: u64,
    /// Role the array reported for the volume
    pub role: VolumeRole,
    /// Path for association walks
    pub path: Option<ObjectPath>,
}

impl Volume {
    /// Translate a volume instance into a typed record
    pub fn from_instance(instance: &CimInstance, role: VolumeRole) -> Result<Self> {
        Ok(Self {
            device_id: instance.require_str("DeviceID")?.to_string(),
            wwn: instance.require_str("EMCWWN")?.to_string(),
            blocks: instance.require_u64("NumberOfBlocks")?,
            role,
            path: instance.path.clone().or_else(|| Self::key_path(instance)),
        })
    }

    /// Rebuild a volume path from its key properties
    ///
    /// Queries answered with `VALUE.OBJECT` carry no instance path.
    fn key_path(instance: &CimInstance) -> Option<ObjectPath> {
        let system = instance.get_str("SystemName")?;
        let device_id = instance.get_str("DeviceID")?;
        let class = instance
            .get_str("CreationClassName")
            .unwrap_or(&instance.class_name);

        let mut path = ObjectPath::new(class).with_key("CreationClassName", class);
        if let Some(system_class) = instance.get_str("SystemCreationClassName") {
            path = path.with_key("SystemCreationClassName", system_class);
        }
        Some(path.with_key("SystemName", system).with_key("DeviceID", device_id))
    }
}

// =============================================================================
// Array System
// =============================================================================

/// The local storage system all device ids are scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySystem {
    /// Full system name, e.g. `SYMMETRIX-+-000197800123`
    pub name: String,
    /// When the provider last synchronized with the array
    pub last_sync: DateTime<FixedOffset>,
}

impl ArraySystem {
    /// Array serial: the system name after its 12-character prefix
    pub fn serial(&self) -> &str {
        self.name.get(12..).unwrap_or("")
    }
}

// =============================================================================
// Replication Pairs
// =============================================================================

/// How a pair entered the pairing map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairOrigin {
    /// Already established on the array
    Discovered,
    /// Assigned by the resolver
    Synthesized,
}

/// A source/target device pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaPair {
    pub source: String,
    pub target: String,
    pub origin: PairOrigin,
}

/// Source -> target map, injective on both sides, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingMap {
    pairs: IndexMap<String, ReplicaPair>,
    targets: HashSet<String>,
}

impl PairingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair; refused when either device is already paired
    pub fn insert(&mut self, pair: ReplicaPair) -> bool {
        if self.pairs.contains_key(&pair.source) || self.targets.contains(&pair.target) {
            return false;
        }
        self.targets.insert(pair.target.clone());
        self.pairs.insert(pair.source.clone(), pair);
        true
    }

    pub fn contains_source(&self, device_id: &str) -> bool {
        self.pairs.contains_key(device_id)
    }

    pub fn contains_target(&self, device_id: &str) -> bool {
        self.targets.contains(device_id)
    }

    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.pairs.get(source).map(|p| p.target.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicaPair> {
        self.pairs.values()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// =============================================================================
// Inventory Client Port
// =============================================================================

/// Port for the virtualization inventory (read-only)
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Fetch the datacenter trees visible to the configured account
    async fn datacenters(&self) -> Result<Vec<Datacenter>>;

    /// Release the session, if the client holds one
    async fn disconnect(&self) -> Result<()>;
}

// =============================================================================
// Array Management Client Port
// =============================================================================

/// Port for the array management provider (read-only, namespace-scoped)
#[async_trait]
pub trait ArrayManagementClient: Send + Sync {
    /// Enumerate all instances of a class
    async fn enumerate_instances(&self, class_name: &str) -> Result<Vec<CimInstance>>;

    /// Execute a `DMTF:CQL` query
    async fn exec_query(&self, query: &str) -> Result<Vec<CimInstance>>;

    /// Walk associations of an instance, filtered by result class
    async fn associators(&self, path: &ObjectPath, result_class: &str) -> Result<Vec<CimInstance>>;

    /// Endpoint description for log lines
    fn endpoint(&self) -> &str;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type InventoryClientRef = Arc<dyn InventoryClient>;
pub type ArrayManagementClientRef = Arc<dyn ArrayManagementClient>;
