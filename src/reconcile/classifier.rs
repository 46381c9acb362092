//! Volume Classifier
//!
//! Queries the array for replication sources and targets and splits them
//! against the WWNs the inventory can see.

use crate::domain::ports::{
    ArrayManagementClient, ArraySystem, UsageMode, Volume, VolumeRole, STORAGE_VOLUME_CLASS,
};
use crate::error::Result;
use crate::inventory::KnownWwns;
use tracing::debug;

// =============================================================================
// Volume Pools
// =============================================================================

/// Candidate volumes for one pairing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumePools {
    /// Replication sources visible to the inventory
    pub source: Vec<Volume>,
    /// Replication targets selected by the usage mode
    pub target: Vec<Volume>,
}

// =============================================================================
// Volume Classifier
// =============================================================================

/// Builds the source and target pools from array role queries
pub struct VolumeClassifier<'a> {
    client: &'a dyn ArrayManagementClient,
}

impl<'a> VolumeClassifier<'a> {
    pub fn new(client: &'a dyn ArrayManagementClient) -> Self {
        Self { client }
    }

    /// Query text for the volumes of `system` with the usage code of `role`
    pub fn volume_query(system: &str, role: VolumeRole) -> String {
        format!(
            "SELECT * FROM {class} WHERE {class}.SystemName='{system}' AND {class}.Usage={usage}",
            class = STORAGE_VOLUME_CLASS,
            system = system,
            usage = role.usage_code(),
        )
    }

    /// Fetch every volume the array reports in `role`
    pub async fn volumes_with_role(&self, system: &str, role: VolumeRole) -> Result<Vec<Volume>> {
        let query = Self::volume_query(system, role);
        self.client
            .exec_query(&query)
            .await?
            .iter()
            .map(|instance| Volume::from_instance(instance, role))
            .collect()
    }

    /// Source and target pools for `array` under `mode`
    pub async fn classify(
        &self,
        array: &ArraySystem,
        known: &KnownWwns,
        mode: UsageMode,
    ) -> Result<VolumePools> {
        let source: Vec<Volume> = self
            .volumes_with_role(&array.name, VolumeRole::ReplicationSource)
            .await?
            .into_iter()
            .filter(|v| known.contains(&v.wwn))
            .inspect(|v| debug!("Found source lun {}", v.device_id))
            .collect();

        let targets = self
            .volumes_with_role(&array.name, VolumeRole::ReplicationTarget)
            .await?;
        let target = Self::select_targets(targets, known, mode);

        Ok(VolumePools { source, target })
    }

    /// Keep presented targets for failover, unpresented ones for masking
    pub fn select_targets(targets: Vec<Volume>, known: &KnownWwns, mode: UsageMode) -> Vec<Volume> {
        let want_presented = mode == UsageMode::Failover;
        targets
            .into_iter()
            .filter(|v| known.contains(&v.wwn) == want_presented)
            .inspect(|v| debug!("Found target lun {}", v.device_id))
            .collect()
    }
}
