//! Reconcile Engine
//!
//! Sequences one pairing run: inventory identities, local array, volume
//! pools, in-use filtering, existing pairs, the resolver and, for masking
//! runs, the storage group.

use super::classifier::VolumeClassifier;
use super::existing::PairDiscovery;
use super::resolver::{PairingOutcome, PairingResolver};
use super::storage_group::storage_group_of;
use super::usage::UsageFilter;
use crate::array::LocalArrayResolver;
use crate::domain::ports::{
    ArrayManagementClientRef, ArraySystem, InventoryClientRef, PairingMap, UsageMode,
};
use crate::error::Result;
use crate::inventory::{IdentityExtractor, InventoryIdentities};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum age of the provider's last array sync, in minutes
    pub staleness_threshold_minutes: i64,
    /// Continue on stale array data
    pub diagnostics_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_minutes: 15,
            diagnostics_enabled: false,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// Everything a run found, ready for export
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub mode: UsageMode,
    pub array: ArraySystem,
    /// Discovered pairs first, then synthesized ones
    pub pairs: PairingMap,
    pub outcome: PairingOutcome,
    /// Pairs that already existed on the array
    pub discovered: usize,
    /// Target pool after filtering, before pairing (masking runs only)
    pub masking_devices: Vec<String>,
    /// Masking group of the first source (masking runs only)
    pub storage_group: Option<String>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct ReconcileEngine {
    config: EngineConfig,
    inventory: InventoryClientRef,
    array: ArrayManagementClientRef,
}

impl ReconcileEngine {
    pub fn new(
        config: EngineConfig,
        inventory: InventoryClientRef,
        array: ArrayManagementClientRef,
    ) -> Self {
        Self {
            config,
            inventory,
            array,
        }
    }

    /// Run against the current time
    pub async fn run(&self, mode: UsageMode) -> Result<ReconcileReport> {
        self.run_at(mode, Utc::now()).await
    }

    /// Run with `now` as the reference for the staleness check
    pub async fn run_at(&self, mode: UsageMode, now: DateTime<Utc>) -> Result<ReconcileReport> {
        info!("Starting {} run", mode);

        let datacenters = self.inventory.datacenters().await?;
        let identities = IdentityExtractor::extract(&datacenters);
        info!(
            "Inventory shows {} array LUNs and extents on {} arrays",
            identities.known_wwns.len(),
            identities.extents.arrays().count()
        );

        let array = LocalArrayResolver::new(
            self.config.staleness_threshold_minutes,
            self.config.diagnostics_enabled,
        )
        .resolve(self.array.as_ref(), now)
        .await?;

        self.reconcile(array, &identities, mode).await
    }

    /// Pair volumes of an already resolved array
    pub async fn reconcile(
        &self,
        array: ArraySystem,
        identities: &InventoryIdentities,
        mode: UsageMode,
    ) -> Result<ReconcileReport> {
        let client = self.array.as_ref();
        let known = &identities.known_wwns;

        let mut pools = VolumeClassifier::new(client)
            .classify(&array, known, mode)
            .await?;
        info!(
            "Array {} has {} source and {} target candidates",
            array.serial(),
            pools.source.len(),
            pools.target.len()
        );

        let removed = UsageFilter::apply(&mut pools.target, &identities.extents, array.serial());
        if removed > 0 {
            info!("Removed {} targets already in use", removed);
        }

        let mut pairs = PairingMap::new();
        let discovered = PairDiscovery::new(client)
            .discover(&array, known, &mut pools.source, &mut pairs)
            .await?;
        info!("Found {} existing pairs", discovered);

        let masking_devices = match mode {
            UsageMode::Masking => pools.target.iter().map(|v| v.device_id.clone()).collect(),
            UsageMode::Failover => Vec::new(),
        };

        let outcome = PairingResolver::pair(&pools.source, &mut pools.target, &mut pairs);
        if outcome.is_success() {
            info!("Pairing complete: {}", outcome);
        } else {
            warn!("Pairing failed: {}", outcome);
        }

        let storage_group = match mode {
            UsageMode::Masking => storage_group_of(client, &pools.source).await?,
            UsageMode::Failover => None,
        };

        Ok(ReconcileReport {
            mode,
            array,
            pairs,
            outcome,
            discovered,
            masking_devices,
            storage_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::InMemoryArrayClient;
    use crate::domain::ports::{PairOrigin, VolumeRole};
    use crate::error::Error;
    use crate::inventory::{ExtentMap, KnownWwns, StaticInventoryClient};
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use std::sync::Arc;

    const SYMM: &str = "SYMMETRIX-+-000197800123";
    const SERIAL: &str = "000197800123";
    const SRC_WWN: &str = "6000097ABCDEF0123456789ABCDEF01";

    fn engine(array: InMemoryArrayClient) -> ReconcileEngine {
        ReconcileEngine::new(
            EngineConfig::default(),
            Arc::new(StaticInventoryClient::new(Vec::new())),
            Arc::new(array),
        )
    }

    fn array_system() -> ArraySystem {
        ArraySystem {
            name: SYMM.into(),
            last_sync: Utc::now().fixed_offset(),
        }
    }

    fn identities(wwns: &[&str], extents: ExtentMap) -> InventoryIdentities {
        InventoryIdentities {
            known_wwns: wwns.iter().copied().collect::<KnownWwns>(),
            extents,
        }
    }

    #[tokio::test]
    async fn test_masking_run_pairs_equal_capacity() {
        let client = InMemoryArrayClient::new()
            .with_volume(SYMM, "001", SRC_WWN, 1000, VolumeRole::ReplicationSource)
            .with_volume(SYMM, "101", "unpresented-101", 1000, VolumeRole::ReplicationTarget)
            .with_volume(SYMM, "102", "unpresented-102", 2000, VolumeRole::ReplicationTarget)
            .with_masking_group(SYMM, "001", "esx_sg");

        let report = engine(client)
            .reconcile(array_system(), &identities(&[SRC_WWN], ExtentMap::new()), UsageMode::Masking)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.pairs.target_of("001"), Some("101"));
        assert_eq!(report.masking_devices, vec!["101", "102"]);
        assert_eq!(report.storage_group.as_deref(), Some("esx_sg"));
    }

    #[tokio::test]
    async fn test_masking_run_without_matching_capacity_fails() {
        let client = InMemoryArrayClient::new()
            .with_volume(SYMM, "001", SRC_WWN, 1000, VolumeRole::ReplicationSource)
            .with_volume(SYMM, "102", "unpresented-102", 2000, VolumeRole::ReplicationTarget);

        let report = engine(client)
            .reconcile(array_system(), &identities(&[SRC_WWN], ExtentMap::new()), UsageMode::Masking)
            .await
            .unwrap();

        assert!(!report.is_success());
        assert!(report.pairs.is_empty());
        assert_eq!(report.masking_devices, vec!["102"]);
    }

    #[tokio::test]
    async fn test_in_use_target_is_not_offered() {
        // extent fragment tail 3030313031 is device 00101
        let mut extents = ExtentMap::new();
        extents.push(SERIAL, "000197800123533030313031");
        let client = InMemoryArrayClient::new()
            .with_volume(SYMM, "001", SRC_WWN, 1000, VolumeRole::ReplicationSource)
            .with_volume(SYMM, "00101", "unpresented-101", 1000, VolumeRole::ReplicationTarget)
            .with_volume(SYMM, "00102", "unpresented-102", 1000, VolumeRole::ReplicationTarget);

        let report = engine(client)
            .reconcile(array_system(), &identities(&[SRC_WWN], extents), UsageMode::Masking)
            .await
            .unwrap();

        assert_eq!(report.masking_devices, vec!["00102"]);
        assert_eq!(report.pairs.target_of("001"), Some("00102"));
    }

    #[tokio::test]
    async fn test_failover_run_keeps_existing_pairs_first() {
        let client = InMemoryArrayClient::new()
            .with_volume(SYMM, "001", "src-1", 1000, VolumeRole::ReplicationSource)
            .with_volume(SYMM, "002", "src-2", 500, VolumeRole::ReplicationSource)
            .with_volume(SYMM, "201", "paired-201", 1000, VolumeRole::PairedTarget)
            .with_volume(SYMM, "102", "presented-102", 500, VolumeRole::ReplicationTarget)
            .with_replica_pair(SYMM, "001", "201");
        let ids = identities(&["src-1", "src-2", "paired-201", "presented-102"], ExtentMap::new());

        let report = engine(client)
            .reconcile(array_system(), &ids, UsageMode::Failover)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.discovered, 1);
        let pairs: Vec<_> = report
            .pairs
            .iter()
            .map(|p| (p.source.as_str(), p.target.as_str(), p.origin))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("001", "201", PairOrigin::Discovered),
                ("002", "102", PairOrigin::Synthesized),
            ]
        );
        assert!(report.masking_devices.is_empty());
        assert_eq!(report.storage_group, None);
    }

    #[tokio::test]
    async fn test_run_rejects_stale_array() {
        let client = InMemoryArrayClient::new().with_system(SYMM, 2, "20240315090000.000000+000");
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();

        let err = engine(client).run_at(UsageMode::Failover, now).await.unwrap_err();
        assert_matches!(err, Error::StaleArrayData { .. });
    }
}
