//! Existing Pair Discovery
//!
//! Seeds the pairing map with replica pairs the array already has, and
//! takes their sources out of the pool the resolver will see.

use super::classifier::VolumeClassifier;
use crate::domain::ports::{
    ArrayManagementClient, ArraySystem, PairOrigin, PairingMap, ReplicaPair, Volume, VolumeRole,
    REPLICA_PAIR_VIEW_CLASS,
};
use crate::error::Result;
use crate::inventory::KnownWwns;
use tracing::{debug, warn};

pub struct PairDiscovery<'a> {
    client: &'a dyn ArrayManagementClient,
}

impl<'a> PairDiscovery<'a> {
    pub fn new(client: &'a dyn ArrayManagementClient) -> Self {
        Self { client }
    }

    /// Record established pairs whose source is still in `sources`
    ///
    /// Matched sources are removed from `sources`. Returns the number of
    /// pairs added to `pairs`.
    pub async fn discover(
        &self,
        array: &ArraySystem,
        known: &KnownWwns,
        sources: &mut Vec<Volume>,
        pairs: &mut PairingMap,
    ) -> Result<usize> {
        let paired_targets: Vec<Volume> = VolumeClassifier::new(self.client)
            .volumes_with_role(&array.name, VolumeRole::PairedTarget)
            .await?
            .into_iter()
            .filter(|v| known.contains(&v.wwn))
            .collect();

        let mut found = 0;
        for target in &paired_targets {
            let Some(path) = target.path.as_ref() else {
                warn!("Paired target {} has no instance path, skipping", target.device_id);
                continue;
            };

            let views = self.client.associators(path, REPLICA_PAIR_VIEW_CLASS).await?;
            for view in &views {
                if view.get_str("SVTargetDeviceID") != Some(target.device_id.as_str()) {
                    continue;
                }
                let Some(source) = view.get_str("SVSourceDeviceID") else {
                    continue;
                };
                let Some(index) = sources.iter().position(|v| v.device_id == source) else {
                    continue;
                };

                let pair = ReplicaPair {
                    source: source.to_string(),
                    target: target.device_id.clone(),
                    origin: PairOrigin::Discovered,
                };
                if pairs.insert(pair) {
                    debug!("Found pairing {} -> {}", source, target.device_id);
                    sources.remove(index);
                    found += 1;
                }
            }
        }

        Ok(found)
    }
}
