//! Local Array Resolution
//!
//! Picks the one storage system the provider owns locally and refuses to
//! run against array metadata the provider has not refreshed recently.

use super::datetime::parse_cim_datetime;
use crate::domain::ports::{ArrayManagementClient, ArraySystem, STORAGE_SYSTEM_CLASS};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// `EMCLocality` value of arrays attached to the provider host
pub const LOCAL_LOCALITY: &str = "2";

/// Resolves the local array and enforces the freshness guard
#[derive(Debug, Clone, Copy)]
pub struct LocalArrayResolver {
    /// Maximum provider sync age in minutes
    pub staleness_threshold_minutes: i64,
    /// Downgrade stale data from an error to a warning
    pub diagnostics_enabled: bool,
}

impl LocalArrayResolver {
    pub fn new(staleness_threshold_minutes: i64, diagnostics_enabled: bool) -> Self {
        Self {
            staleness_threshold_minutes,
            diagnostics_enabled,
        }
    }

    /// Find the single local array and check its last sync against `now`
    pub async fn resolve(
        &self,
        client: &dyn ArrayManagementClient,
        now: DateTime<Utc>,
    ) -> Result<ArraySystem> {
        let systems = client.enumerate_instances(STORAGE_SYSTEM_CLASS).await?;
        debug!("Provider at {} reports {} storage systems", client.endpoint(), systems.len());

        let local: Vec<_> = systems
            .iter()
            .filter(|s| s.get_str("EMCLocality").map(str::trim) == Some(LOCAL_LOCALITY))
            .collect();

        let system = match local.as_slice() {
            [] => return Err(Error::NoLocalArray),
            [one] => *one,
            many => return Err(Error::AmbiguousTopology { count: many.len() }),
        };

        let array = ArraySystem {
            name: system.require_str("Name")?.to_string(),
            last_sync: parse_cim_datetime(system.require_str("EMCLastSyncTime")?)?,
        };

        self.check_freshness(&array, now)?;
        info!("Using local array {}", array.name);
        Ok(array)
    }

    /// Fail (or warn, with diagnostics on) when the last sync is too old
    pub fn check_freshness(&self, array: &ArraySystem, now: DateTime<Utc>) -> Result<()> {
        let minutes = (now - array.last_sync.with_timezone(&Utc))
            .num_seconds()
            .div_euclid(60);
        debug!("Array {} last synced {} minutes ago", array.name, minutes);

        if minutes <= self.staleness_threshold_minutes {
            return Ok(());
        }

        let err = Error::StaleArrayData {
            minutes,
            threshold: self.staleness_threshold_minutes,
        };
        if self.diagnostics_enabled {
            warn!("{}; continuing because diagnostics are enabled", err);
            Ok(())
        } else {
            Err(err)
        }
    }
}
