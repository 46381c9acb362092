//! Usage Filter
//!
//! Drops target volumes that already back a datastore extent or a raw
//! device mapping on the current array.

use crate::domain::ports::Volume;
use crate::inventory::ExtentMap;
use std::collections::HashSet;
use tracing::debug;

/// Hex characters at the end of a fragment that encode the device id
pub const DEVICE_ID_HEX_LEN: usize = 10;

pub struct UsageFilter;

impl UsageFilter {
    /// Device id encoded in the tail of an extent fragment
    ///
    /// `...3030314142` decodes to `001AB`. Fragments that are too short or
    /// not valid hex-encoded text yield `None`.
    pub fn decode_device_id(fragment: &str) -> Option<String> {
        let start = fragment.len().checked_sub(DEVICE_ID_HEX_LEN)?;
        let bytes = hex::decode(fragment.get(start..)?).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Remove in-use targets for `array_serial`; returns how many were removed
    pub fn apply(targets: &mut Vec<Volume>, extents: &ExtentMap, array_serial: &str) -> usize {
        if !extents.contains_array(array_serial) {
            debug!("No extents recorded for array {}", array_serial);
            return 0;
        }

        let in_use: HashSet<String> = extents
            .fragments(array_serial)
            .iter()
            .filter_map(|fragment| Self::decode_device_id(fragment))
            .collect();

        let before = targets.len();
        targets.retain(|volume| {
            let used = in_use.contains(&volume.device_id);
            if used {
                debug!("Removing extent device {}", volume.device_id);
            }
            !used
        });
        before - targets.len()
    }
}
