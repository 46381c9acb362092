//! Identity Extractor
//!
//! Normalizes the device identities the inventory exposes (LUN UUIDs, VMFS
//! extent disk names, raw-device-mapping LUN UUIDs) into the fixed-width
//! WWN fragments the array reports for the same devices.
//!
//! The offsets below are protocol constants of the array vendor's NAA
//! identifier layout, not inferred structure.

use super::model::{Datacenter, DiskBacking, ScsiLun, VmfsExtent};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

// =============================================================================
// Constants
// =============================================================================

/// Vendor prefix that marks a LUN as belonging to the array family
pub const VENDOR_WWN_TOKEN: &str = "6000097";

/// Width of the WWN fragment taken from a LUN UUID
pub const WWN_FRAGMENT_LEN: usize = 32;

/// Start of the array serial and device fragment in an extent disk name
const EXTENT_FRAGMENT_START: usize = 12;
const EXTENT_ARRAY_END: usize = 24;

/// Compatibility mode of raw device mappings the run accounts for
pub const RDM_PHYSICAL_MODE: &str = "physicalMode";

/// Start of the array serial and device fragment in an RDM LUN UUID
const RDM_FRAGMENT_START: usize = 18;
const RDM_ARRAY_END: usize = 30;
/// Trailing product-id characters trimmed from an RDM LUN UUID
const RDM_SUFFIX_LEN: usize = 12;

// =============================================================================
// Known WWNs
// =============================================================================

/// Deduplicated WWN fragments visible to the virtualization layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownWwns {
    wwns: IndexSet<String>,
}

impl KnownWwns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fragment; returns false if it was already known
    pub fn insert(&mut self, wwn: impl Into<String>) -> bool {
        self.wwns.insert(wwn.into())
    }

    pub fn contains(&self, wwn: &str) -> bool {
        self.wwns.contains(wwn)
    }

    pub fn len(&self) -> usize {
        self.wwns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wwns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.wwns.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for KnownWwns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut known = KnownWwns::new();
        for wwn in iter {
            known.insert(wwn);
        }
        known
    }
}

// =============================================================================
// Extent Map
// =============================================================================

/// Array serial -> device fragments already consumed by datastores or RDMs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtentMap {
    by_array: IndexMap<String, Vec<String>>,
}

impl ExtentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, array: impl Into<String>, fragment: impl Into<String>) {
        self.by_array
            .entry(array.into())
            .or_default()
            .push(fragment.into());
    }

    /// Fragments recorded under an array; empty if the array is unknown
    pub fn fragments(&self, array: &str) -> &[String] {
        self.by_array.get(array).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_array(&self, array: &str) -> bool {
        self.by_array.contains_key(array)
    }

    pub fn arrays(&self) -> impl Iterator<Item = &str> {
        self.by_array.keys().map(String::as_str)
    }
}

// =============================================================================
// Extraction Result
// =============================================================================

/// Everything the pairing run needs from the inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryIdentities {
    pub known_wwns: KnownWwns,
    pub extents: ExtentMap,
}

// =============================================================================
// Identity Extractor
// =============================================================================

/// Turns inventory descriptors into WWN fragments
pub struct IdentityExtractor;

impl IdentityExtractor {
    /// Extract known WWNs and the extent map from every datacenter
    pub fn extract(datacenters: &[Datacenter]) -> InventoryIdentities {
        let luns = datacenters
            .iter()
            .flat_map(|dc| dc.clusters.iter())
            .flat_map(|cluster| cluster.hosts.iter())
            .flat_map(|host| host.scsi_luns.iter());

        // Datastores without VMFS metadata contribute nothing
        let extents = datacenters
            .iter()
            .flat_map(|dc| dc.datastores.iter())
            .filter_map(|ds| ds.vmfs.as_ref())
            .flat_map(|vmfs| vmfs.extents.iter());

        let backings = datacenters
            .iter()
            .flat_map(|dc| dc.vm_folder.virtual_machines())
            .flat_map(|vm| vm.devices.iter())
            .filter_map(|device| device.backing.as_ref());

        let known_wwns = Self::known_wwns(luns);
        let mut extent_map = Self::extent_map(extents);
        Self::add_rdm_backings(backings, &mut extent_map);

        InventoryIdentities {
            known_wwns,
            extents: extent_map,
        }
    }

    /// Collect the WWN fragment of every array LUN, deduplicated
    pub fn known_wwns<'a>(luns: impl IntoIterator<Item = &'a ScsiLun>) -> KnownWwns {
        let mut known = KnownWwns::new();
        for lun in luns {
            if let Some(wwn) = Self::lun_wwn(&lun.uuid) {
                debug!("Found lun {}", wwn);
                known.insert(wwn);
            }
        }
        known
    }

    /// Map extents to their array serial
    pub fn extent_map<'a>(extents: impl IntoIterator<Item = &'a VmfsExtent>) -> ExtentMap {
        let mut map = ExtentMap::new();
        for extent in extents {
            match Self::extent_identity(&extent.disk_name) {
                Some((array, fragment)) => {
                    debug!("Found extent lun {}", fragment);
                    map.push(array, fragment);
                }
                None => debug!("Skipping short extent name {}", extent.disk_name),
            }
        }
        map
    }

    /// Append physical-mode RDM devices to the extent map
    pub fn add_rdm_backings<'a>(
        backings: impl IntoIterator<Item = &'a DiskBacking>,
        extents: &mut ExtentMap,
    ) {
        for backing in backings {
            if let Some((array, fragment)) = Self::rdm_identity(backing) {
                debug!("Found vm lun {}", fragment);
                extents.push(array, fragment);
            }
        }
    }

    /// WWN fragment of a LUN UUID, starting at the vendor token
    pub fn lun_wwn(uuid: &str) -> Option<&str> {
        let start = uuid.find(VENDOR_WWN_TOKEN)?;
        let end = (start + WWN_FRAGMENT_LEN).min(uuid.len());
        uuid.get(start..end)
    }

    /// (array serial, device fragment) of a VMFS extent disk name
    pub fn extent_identity(disk_name: &str) -> Option<(&str, &str)> {
        let array = disk_name.get(EXTENT_FRAGMENT_START..EXTENT_ARRAY_END)?;
        let fragment = disk_name.get(EXTENT_FRAGMENT_START..)?;
        Some((array, fragment))
    }

    /// (array serial, device fragment) of a physical-mode RDM backing
    pub fn rdm_identity(backing: &DiskBacking) -> Option<(&str, &str)> {
        if backing.compatibility_mode.as_deref() != Some(RDM_PHYSICAL_MODE) {
            return None;
        }
        let uuid = backing.lun_uuid.as_deref()?;
        let array = uuid.get(RDM_FRAGMENT_START..RDM_ARRAY_END)?;
        let end = uuid.len().checked_sub(RDM_SUFFIX_LEN)?;
        if end <= RDM_FRAGMENT_START {
            return None;
        }
        let fragment = uuid.get(RDM_FRAGMENT_START..end)?;
        Some((array, fragment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::model::{
        Cluster, Datastore, Folder, Host, InventoryNode, VirtualDevice, VirtualMachine, VmfsInfo,
    };

    const LUN_UUID: &str = "02000000006000097000019780012353303031414253594d4d4554";
    const RDM_UUID: &str = "020001000060000970000197800123533030314143535952444620";

    fn lun(uuid: &str) -> ScsiLun {
        ScsiLun {
            canonical_name: None,
            uuid: uuid.to_string(),
        }
    }

    fn rdm(mode: Option<&str>, uuid: &str) -> VirtualDevice {
        VirtualDevice {
            label: Some("Hard disk 2".into()),
            backing: Some(DiskBacking {
                compatibility_mode: mode.map(str::to_string),
                lun_uuid: Some(uuid.to_string()),
            }),
        }
    }

    #[test]
    fn test_lun_wwn_is_32_chars_from_token() {
        let wwn = IdentityExtractor::lun_wwn(LUN_UUID).unwrap();
        assert_eq!(wwn.len(), WWN_FRAGMENT_LEN);
        assert!(wwn.starts_with(VENDOR_WWN_TOKEN));
        assert_eq!(wwn, "60000970000197800123533030314142");
    }

    #[test]
    fn test_lun_without_token_is_discarded() {
        assert_eq!(IdentityExtractor::lun_wwn("0200000000600508b1001c"), None);
        let known = IdentityExtractor::known_wwns(&[lun("0200000000600508b1001c")]);
        assert!(known.is_empty());
    }

    #[test]
    fn test_known_wwns_deduplicate() {
        let luns = [lun(LUN_UUID), lun(LUN_UUID)];
        let known = IdentityExtractor::known_wwns(&luns);
        assert_eq!(known.len(), 1);
        assert!(known.contains("60000970000197800123533030314142"));
    }

    #[test]
    fn test_extent_identity_offsets() {
        let (array, fragment) =
            IdentityExtractor::extent_identity("naa.60000970000197800123533030314142").unwrap();
        assert_eq!(array, "000197800123");
        assert_eq!(fragment, "000197800123533030314142");

        assert_eq!(IdentityExtractor::extent_identity("naa.6000"), None);
    }

    #[test]
    fn test_rdm_identity_requires_physical_mode() {
        let physical = rdm(Some("physicalMode"), RDM_UUID);
        let (array, fragment) =
            IdentityExtractor::rdm_identity(physical.backing.as_ref().unwrap()).unwrap();
        assert_eq!(array, "000197800123");
        assert_eq!(fragment, "000197800123533030314143");

        let virtual_mode = rdm(Some("virtualMode"), RDM_UUID);
        assert_eq!(IdentityExtractor::rdm_identity(virtual_mode.backing.as_ref().unwrap()), None);

        let flat = rdm(None, RDM_UUID);
        assert_eq!(IdentityExtractor::rdm_identity(flat.backing.as_ref().unwrap()), None);
    }

    #[test]
    fn test_extract_skips_missing_metadata() {
        let dc = Datacenter {
            name: "dc1".into(),
            clusters: vec![Cluster {
                name: "c1".into(),
                hosts: vec![Host {
                    name: "esx1".into(),
                    scsi_luns: vec![lun(LUN_UUID), lun("mpx.vmhba32:C0:T0:L0")],
                }],
            }],
            datastores: vec![
                Datastore {
                    name: "nfs".into(),
                    vmfs: None,
                },
                Datastore {
                    name: "vmfs01".into(),
                    vmfs: Some(VmfsInfo {
                        extents: vec![VmfsExtent {
                            disk_name: "naa.60000970000197800123533030314142".into(),
                            partition: Some(1),
                        }],
                    }),
                },
            ],
            vm_folder: Folder {
                name: "vm".into(),
                child_entity: vec![InventoryNode::VirtualMachine(VirtualMachine {
                    name: "db01".into(),
                    devices: vec![
                        VirtualDevice {
                            label: Some("CD/DVD drive 1".into()),
                            backing: None,
                        },
                        rdm(Some("physicalMode"), RDM_UUID),
                    ],
                })],
            },
        };

        let identities = IdentityExtractor::extract(&[dc]);
        assert_eq!(identities.known_wwns.len(), 1);
        assert_eq!(
            identities.extents.fragments("000197800123"),
            &[
                "000197800123533030314142".to_string(),
                "000197800123533030314143".to_string(),
            ]
        );
        assert!(identities.extents.fragments("000197800999").is_empty());
    }
}
