//! Inventory Model
//!
//! The subset of the virtualization inventory the pairing run reads:
//! cluster hosts with their SCSI LUNs, datastores with their VMFS extents,
//! and the VM folder tree with each VM's disk backings. Field names follow
//! the inventory's own property names so the tree deserializes directly
//! from the endpoint's JSON.

use serde::{Deserialize, Serialize};

// =============================================================================
// Datacenter
// =============================================================================

/// One datacenter subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datacenter {
    pub name: String,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub datastores: Vec<Datastore>,
    #[serde(default)]
    pub vm_folder: Folder,
}

// =============================================================================
// Compute
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub name: String,
    #[serde(default)]
    pub scsi_luns: Vec<ScsiLun>,
}

/// A SCSI LUN as seen by a host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScsiLun {
    #[serde(default)]
    pub canonical_name: Option<String>,
    pub uuid: String,
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastore {
    pub name: String,
    /// Absent for NFS and vVol datastores
    #[serde(default)]
    pub vmfs: Option<VmfsInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmfsInfo {
    #[serde(default, rename = "extent")]
    pub extents: Vec<VmfsExtent>,
}

/// Disk partition backing a VMFS volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmfsExtent {
    /// e.g. `naa.60000970000197800123533030314142`
    pub disk_name: String,
    #[serde(default)]
    pub partition: Option<u32>,
}

// =============================================================================
// VM Folder Tree
// =============================================================================

/// A folder in the VM tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub child_entity: Vec<InventoryNode>,
}

/// Child of a VM folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InventoryNode {
    Folder(Folder),
    VirtualMachine(VirtualMachine),
    /// vApps, templates and anything else the run does not read
    #[serde(other)]
    Other,
}

impl Folder {
    /// All VMs under this folder, depth-first in document order
    pub fn virtual_machines(&self) -> Vec<&VirtualMachine> {
        let mut vms = Vec::new();
        self.collect_vms(&mut vms);
        vms
    }

    fn collect_vms<'a>(&'a self, out: &mut Vec<&'a VirtualMachine>) {
        for child in &self.child_entity {
            match child {
                InventoryNode::VirtualMachine(vm) => out.push(vm),
                InventoryNode::Folder(folder) => folder.collect_vms(out),
                InventoryNode::Other => {}
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub name: String,
    #[serde(default)]
    pub devices: Vec<VirtualDevice>,
}

/// A VM hardware device; only disks carry a backing the run reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDevice {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub backing: Option<DiskBacking>,
}

/// Disk backing; raw device mappings carry a compatibility mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskBacking {
    #[serde(default)]
    pub compatibility_mode: Option<String>,
    #[serde(default)]
    pub lun_uuid: Option<String>,
}
