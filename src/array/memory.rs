//! In-Memory Array Adapter
//!
//! Serves storage systems, volumes and their associations from memory,
//! answering the volume queries the pairing run issues. Used for tests and
//! offline dry runs.

use crate::domain::ports::{
    ArrayManagementClient, CimInstance, ObjectPath, VolumeRole, MASKING_GROUP_CLASS,
    REPLICA_PAIR_VIEW_CLASS, STORAGE_SYSTEM_CLASS, STORAGE_VOLUME_CLASS,
};
use crate::error::{Error, Result};
use async_trait::async_trait;

/// CIM_ERR_INVALID_QUERY
const ERR_INVALID_QUERY: u32 = 15;

/// Array management client over in-memory instances
#[derive(Debug, Clone, Default)]
pub struct InMemoryArrayClient {
    instances: Vec<CimInstance>,
    associations: Vec<(ObjectPath, CimInstance)>,
}

fn volume_path(system: &str, device_id: &str) -> ObjectPath {
    ObjectPath::new(STORAGE_VOLUME_CLASS)
        .with_key("CreationClassName", STORAGE_VOLUME_CLASS)
        .with_key("SystemName", system)
        .with_key("DeviceID", device_id)
}

impl InMemoryArrayClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a storage system; locality 2 marks it as local
    pub fn with_system(mut self, name: &str, locality: u16, last_sync: &str) -> Self {
        let path = ObjectPath::new(STORAGE_SYSTEM_CLASS)
            .with_key("CreationClassName", STORAGE_SYSTEM_CLASS)
            .with_key("Name", name);
        self.instances.push(
            CimInstance::new(STORAGE_SYSTEM_CLASS)
                .with_property("Name", name)
                .with_property("EMCLocality", locality.to_string())
                .with_property("EMCLastSyncTime", last_sync)
                .with_path(path),
        );
        self
    }

    /// Add a volume reported with the usage code of `role`
    pub fn with_volume(self, system: &str, device_id: &str, wwn: &str, blocks: u64, role: VolumeRole) -> Self {
        self.with_volume_usage(system, device_id, wwn, blocks, role.usage_code())
    }

    /// Add a volume with an arbitrary usage code
    pub fn with_volume_usage(
        mut self,
        system: &str,
        device_id: &str,
        wwn: &str,
        blocks: u64,
        usage: u16,
    ) -> Self {
        self.instances.push(
            CimInstance::new(STORAGE_VOLUME_CLASS)
                .with_property("SystemName", system)
                .with_property("DeviceID", device_id)
                .with_property("EMCWWN", wwn)
                .with_property("NumberOfBlocks", blocks.to_string())
                .with_property("Usage", usage.to_string())
                .with_path(volume_path(system, device_id)),
        );
        self
    }

    /// Record an established replica pair, reachable from the target volume
    pub fn with_replica_pair(mut self, system: &str, source: &str, target: &str) -> Self {
        let view = CimInstance::new(REPLICA_PAIR_VIEW_CLASS)
            .with_property("SVSourceDeviceID", source)
            .with_property("SVTargetDeviceID", target);
        self.associations.push((volume_path(system, target), view));
        self
    }

    /// Place a volume in a masking group
    pub fn with_masking_group(mut self, system: &str, device_id: &str, group: &str) -> Self {
        let group = CimInstance::new(MASKING_GROUP_CLASS).with_property("ElementName", group);
        self.associations.push((volume_path(system, device_id), group));
        self
    }

    /// Add an instance as-is
    pub fn with_instance(mut self, instance: CimInstance) -> Self {
        self.instances.push(instance);
        self
    }

    /// Add an association of any result class
    pub fn with_association(mut self, from: ObjectPath, instance: CimInstance) -> Self {
        self.associations.push((from, instance));
        self
    }
}

/// Predicates of `... WHERE <class>.SystemName='<x>' AND <class>.Usage=<n>`
#[derive(Debug, PartialEq, Eq)]
struct VolumeQuery {
    class_name: String,
    system_name: String,
    usage: String,
}

fn parse_volume_query(query: &str) -> Option<VolumeQuery> {
    let rest = query.trim().strip_prefix("SELECT * FROM ")?;
    let (class_name, predicates) = rest.split_once(" WHERE ")?;

    let system_start = predicates.find(".SystemName='")? + ".SystemName='".len();
    let system_len = predicates[system_start..].find('\'')?;
    let system_name = &predicates[system_start..system_start + system_len];

    let usage_start = predicates.find(".Usage=")? + ".Usage=".len();
    let usage: String = predicates[usage_start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if usage.is_empty() {
        return None;
    }

    Some(VolumeQuery {
        class_name: class_name.trim().to_string(),
        system_name: system_name.to_string(),
        usage,
    })
}

#[async_trait]
impl ArrayManagementClient for InMemoryArrayClient {
    async fn enumerate_instances(&self, class_name: &str) -> Result<Vec<CimInstance>> {
        Ok(self
            .instances
            .iter()
            .filter(|i| i.class_name == class_name)
            .cloned()
            .collect())
    }

    async fn exec_query(&self, query: &str) -> Result<Vec<CimInstance>> {
        let parsed = parse_volume_query(query).ok_or_else(|| Error::Cim {
            code: ERR_INVALID_QUERY,
            description: format!("unsupported query: {}", query),
        })?;

        Ok(self
            .instances
            .iter()
            .filter(|i| i.class_name == parsed.class_name)
            .filter(|i| i.get_str("SystemName") == Some(parsed.system_name.as_str()))
            .filter(|i| i.get_str("Usage") == Some(parsed.usage.as_str()))
            .cloned()
            .collect())
    }

    async fn associators(&self, path: &ObjectPath, result_class: &str) -> Result<Vec<CimInstance>> {
        Ok(self
            .associations
            .iter()
            .filter(|(from, instance)| from == path && instance.class_name == result_class)
            .map(|(_, instance)| instance.clone())
            .collect())
    }

    fn endpoint(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMM: &str = "SYMMETRIX-+-000197800123";

    #[test]
    fn test_parse_volume_query() {
        let query = "SELECT * FROM Symm_StorageVolume WHERE Symm_StorageVolume.SystemName='SYMMETRIX-+-000197800123' AND Symm_StorageVolume.Usage=9";
        assert_eq!(
            parse_volume_query(query),
            Some(VolumeQuery {
                class_name: STORAGE_VOLUME_CLASS.into(),
                system_name: SYMM.into(),
                usage: "9".into(),
            })
        );
        assert_eq!(parse_volume_query("SELECT Name FROM Symm_StorageSystem"), None);
    }

    #[tokio::test]
    async fn test_exec_query_filters_by_system_and_usage() {
        let client = InMemoryArrayClient::new()
            .with_volume(SYMM, "001", "wwn-1", 100, VolumeRole::ReplicationSource)
            .with_volume(SYMM, "101", "wwn-2", 100, VolumeRole::ReplicationTarget)
            .with_volume("SYMMETRIX-+-000197800999", "002", "wwn-3", 100, VolumeRole::ReplicationSource);

        let query = format!(
            "SELECT * FROM Symm_StorageVolume WHERE Symm_StorageVolume.SystemName='{}' AND Symm_StorageVolume.Usage=9",
            SYMM
        );
        let found = client.exec_query(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("DeviceID"), Some("001"));
        assert!(found[0].path.is_some());
    }

    #[tokio::test]
    async fn test_unsupported_query_is_cim_error() {
        let client = InMemoryArrayClient::new();
        let err = client.exec_query("SELECT Name FROM X").await.unwrap_err();
        assert!(matches!(err, Error::Cim { code: ERR_INVALID_QUERY, .. }));
    }

    #[tokio::test]
    async fn test_associators_filter_by_result_class() {
        let client = InMemoryArrayClient::new()
            .with_replica_pair(SYMM, "001", "201")
            .with_masking_group(SYMM, "201", "sg_r2");

        let path = volume_path(SYMM, "201");
        let pairs = client.associators(&path, REPLICA_PAIR_VIEW_CLASS).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].get_str("SVSourceDeviceID"), Some("001"));

        let groups = client.associators(&path, MASKING_GROUP_CLASS).await.unwrap();
        assert_eq!(groups[0].get_str("ElementName"), Some("sg_r2"));
    }
}
