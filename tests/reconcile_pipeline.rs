//! End-to-end runs over the in-memory adapters

use chrono::{TimeZone, Utc};
use replica_pairing::export::{DEVICE_LIST_FILE_NAME, MASKING_FILE_NAME};
use replica_pairing::{
    CopySettings, EngineConfig, Error, ExportWriter, InMemoryArrayClient, PairOrigin,
    PairingOutcome, ReconcileEngine, StaticInventoryClient, UsageMode, VolumeRole,
};
use std::sync::Arc;

const SYMM: &str = "SYMMETRIX-+-000197800123";
const SYNCED: &str = "20240315093000.000000+000";

fn wwn(tail: &str) -> String {
    format!("6000097000019780012353{}", tail)
}

fn lun_uuid(tail: &str) -> String {
    format!("0200000000{}53594d4d4554", wwn(tail))
}

/// Hosts see 001AB, 001AC, 00201 and 00300; datastore sits on 001BB
fn inventory() -> StaticInventoryClient {
    let json = format!(
        r#"[{{
            "name": "dc-prod",
            "clusters": [{{
                "name": "cluster-a",
                "hosts": [{{
                    "name": "esx01",
                    "scsiLuns": [
                        {{ "uuid": "{lun_ab}" }},
                        {{ "uuid": "{lun_ac}" }},
                        {{ "uuid": "{lun_201}" }},
                        {{ "uuid": "{lun_300}" }},
                        {{ "canonicalName": "mpx.vmhba32:C0:T0:L0", "uuid": "0005000000766d686261" }}
                    ]
                }}]
            }}],
            "datastores": [
                {{ "name": "nfs-iso" }},
                {{ "name": "vmfs-prod", "vmfs": {{ "extent": [{{ "diskName": "naa.{extent}", "partition": 1 }}] }} }}
            ],
            "vmFolder": {{
                "name": "vm",
                "childEntity": [
                    {{ "type": "Folder", "name": "db", "childEntity": [
                        {{ "type": "VirtualMachine", "name": "db01", "devices": [
                            {{ "label": "Hard disk 1" }},
                            {{ "label": "Hard disk 2", "backing": {{ "compatibilityMode": "virtualMode", "lunUuid": "x" }} }}
                        ] }}
                    ] }},
                    {{ "type": "VirtualApp", "name": "vapp" }}
                ]
            }}
        }}]"#,
        lun_ab = lun_uuid("3030314142"),
        lun_ac = lun_uuid("3030314143"),
        lun_201 = lun_uuid("3030323031"),
        lun_300 = lun_uuid("3030333030"),
        extent = wwn("3030314242"),
    );
    StaticInventoryClient::from_json(&json).unwrap()
}

fn array() -> InMemoryArrayClient {
    InMemoryArrayClient::new()
        .with_system("SYMMETRIX-+-000197800456", 1, SYNCED)
        .with_system(SYMM, 2, SYNCED)
        .with_volume(SYMM, "001AB", &wwn("3030314142"), 2048, VolumeRole::ReplicationSource)
        .with_volume(SYMM, "001AC", &wwn("3030314143"), 1024, VolumeRole::ReplicationSource)
        // not visible to the hosts
        .with_volume(SYMM, "001AD", &wwn("3030314144"), 1024, VolumeRole::ReplicationSource)
        .with_volume(SYMM, "00201", &wwn("3030323031"), 2048, VolumeRole::PairedTarget)
        .with_replica_pair(SYMM, "001AB", "00201")
        .with_volume(SYMM, "00300", &wwn("3030333030"), 1024, VolumeRole::ReplicationTarget)
        .with_volume(SYMM, "001BB", &wwn("3030314242"), 1024, VolumeRole::ReplicationTarget)
        .with_volume(SYMM, "001BC", &wwn("3030314243"), 1024, VolumeRole::ReplicationTarget)
        .with_volume(SYMM, "001BD", &wwn("3030314244"), 4096, VolumeRole::ReplicationTarget)
        .with_masking_group(SYMM, "001AC", "esx_prod_sg")
}

fn engine(array: InMemoryArrayClient) -> ReconcileEngine {
    ReconcileEngine::new(EngineConfig::default(), Arc::new(inventory()), Arc::new(array))
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 35, 0).unwrap()
}

#[tokio::test]
async fn failover_run_pairs_presented_targets() {
    let report = engine(array()).run_at(UsageMode::Failover, now()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.array.serial(), "000197800123");
    assert_eq!(report.discovered, 1);

    let pairs: Vec<_> = report
        .pairs
        .iter()
        .map(|p| (p.source.as_str(), p.target.as_str(), p.origin))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("001AB", "00201", PairOrigin::Discovered),
            ("001AC", "00300", PairOrigin::Synthesized),
        ]
    );

    let dir = tempfile::tempdir().unwrap();
    let path = ExportWriter::new(dir.path())
        .write_failover(&report, &CopySettings::default())
        .await
        .unwrap();
    let xml = std::fs::read_to_string(path).unwrap();
    assert!(xml.contains("<ArrayId>000197800123</ArrayId>"));
    assert!(xml.contains("<Source>001AC</Source>"));
    assert!(xml.contains("<Target>00300</Target>"));
}

#[tokio::test]
async fn masking_run_skips_in_use_and_presented_targets() {
    let report = engine(array()).run_at(UsageMode::Masking, now()).await.unwrap();

    // 00300 is presented, 001BB backs a datastore
    assert_eq!(report.masking_devices, vec!["001BC", "001BD"]);
    assert!(report.is_success());
    assert_eq!(report.pairs.target_of("001AC"), Some("001BC"));
    assert_eq!(report.storage_group.as_deref(), Some("esx_prod_sg"));

    let dir = tempfile::tempdir().unwrap();
    let writer = ExportWriter::new(dir.path());
    writer.write_device_list(&report).await.unwrap();
    writer.write_masking(&report).await.unwrap();

    let list = std::fs::read_to_string(dir.path().join(DEVICE_LIST_FILE_NAME)).unwrap();
    assert_eq!(list, "Device list: \n001BC\n001BD\n");
    let xml = std::fs::read_to_string(dir.path().join(MASKING_FILE_NAME)).unwrap();
    assert!(xml.contains("<StorageGroup>esx_prod_sg</StorageGroup>"));
    assert!(xml.contains("<Device>001BC</Device>"));
}

#[tokio::test]
async fn masking_run_without_enough_targets_reports_failure() {
    let array = InMemoryArrayClient::new()
        .with_system(SYMM, 2, SYNCED)
        .with_volume(SYMM, "001AB", &wwn("3030314142"), 2048, VolumeRole::ReplicationSource)
        .with_volume(SYMM, "001AC", &wwn("3030314143"), 1024, VolumeRole::ReplicationSource)
        .with_volume(SYMM, "001BC", &wwn("3030314243"), 1024, VolumeRole::ReplicationTarget);

    let report = engine(array).run_at(UsageMode::Masking, now()).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(
        report.outcome,
        PairingOutcome::InsufficientTargets {
            sources: 2,
            targets: 1
        }
    );
    assert!(report.pairs.is_empty());
    assert_eq!(report.masking_devices, vec!["001BC"]);
}

#[tokio::test]
async fn stale_provider_data_aborts_unless_diagnostics() {
    let later = Utc.with_ymd_and_hms(2024, 3, 15, 11, 0, 0).unwrap();

    let err = engine(array()).run_at(UsageMode::Failover, later).await.unwrap_err();
    assert!(matches!(err, Error::StaleArrayData { minutes: 90, .. }));
    assert_eq!(err.exit_code(), 4);

    let lenient = ReconcileEngine::new(
        EngineConfig {
            diagnostics_enabled: true,
            ..EngineConfig::default()
        },
        Arc::new(inventory()),
        Arc::new(array()),
    );
    assert!(lenient.run_at(UsageMode::Failover, later).await.is_ok());
}
