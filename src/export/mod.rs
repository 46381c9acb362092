//! Export Module
//!
//! Turns a finished run into the files the replication adapter reads: the
//! test failover configuration, the masking configuration and a flat list
//! of masking candidates.

pub mod document;

pub use document::*;

use crate::error::Result;
use crate::reconcile::ReconcileReport;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const FAILOVER_FILE_NAME: &str = "EmcSrdfSraTestFailoverConfig.xml";
pub const MASKING_FILE_NAME: &str = "EmcSrdfSraMaskingInfo.xml";
pub const DEVICE_LIST_FILE_NAME: &str = "AllMaskingDevices.txt";

/// Fixed copy fields of the failover document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySettings {
    pub copy_type: String,
    pub copy_mode: String,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            copy_type: "SNAPVX".to_string(),
            copy_mode: "NOCOPY".to_string(),
        }
    }
}

/// Audit list of candidate devices, one per line
pub fn device_list(devices: &[String]) -> String {
    let mut out = String::from("Device list: \n");
    for device in devices {
        out.push_str(device);
        out.push('\n');
    }
    out
}

/// Writes export artifacts into one directory
#[derive(Debug, Clone)]
pub struct ExportWriter {
    output_dir: PathBuf,
}

impl ExportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn write(&self, file_name: &str, contents: Vec<u8>) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, contents).await?;
        info!("{} file generated successfully", path.display());
        Ok(path)
    }

    pub async fn write_failover(&self, report: &ReconcileReport, copy: &CopySettings) -> Result<PathBuf> {
        let bytes = failover_document(report.array.serial(), copy, &report.pairs)?;
        self.write(FAILOVER_FILE_NAME, bytes).await
    }

    pub async fn write_masking(&self, report: &ReconcileReport) -> Result<PathBuf> {
        let bytes = masking_document(
            report.array.serial(),
            report.storage_group.as_deref(),
            &report.pairs,
        )?;
        self.write(MASKING_FILE_NAME, bytes).await
    }

    pub async fn write_device_list(&self, report: &ReconcileReport) -> Result<PathBuf> {
        let text = device_list(&report.masking_devices);
        self.write(DEVICE_LIST_FILE_NAME, text.into_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{ArraySystem, PairOrigin, PairingMap, ReplicaPair, UsageMode};
    use crate::reconcile::PairingOutcome;

    fn report() -> ReconcileReport {
        let mut pairs = PairingMap::new();
        pairs.insert(ReplicaPair {
            source: "001".into(),
            target: "101".into(),
            origin: PairOrigin::Synthesized,
        });
        ReconcileReport {
            mode: UsageMode::Masking,
            array: ArraySystem {
                name: "SYMMETRIX-+-000197800123".into(),
                last_sync: chrono::Utc::now().fixed_offset(),
            },
            pairs,
            outcome: PairingOutcome::Paired { synthesized: 1 },
            discovered: 0,
            masking_devices: vec!["101".into(), "102".into()],
            storage_group: Some("esx_sg".into()),
        }
    }

    #[test]
    fn test_device_list_format() {
        assert_eq!(
            device_list(&["101".into(), "102".into()]),
            "Device list: \n101\n102\n"
        );
        assert_eq!(device_list(&[]), "Device list: \n");
    }

    #[tokio::test]
    async fn test_writes_artifacts_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ExportWriter::new(dir.path());
        let report = report();

        let list = writer.write_device_list(&report).await.unwrap();
        let masking = writer.write_masking(&report).await.unwrap();
        let failover = writer
            .write_failover(&report, &CopySettings::default())
            .await
            .unwrap();

        assert_eq!(list, dir.path().join(DEVICE_LIST_FILE_NAME));
        assert_eq!(
            std::fs::read_to_string(&list).unwrap(),
            "Device list: \n101\n102\n"
        );

        let masking = std::fs::read_to_string(masking).unwrap();
        assert!(masking.contains("<ArrayId>000197800123</ArrayId>"));
        assert!(masking.contains("<StorageGroup>esx_sg</StorageGroup>"));

        let failover = std::fs::read_to_string(failover).unwrap();
        assert!(failover.contains("<Source>001</Source>"));
        assert!(failover.contains("<Target>101</Target>"));
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ExportWriter::new(dir.path().join("missing"));
        let err = writer.write_device_list(&report()).await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
