//! XML Documents
//!
//! The two configuration documents consumed by the replication adapter.
//! Both are written indented, declared as ISO-8859-1 and encoded to match.

use super::CopySettings;
use crate::domain::ports::PairingMap;
use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Document schema version understood by the adapter
pub const DOCUMENT_VERSION: &str = "6.2";

const DOCUMENT_ENCODING: &str = "ISO-8859-1";

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Export(e.to_string())
}

/// Indented writer with element helpers
struct DocumentWriter {
    inner: Writer<Vec<u8>>,
}

impl DocumentWriter {
    fn new() -> Result<Self> {
        let mut inner = Writer::new_with_indent(Vec::new(), b' ', 2);
        inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some(DOCUMENT_ENCODING), None)))
            .map_err(xml_error)?;
        Ok(Self { inner })
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.inner
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_error)
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    /// `<name>value</name>`, or `<name/>` when the value is empty
    fn leaf(&mut self, name: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return self
                .inner
                .write_event(Event::Empty(BytesStart::new(name)))
                .map_err(xml_error);
        }
        self.open(name)?;
        self.inner
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml_error)?;
        self.close(name)
    }

    fn finish(self) -> Vec<u8> {
        let mut bytes = self.inner.into_inner();
        bytes.push(b'\n');
        let text = String::from_utf8_lossy(&bytes);
        to_latin1(&text)
    }
}

/// Latin-1 bytes; characters outside it become numeric references
pub fn to_latin1(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(byte) => out.push(byte),
            Err(_) => out.extend_from_slice(format!("&#{};", u32::from(c)).as_bytes()),
        }
    }
    out
}

/// Test failover document listing every source/target pair
pub fn failover_document(array_id: &str, copy: &CopySettings, pairs: &PairingMap) -> Result<Vec<u8>> {
    let mut doc = DocumentWriter::new()?;
    doc.open("TestFailoverInfo")?;
    doc.leaf("Version", DOCUMENT_VERSION)?;
    doc.open("CopyInfo")?;
    doc.leaf("ArrayId", array_id)?;
    doc.leaf("CopyType", &copy.copy_type)?;
    doc.leaf("CopyMode", &copy.copy_mode)?;
    doc.leaf("SavePoolName", "")?;
    doc.open("DeviceList")?;
    for pair in pairs.iter() {
        doc.open("DevicePair")?;
        doc.leaf("Source", &pair.source)?;
        doc.leaf("Target", &pair.target)?;
        doc.close("DevicePair")?;
    }
    doc.close("DeviceList")?;
    doc.close("CopyInfo")?;
    doc.close("TestFailoverInfo")?;
    Ok(doc.finish())
}

/// Masking document listing the paired targets under one mask view
pub fn masking_document(
    array_id: &str,
    storage_group: Option<&str>,
    pairs: &PairingMap,
) -> Result<Vec<u8>> {
    let mut doc = DocumentWriter::new()?;
    doc.open("DeviceMaskingInfo")?;
    doc.leaf("Version", DOCUMENT_VERSION)?;
    doc.open("MaskViewList")?;
    doc.open("MaskView")?;
    doc.leaf("ArrayId", array_id)?;
    doc.leaf("StorageGroup", storage_group.unwrap_or(""))?;
    doc.open("DeviceList")?;
    for pair in pairs.iter() {
        doc.leaf("Device", &pair.target)?;
    }
    doc.close("DeviceList")?;
    doc.close("MaskView")?;
    doc.close("MaskViewList")?;
    doc.close("DeviceMaskingInfo")?;
    Ok(doc.finish())
}
