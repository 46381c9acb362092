//! CIM-XML Codec
//!
//! Builds intrinsic method call requests and parses the provider's
//! responses into [`CimInstance`] records. Only the three read operations
//! the pairing run issues are supported.

use crate::domain::ports::{CimInstance, CimValue, ObjectPath};
use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

// =============================================================================
// Constants
// =============================================================================

/// Query language used for every volume query
pub const QUERY_LANGUAGE: &str = "DMTF:CQL";

const CIM_VERSION: &str = "2.0";
const DTD_VERSION: &str = "2.0";
const PROTOCOL_VERSION: &str = "1.0";

// =============================================================================
// Operations
// =============================================================================

/// An intrinsic read operation
#[derive(Debug, Clone, Copy)]
pub enum CimOperation<'a> {
    EnumerateInstances {
        class_name: &'a str,
    },
    ExecQuery {
        query_language: &'a str,
        query: &'a str,
    },
    Associators {
        object_name: &'a ObjectPath,
        result_class: &'a str,
    },
}

impl CimOperation<'_> {
    /// Intrinsic method name, also sent as the `CIMMethod` header
    pub fn method_name(&self) -> &'static str {
        match self {
            CimOperation::EnumerateInstances { .. } => "EnumerateInstances",
            CimOperation::ExecQuery { .. } => "ExecQuery",
            CimOperation::Associators { .. } => "Associators",
        }
    }
}

/// Percent-encoded namespace for the `CIMObject` header
pub fn encode_namespace(namespace: &str) -> String {
    urlencoding::encode(namespace).into_owned()
}

// =============================================================================
// Request Encoding
// =============================================================================

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::CimParse(e.to_string())
}

type XmlWriter = Writer<Vec<u8>>;

fn start(writer: &mut XmlWriter, element: BytesStart<'_>) -> Result<()> {
    writer.write_event(Event::Start(element)).map_err(xml_error)
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn empty(writer: &mut XmlWriter, element: BytesStart<'_>) -> Result<()> {
    writer.write_event(Event::Empty(element)).map_err(xml_error)
}

fn text(writer: &mut XmlWriter, content: &str) -> Result<()> {
    writer
        .write_event(Event::Text(BytesText::new(content)))
        .map_err(xml_error)
}

fn value_param(writer: &mut XmlWriter, name: &str, value: &str) -> Result<()> {
    start(writer, BytesStart::new("IPARAMVALUE").with_attributes([("NAME", name)]))?;
    start(writer, BytesStart::new("VALUE"))?;
    text(writer, value)?;
    end(writer, "VALUE")?;
    end(writer, "IPARAMVALUE")
}

fn classname_param(writer: &mut XmlWriter, name: &str, class_name: &str) -> Result<()> {
    start(writer, BytesStart::new("IPARAMVALUE").with_attributes([("NAME", name)]))?;
    empty(writer, BytesStart::new("CLASSNAME").with_attributes([("NAME", class_name)]))?;
    end(writer, "IPARAMVALUE")
}

fn instance_name(writer: &mut XmlWriter, path: &ObjectPath) -> Result<()> {
    start(
        writer,
        BytesStart::new("INSTANCENAME").with_attributes([("CLASSNAME", path.class_name.as_str())]),
    )?;
    for (key, value) in &path.keybindings {
        start(writer, BytesStart::new("KEYBINDING").with_attributes([("NAME", key.as_str())]))?;
        start(writer, BytesStart::new("KEYVALUE").with_attributes([("VALUETYPE", "string")]))?;
        text(writer, value)?;
        end(writer, "KEYVALUE")?;
        end(writer, "KEYBINDING")?;
    }
    end(writer, "INSTANCENAME")
}

/// Encode a method call document
pub fn build_request(message_id: u64, namespace: &str, operation: &CimOperation<'_>) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;

    let id = message_id.to_string();
    start(
        &mut writer,
        BytesStart::new("CIM").with_attributes([("CIMVERSION", CIM_VERSION), ("DTDVERSION", DTD_VERSION)]),
    )?;
    start(
        &mut writer,
        BytesStart::new("MESSAGE").with_attributes([("ID", id.as_str()), ("PROTOCOLVERSION", PROTOCOL_VERSION)]),
    )?;
    start(&mut writer, BytesStart::new("SIMPLEREQ"))?;
    start(
        &mut writer,
        BytesStart::new("IMETHODCALL").with_attributes([("NAME", operation.method_name())]),
    )?;

    start(&mut writer, BytesStart::new("LOCALNAMESPACEPATH"))?;
    for segment in namespace.split('/').filter(|s| !s.is_empty()) {
        empty(&mut writer, BytesStart::new("NAMESPACE").with_attributes([("NAME", segment)]))?;
    }
    end(&mut writer, "LOCALNAMESPACEPATH")?;

    match operation {
        CimOperation::EnumerateInstances { class_name } => {
            classname_param(&mut writer, "ClassName", class_name)?;
            value_param(&mut writer, "LocalOnly", "FALSE")?;
        }
        CimOperation::ExecQuery {
            query_language,
            query,
        } => {
            value_param(&mut writer, "QueryLanguage", query_language)?;
            value_param(&mut writer, "Query", query)?;
        }
        CimOperation::Associators {
            object_name,
            result_class,
        } => {
            start(
                &mut writer,
                BytesStart::new("IPARAMVALUE").with_attributes([("NAME", "ObjectName")]),
            )?;
            instance_name(&mut writer, object_name)?;
            end(&mut writer, "IPARAMVALUE")?;
            classname_param(&mut writer, "ResultClass", result_class)?;
        }
    }

    end(&mut writer, "IMETHODCALL")?;
    end(&mut writer, "SIMPLEREQ")?;
    end(&mut writer, "MESSAGE")?;
    end(&mut writer, "CIM")?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

// =============================================================================
// Response Decoding
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyKind {
    Scalar,
    Array,
    Reference,
}

#[derive(Debug)]
struct PendingProperty {
    name: String,
    kind: PropertyKind,
    value: CimValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    KeyValue,
    PropertyValue,
}

/// Event-driven decoder state for one response document
#[derive(Debug)]
struct ResponseParser {
    instances: Vec<CimInstance>,
    /// Path waiting for the INSTANCE it names
    pending_path: Option<ObjectPath>,
    /// INSTANCENAMEs being read; nested when a key is itself a reference
    paths: Vec<(ObjectPath, Option<String>)>,
    instance: Option<CimInstance>,
    property: Option<PendingProperty>,
    text_target: TextTarget,
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

impl ResponseParser {
    fn new() -> Self {
        Self {
            instances: Vec::new(),
            pending_path: None,
            paths: Vec::new(),
            instance: None,
            property: None,
            text_target: TextTarget::None,
        }
    }

    fn start(&mut self, element: &BytesStart<'_>) -> Result<()> {
        match element.name().as_ref() {
            b"ERROR" => {
                let code = attribute(element, b"CODE")?
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(1);
                let description = attribute(element, b"DESCRIPTION")?.unwrap_or_default();
                return Err(Error::Cim { code, description });
            }
            b"INSTANCENAME" => {
                let class_name = attribute(element, b"CLASSNAME")?.unwrap_or_default();
                self.paths.push((ObjectPath::new(class_name), None));
            }
            b"KEYBINDING" => {
                let name = attribute(element, b"NAME")?.unwrap_or_default();
                if let Some((_, key)) = self.paths.last_mut() {
                    *key = Some(name);
                }
            }
            b"KEYVALUE" => {
                if let Some((path, key)) = self.paths.last_mut() {
                    path.keybindings
                        .push((key.clone().unwrap_or_default(), String::new()));
                    self.text_target = TextTarget::KeyValue;
                }
            }
            b"INSTANCE" => {
                let class_name = attribute(element, b"CLASSNAME")?.unwrap_or_default();
                let mut instance = CimInstance::new(class_name);
                instance.path = self.pending_path.take();
                self.instance = Some(instance);
            }
            tag @ (b"PROPERTY" | b"PROPERTY.ARRAY" | b"PROPERTY.REFERENCE") => {
                if self.instance.is_some() {
                    let kind = match tag {
                        b"PROPERTY.ARRAY" => PropertyKind::Array,
                        b"PROPERTY.REFERENCE" => PropertyKind::Reference,
                        _ => PropertyKind::Scalar,
                    };
                    self.property = Some(PendingProperty {
                        name: attribute(element, b"NAME")?.unwrap_or_default(),
                        kind,
                        value: CimValue::Null,
                    });
                }
            }
            b"VALUE.ARRAY" => {
                if let Some(property) = self.property.as_mut() {
                    property.value = CimValue::Array(Vec::new());
                }
            }
            b"VALUE" => {
                if let Some(property) = self.property.as_mut() {
                    match &mut property.value {
                        CimValue::Array(values) => values.push(String::new()),
                        value => *value = CimValue::Scalar(String::new()),
                    }
                    self.text_target = TextTarget::PropertyValue;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"KEYVALUE" | b"VALUE" => self.text_target = TextTarget::None,
            b"INSTANCENAME" => {
                if let Some((path, _)) = self.paths.pop() {
                    if let Some((parent, key)) = self.paths.last_mut() {
                        parent
                            .keybindings
                            .push((key.clone().unwrap_or_default(), path.to_string()));
                    } else if let Some(property) = self.property.as_mut() {
                        if property.kind == PropertyKind::Reference {
                            property.value = CimValue::Scalar(path.to_string());
                        }
                    } else {
                        self.pending_path = Some(path);
                    }
                }
            }
            b"PROPERTY" | b"PROPERTY.ARRAY" | b"PROPERTY.REFERENCE" => {
                if let (Some(property), Some(instance)) = (self.property.take(), self.instance.as_mut()) {
                    instance.properties.insert(property.name, property.value);
                }
            }
            b"INSTANCE" => {
                if let Some(instance) = self.instance.take() {
                    self.instances.push(instance);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, content: &str) {
        match self.text_target {
            TextTarget::KeyValue => {
                if let Some((_, value)) = self
                    .paths
                    .last_mut()
                    .and_then(|(path, _)| path.keybindings.last_mut())
                {
                    value.push_str(content);
                }
            }
            TextTarget::PropertyValue => {
                if let Some(property) = self.property.as_mut() {
                    match &mut property.value {
                        CimValue::Scalar(value) => value.push_str(content),
                        CimValue::Array(values) => {
                            if let Some(value) = values.last_mut() {
                                value.push_str(content);
                            }
                        }
                        CimValue::Null => {}
                    }
                }
            }
            TextTarget::None => {}
        }
    }
}

/// Decode a response document into the instances it carries
pub fn parse_response(xml: &str) -> Result<Vec<CimInstance>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = ResponseParser::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => parser.start(&e)?,
            Event::Empty(e) => {
                parser.start(&e)?;
                parser.end(e.name().as_ref());
            }
            Event::End(e) => parser.end(e.name().as_ref()),
            Event::Text(t) => {
                let content = t.unescape().map_err(xml_error)?;
                parser.text(&content);
            }
            Event::CData(c) => {
                let content = String::from_utf8_lossy(&c).into_owned();
                parser.text(&content);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(parser.instances)
}
