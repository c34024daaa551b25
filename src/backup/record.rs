//! Bundle records: the definition record and per-version records in
//! either format

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flowvault_protocol::{DefinitionSpec, VersionSpec, VersionStatus, METADATA_NAMESPACE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::VersionPayload;

use super::markup::{from_markup, to_markup, MarkupError};

const VERSION_ROOT: &str = "Flow";
const DEFINITION_ROOT: &str = "FlowDefinition";

/// Errors reading or writing a bundle
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Markup {
        path: PathBuf,
        #[source]
        source: MarkupError,
    },

    #[error("{}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} is not a flow bundle file", .0.display())]
    NotABundleFile(PathBuf),

    #[error("bundle has no definition record for '{0}'")]
    MissingDefinitionRecord(String),

    #[error("{}: {reason}", path.display())]
    InvalidRecord { path: PathBuf, reason: String },

    #[error("bundle has no version files for '{0}'")]
    NoVersions(String),
}

impl BundleError {
    fn io(path: &Path, source: io::Error) -> Self {
        BundleError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn invalid(path: &Path, reason: impl Into<String>) -> Self {
        BundleError::InvalidRecord {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// The two forms a version record is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Pretty-printed JSON, the primary form
    Structured,
    /// Markup mirror
    Markup,
}

impl RecordFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(RecordFormat::Structured),
            "xml" => Some(RecordFormat::Markup),
            _ => None,
        }
    }
}

/// Write `contents`, creating parent directories.
pub(crate) fn write_file(path: &Path, contents: &str) -> Result<(), BundleError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BundleError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| BundleError::io(path, e))
}

fn read_file(path: &Path) -> Result<String, BundleError> {
    fs::read_to_string(path).map_err(|e| BundleError::io(path, e))
}

/// Four-space pretty JSON with sorted keys and a trailing newline.
pub fn to_pretty_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// One version of a flow, in canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub developer_name: String,
    pub version_number: u32,
    /// Fetched payload, field for field
    pub payload: VersionPayload,
}

impl VersionRecord {
    pub fn new(developer_name: impl Into<String>, version_number: u32, payload: VersionPayload) -> Self {
        Self {
            developer_name: developer_name.into(),
            version_number,
            payload,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        to_pretty_json(&Value::Object(self.payload.clone()))
    }

    pub fn to_markup(&self) -> Result<String, MarkupError> {
        to_markup(VERSION_ROOT, Some(METADATA_NAMESPACE), &self.payload)
    }

    /// Read a version file. The name and number come from the file name;
    /// a `VersionNumber` in the payload must agree with it.
    pub fn read(
        path: &Path,
        developer_name: &str,
        version_number: u32,
        format: RecordFormat,
    ) -> Result<Self, BundleError> {
        let text = read_file(path)?;

        let payload = match format {
            RecordFormat::Structured => {
                let value: Value = serde_json::from_str(&text).map_err(|source| BundleError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
                match value {
                    Value::Object(map) => map,
                    _ => return Err(BundleError::invalid(path, "version record is not a JSON object")),
                }
            }
            RecordFormat::Markup => {
                let (root, map) = from_markup(&text).map_err(|source| BundleError::Markup {
                    path: path.to_path_buf(),
                    source,
                })?;
                if root != VERSION_ROOT {
                    return Err(BundleError::invalid(
                        path,
                        format!("expected <{}> root element, found <{}>", VERSION_ROOT, root),
                    ));
                }
                map
            }
        };

        if let Some(declared) = payload.get("VersionNumber") {
            if declared.as_u64() != Some(u64::from(version_number)) {
                return Err(BundleError::invalid(
                    path,
                    format!(
                        "VersionNumber {} does not match version {} in the file name",
                        declared, version_number
                    ),
                ));
            }
        }

        Ok(Self::new(developer_name, version_number, payload))
    }

    /// Create request for this version under `definition_id`.
    pub fn to_spec(&self, definition_id: &str, active_version_number: Option<u32>) -> VersionSpec {
        let text = |key: &str| self.payload.get(key).and_then(Value::as_str).map(str::to_string);
        let present = |key: &str| self.payload.get(key).filter(|v| !v.is_null()).cloned();

        VersionSpec {
            definition_id: definition_id.to_string(),
            version_number: self.version_number,
            api_version: present("ApiVersion"),
            status: VersionStatus::for_version(self.version_number, active_version_number),
            description: text("Description").unwrap_or_default(),
            process_type: text("ProcessType"),
            full_name: text("FullName"),
            metadata: present("Metadata"),
        }
    }
}

/// Definition-level record of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    pub developer_name: String,
    pub active_version_number: Option<u32>,
    pub description: Option<String>,
}

impl DefinitionRecord {
    /// Plain markup, readable by tools that know nothing of the type hints.
    pub fn to_markup(&self) -> Result<String, MarkupError> {
        let mut fields = Map::new();
        if let Some(n) = self.active_version_number {
            fields.insert("activeVersionNumber".to_string(), Value::String(n.to_string()));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            fields.insert("description".to_string(), Value::String(description.to_string()));
        }
        to_markup(DEFINITION_ROOT, Some(METADATA_NAMESPACE), &fields)
    }

    pub fn read(path: &Path, developer_name: &str) -> Result<Self, BundleError> {
        let text = read_file(path)?;
        let (root, fields) = from_markup(&text).map_err(|source| BundleError::Markup {
            path: path.to_path_buf(),
            source,
        })?;
        if root != DEFINITION_ROOT {
            return Err(BundleError::invalid(
                path,
                format!("expected <{}> root element, found <{}>", DEFINITION_ROOT, root),
            ));
        }

        let active_version_number = match fields.get("activeVersionNumber") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.trim().parse::<u32>().map_err(|_| {
                BundleError::invalid(path, format!("activeVersionNumber '{}' is not a version number", s))
            })?),
            Some(Value::Number(n)) => Some(
                n.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| BundleError::invalid(path, format!("activeVersionNumber {} is out of range", n)))?,
            ),
            Some(other) => {
                return Err(BundleError::invalid(
                    path,
                    format!("activeVersionNumber has unexpected value {}", other),
                ))
            }
        };

        let description = fields
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(Self {
            developer_name: developer_name.to_string(),
            active_version_number,
            description,
        })
    }

    pub fn to_spec(&self) -> DefinitionSpec {
        DefinitionSpec {
            developer_name: self.developer_name.clone(),
            active_version_number: self.active_version_number,
            description: self.description.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn payload() -> VersionPayload {
        match json!({
            "ApiVersion": 52.0,
            "Description": "first cut",
            "FullName": "Order_Flow-1",
            "Metadata": { "label": "Order Flow", "variables": [{ "name": "x" }] },
            "ProcessType": "AutoLaunchedFlow",
            "Status": "Obsolete",
            "VersionNumber": 1
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_pretty_json_is_sorted_and_indented() {
        let text = to_pretty_json(&json!({ "b": 1, "a": { "c": true } })).unwrap();
        assert_eq!(text, "{\n    \"a\": {\n        \"c\": true\n    },\n    \"b\": 1\n}\n");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(RecordFormat::from_path(Path::new("a/X-1.flow.json")), Some(RecordFormat::Structured));
        assert_eq!(RecordFormat::from_path(Path::new("a/X-1.flow-meta.xml")), Some(RecordFormat::Markup));
        assert_eq!(RecordFormat::from_path(Path::new("a/X-1.txt")), None);
    }

    #[test]
    fn test_both_forms_read_back_identically() {
        let dir = TempDir::new().unwrap();
        let record = VersionRecord::new("Order_Flow", 1, payload());
        let json_path = dir.path().join("Order_Flow-1.flow.json");
        let xml_path = dir.path().join("Order_Flow-1.flow-meta.xml");
        write_file(&json_path, &record.to_json().unwrap()).unwrap();
        write_file(&xml_path, &record.to_markup().unwrap()).unwrap();

        let from_json = VersionRecord::read(&json_path, "Order_Flow", 1, RecordFormat::Structured).unwrap();
        let from_xml = VersionRecord::read(&xml_path, "Order_Flow", 1, RecordFormat::Markup).unwrap();
        assert_eq!(from_json, record);
        assert_eq!(from_xml, record);
    }

    #[test]
    fn test_version_number_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Order_Flow-2.flow.json");
        write_file(&path, &VersionRecord::new("Order_Flow", 1, payload()).to_json().unwrap()).unwrap();

        let err = VersionRecord::read(&path, "Order_Flow", 2, RecordFormat::Structured).unwrap_err();
        assert!(matches!(err, BundleError::InvalidRecord { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Order_Flow-1.flow.json");
        write_file(&path, "{ not json").unwrap();
        assert!(matches!(
            VersionRecord::read(&path, "Order_Flow", 1, RecordFormat::Structured),
            Err(BundleError::Json { .. })
        ));
    }

    #[test]
    fn test_to_spec() {
        let record = VersionRecord::new("Order_Flow", 1, payload());

        let spec = record.to_spec("300A", Some(1));
        assert_eq!(spec.status, VersionStatus::Active);
        assert_eq!(spec.description, "first cut");
        assert_eq!(spec.api_version, Some(json!(52.0)));
        assert_eq!(spec.process_type.as_deref(), Some("AutoLaunchedFlow"));
        assert_eq!(spec.metadata, payload().get("Metadata").cloned());

        assert_eq!(record.to_spec("300A", Some(2)).status, VersionStatus::Inactive);
    }

    #[test]
    fn test_definition_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Order_Flow.flowDefinition-meta.xml");
        let record = DefinitionRecord {
            developer_name: "Order_Flow".into(),
            active_version_number: Some(2),
            description: Some("Routes orders".into()),
        };
        let markup = record.to_markup().unwrap();
        assert!(markup.contains("<activeVersionNumber>2</activeVersionNumber>"));
        write_file(&path, &markup).unwrap();

        let read = DefinitionRecord::read(&path, "Order_Flow").unwrap();
        assert_eq!(read, record);
        assert_eq!(read.to_spec().active_version_number, Some(2));
    }

    #[test]
    fn test_definition_record_bad_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("X.flowDefinition-meta.xml");
        write_file(
            &path,
            "<FlowDefinition><activeVersionNumber>two</activeVersionNumber></FlowDefinition>",
        )
        .unwrap();
        assert!(matches!(
            DefinitionRecord::read(&path, "X"),
            Err(BundleError::InvalidRecord { .. })
        ));
    }
}
