//! Device type catalog.
//!
//! The catalog is read-only configuration describing every device type the
//! user can place: its modality, the protocols it speaks (and in which
//! direction), whether it roots the home network, whether it is mobile, and
//! its default property values (including `cost`).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

/// Catalog bundled with the binary, used when no catalog path is configured.
pub const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

/// Type name given to placeholder descriptors for unrecognised node types.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Sensing / role category of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "environmental")]
    Environmental,
    #[serde(rename = "wearable")]
    Wearable,
    #[serde(rename = "video")]
    Video,
    /// Forwarding gateway.
    #[serde(rename = "gateway")]
    Gateway,
    #[serde(rename = "water")]
    Water,
    #[serde(rename = "3G")]
    Cellular,
    #[serde(rename = "hub")]
    Hub,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Modality::Environmental => "environmental",
            Modality::Wearable => "wearable",
            Modality::Video => "video",
            Modality::Gateway => "gateway",
            Modality::Water => "water",
            Modality::Cellular => "3G",
            Modality::Hub => "hub",
            Modality::Processing => "processing",
            Modality::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

fn default_outputs() -> u32 {
    1
}

/// Immutable descriptor shared by every node of one type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceType {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub label: String,
    pub modality: Modality,
    /// Protocols the device supports.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Protocols the device can only receive.
    #[serde(default, rename = "capabilitiesOnlyInput")]
    pub only_input: Vec<String>,
    /// Protocols the device can only emit.
    #[serde(default, rename = "capabilitiesOnlyOutput")]
    pub only_output: Vec<String>,
    #[serde(default)]
    pub is_home_gateway: bool,
    #[serde(default)]
    pub mobile: bool,
    /// Number of output ports, used to shape exported wire lists.
    #[serde(default = "default_outputs")]
    pub outputs: u32,
    /// Default property values for new nodes of this type.
    #[serde(default)]
    pub defaults: Map<String, Value>,
    /// Set on descriptors synthesised for unrecognised types during import.
    #[serde(skip)]
    pub placeholder: bool,
}

impl DeviceType {
    /// Descriptor standing in for a type missing from the catalog.
    pub fn placeholder(original_type: &str, outputs: u32) -> Self {
        Self {
            type_name: UNKNOWN_TYPE.to_string(),
            label: format!("unknown: {}", original_type),
            modality: Modality::Unknown,
            capabilities: Vec::new(),
            only_input: Vec::new(),
            only_output: Vec::new(),
            is_home_gateway: false,
            mobile: false,
            outputs,
            defaults: Map::new(),
            placeholder: true,
        }
    }

    pub fn supports(&self, protocol: &str) -> bool {
        self.capabilities.iter().any(|c| c == protocol)
    }

    pub fn is_input_only(&self, protocol: &str) -> bool {
        self.only_input.iter().any(|c| c == protocol)
    }

    pub fn is_output_only(&self, protocol: &str) -> bool {
        self.only_output.iter().any(|c| c == protocol)
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() { &self.type_name } else { &self.label }
    }

    /// Credit cost of one device of this type. Malformed metadata costs nothing.
    pub fn cost(&self) -> u32 {
        self.defaults.get("cost").map(parse_cost).unwrap_or(0)
    }
}

/// Lenient cost parsing: numbers are truncated, strings are read up to the
/// first non-digit ("120cr" is 120). Anything else, or a negative result, is 0.
pub fn parse_cost(value: &Value) -> u32 {
    let parsed: Option<i64> = match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    };
    match parsed {
        Some(v) if v > 0 => u32::try_from(v).unwrap_or(u32::MAX),
        _ => 0,
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits.bytes().take_while(|b| b.is_ascii_digit()).count();
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Error type for catalog loading failures.
#[derive(Debug)]
pub enum CatalogLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for CatalogLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogLoadError::FileReadError(msg) => write!(f, "Failed to read catalog: {}", msg),
            CatalogLoadError::ParseError(msg) => write!(f, "Failed to parse catalog JSON: {}", msg),
            CatalogLoadError::ValidationError(msg) => write!(f, "Catalog validation error: {}", msg),
        }
    }
}

impl std::error::Error for CatalogLoadError {}

/// All known device types, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: Vec<Arc<DeviceType>>,
}

impl Catalog {
    pub fn new(types: Vec<DeviceType>) -> Result<Self, CatalogLoadError> {
        validate_catalog(&types).map_err(CatalogLoadError::ValidationError)?;
        Ok(Self {
            types: types.into_iter().map(Arc::new).collect(),
        })
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogLoadError> {
        parse_catalog(BUILTIN_CATALOG)
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<DeviceType>> {
        self.types.iter().find(|t| t.type_name == type_name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceType>> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Parse and validate a catalog from JSON text.
pub fn parse_catalog(data: &str) -> Result<Catalog, CatalogLoadError> {
    let types: Vec<DeviceType> = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| CatalogLoadError::ParseError(e.to_string()))?;
    Catalog::new(types)
}

/// Load and validate a catalog file.
pub fn load_catalog(path: &str) -> Result<Catalog, CatalogLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| CatalogLoadError::FileReadError(e.to_string()))?;
    let catalog = parse_catalog(&data)?;
    log::info!("Loaded {} device types from {}", catalog.len(), path);
    Ok(catalog)
}

/// Reject catalogs that would make lookups or direction rules ambiguous.
pub fn validate_catalog(types: &[DeviceType]) -> Result<(), String> {
    let mut names = HashSet::new();
    for t in types {
        if t.type_name.is_empty() {
            return Err("Device type with empty name".to_string());
        }
        if t.type_name == UNKNOWN_TYPE {
            return Err(format!("Device type name '{}' is reserved", UNKNOWN_TYPE));
        }
        if !names.insert(t.type_name.as_str()) {
            return Err(format!("Duplicate device type: {}", t.type_name));
        }
        for p in t.only_input.iter().chain(t.only_output.iter()) {
            if !t.supports(p) {
                return Err(format!(
                    "Device type {} restricts direction of unsupported protocol {}",
                    t.type_name, p
                ));
            }
        }
        if t.only_input.iter().any(|p| t.is_output_only(p)) {
            return Err(format!(
                "Device type {} lists a protocol as both input-only and output-only",
                t.type_name
            ));
        }
    }
    Ok(())
}
