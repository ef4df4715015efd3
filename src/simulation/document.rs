//! Graph document import and export.
//!
//! A document is a JSON array of items. Device items carry `id`, `type`,
//! `x`, `y`, their property values and a `wires` list per output port; a
//! `link` item describes one link by endpoint ids; the `options` item holds
//! free-form global options. Workspace `tab` items are accepted and ignored.
//!
//! Import is atomic with respect to malformed input: the whole document is
//! decoded and checked before the store is touched.

use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Arc;

use super::graph::GraphStore;
use super::types::{LinkId, NewLink, Node, NotificationLevel, Point};
use crate::common::catalog::{Catalog, DeviceType};

pub const BUDGET_EXCEEDED_TEXT: &str = "Cannot add all nodes: credit limit would be exceeded!";

/// Upper bound on the output ports a device may declare.
pub const MAX_OUTPUT_PORTS: u32 = 64;

/// Error type for documents that cannot be imported at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    /// Not JSON.
    Parse(String),
    /// JSON, but not a graph document.
    Invalid(String),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Parse(msg) => write!(f, "Failed to parse document: {}", msg),
            ImportError::Invalid(msg) => write!(f, "Invalid document: {}", msg),
        }
    }
}

impl std::error::Error for ImportError {}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub nodes_added: Vec<String>,
    pub links_added: Vec<LinkId>,
    /// Type names not in the catalog, in first-seen order.
    pub unknown_types: Vec<String>,
    /// Devices left out because the budget ran out.
    pub skipped_over_budget: usize,
    pub notifications: Vec<(NotificationLevel, String)>,
}

#[derive(Debug, Clone)]
struct WireItem {
    task: String,
    target_port: u32,
    protocol: Option<String>,
}

#[derive(Debug, Clone)]
struct NodeItem {
    id: String,
    type_name: String,
    position: Point,
    fields: Map<String, Value>,
    /// Wires per output port.
    wires: Vec<Vec<WireItem>>,
}

#[derive(Debug, Clone)]
struct LinkItem {
    source: String,
    target: String,
    protocol: Option<String>,
}

#[derive(Debug, Default)]
struct Decoded {
    nodes: Vec<NodeItem>,
    links: Vec<LinkItem>,
    options: Option<Map<String, Value>>,
    unknown_types: Vec<String>,
}

// ---------- Export ----------

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Serialise every device, its outgoing links, and the global options.
pub fn export_document(store: &GraphStore) -> Vec<Value> {
    let mut items = Vec::with_capacity(store.node_count() + 1);
    for node in store.nodes() {
        let mut item = Map::new();
        item.insert("id".to_string(), Value::from(node.id.clone()));
        item.insert("type".to_string(), Value::from(node.type_name()));
        let defaults = &node.device_type.defaults;
        for (key, value) in &node.properties {
            let default = defaults.get(key);
            if default != Some(value) || !default.is_none_or(is_blank) {
                item.insert(key.clone(), value.clone());
            }
        }
        item.insert("x".to_string(), json!(node.position.x));
        item.insert("y".to_string(), json!(node.position.y));

        let outgoing: Vec<_> = store.links().filter(|l| l.source == node.id).collect();
        let used_ports = outgoing.iter().map(|l| l.source_port as usize + 1).max().unwrap_or(0);
        let declared = node.device_type.outputs.min(MAX_OUTPUT_PORTS) as usize;
        let mut wires: Vec<Vec<Value>> = vec![Vec::new(); declared.max(used_ports)];
        for link in outgoing {
            wires[link.source_port as usize].push(json!({
                "task": link.target,
                "sourcePort": link.source_port,
                "targetPort": link.target_port,
                "protocol": link.protocol,
            }));
        }
        item.insert("wires".to_string(), json!(wires));
        items.push(Value::Object(item));
    }
    items.push(json!({
        "type": "options",
        "id": "options",
        "global": store.options(),
    }));
    items
}

pub fn export_document_string(store: &GraphStore) -> String {
    // Serialising a Vec<Value> cannot fail.
    serde_json::to_string_pretty(&export_document(store)).unwrap_or_default()
}

// ---------- Import ----------

fn str_field(item: &Map<String, Value>, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

fn port_field(item: &Map<String, Value>, key: &str) -> u32 {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn decode_wire(value: &Value, owner: &str) -> Result<WireItem, ImportError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ImportError::Invalid(format!("Device {} has a wire that is not an object", owner)))?;
    let task = str_field(obj, "task").ok_or_else(|| ImportError::Invalid(format!("Device {} has a wire without a target", owner)))?;
    Ok(WireItem {
        task,
        target_port: port_field(obj, "targetPort"),
        protocol: str_field(obj, "protocol"),
    })
}

fn decode_wires(value: Option<&Value>, owner: &str) -> Result<Vec<Vec<WireItem>>, ImportError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let ports = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(ports) => ports,
        _ => return Err(ImportError::Invalid(format!("Device {} has malformed wires", owner))),
    };
    ports
        .iter()
        .map(|port| match port {
            Value::Array(wires) => wires.iter().map(|w| decode_wire(w, owner)).collect(),
            single => Ok(vec![decode_wire(single, owner)?]),
        })
        .collect()
}

fn coordinate(item: &Map<String, Value>, key: &str) -> Option<f64> {
    item.get(key).and_then(Value::as_f64)
}

fn decode(text: &str, catalog: &Catalog) -> Result<Decoded, ImportError> {
    let value: Value = if text.trim().is_empty() {
        Value::Array(Vec::new())
    } else {
        serde_json::from_str(text).map_err(|e| ImportError::Parse(e.to_string()))?
    };
    let items = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut decoded = Decoded::default();
    for (idx, item) in items.iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or_else(|| ImportError::Invalid(format!("Item {} is not an object", idx)))?;
        let type_name = str_field(obj, "type").ok_or_else(|| ImportError::Invalid(format!("Item {} has no type", idx)))?;
        match type_name.as_str() {
            "tab" => {}
            "options" => match obj.get("global") {
                None | Some(Value::Null) => decoded.options = Some(Map::new()),
                Some(Value::Object(global)) => decoded.options = Some(global.clone()),
                Some(_) => return Err(ImportError::Invalid("Options item has a malformed global section".to_string())),
            },
            "link" => {
                let source = str_field(obj, "source").ok_or_else(|| ImportError::Invalid(format!("Link item {} has no source", idx)))?;
                let target = str_field(obj, "target").ok_or_else(|| ImportError::Invalid(format!("Link item {} has no target", idx)))?;
                decoded.links.push(LinkItem {
                    source,
                    target,
                    protocol: str_field(obj, "protocol"),
                });
            }
            _ => {
                let known = catalog.get(&type_name).is_some();
                if !known && !decoded.unknown_types.contains(&type_name) {
                    decoded.unknown_types.push(type_name.clone());
                }
                let (x, y) = (coordinate(obj, "x"), coordinate(obj, "y"));
                if !known && obj.get("x").is_none_or(Value::is_null) && obj.get("y").is_none_or(Value::is_null) {
                    // Positionless configuration item of an unknown type.
                    continue;
                }
                let id = str_field(obj, "id").ok_or_else(|| ImportError::Invalid(format!("Device item {} has no id", idx)))?;
                let (Some(x), Some(y)) = (x, y) else {
                    return Err(ImportError::Invalid(format!("Device {} has no position", id)));
                };
                let wires = decode_wires(obj.get("wires"), &id)?;
                decoded.nodes.push(NodeItem {
                    id,
                    type_name,
                    position: Point::new(x, y),
                    fields: obj.clone(),
                    wires,
                });
            }
        }
    }
    Ok(decoded)
}

fn check_ids(decoded: &Decoded, store: &GraphStore) -> Result<(), ImportError> {
    let mut seen = HashSet::new();
    for node in &decoded.nodes {
        if !seen.insert(node.id.as_str()) || store.node(&node.id).is_some() {
            return Err(ImportError::Invalid(format!("Duplicate device id {}", node.id)));
        }
    }
    Ok(())
}

fn build_node(item: &NodeItem, catalog: &Catalog) -> Node {
    match catalog.get(&item.type_name) {
        Some(device_type) => {
            let mut node = Node::new(item.id.clone(), device_type.clone(), item.position);
            for key in device_type.defaults.keys() {
                if let Some(value) = item.fields.get(key) {
                    node.properties.insert(key.clone(), value.clone());
                }
            }
            node
        }
        None => {
            let wired = u32::try_from(item.wires.len()).unwrap_or(MAX_OUTPUT_PORTS);
            let outputs = item
                .fields
                .get("outputs")
                .and_then(Value::as_u64)
                .and_then(|o| u32::try_from(o).ok())
                .unwrap_or(wired)
                .clamp(wired.min(MAX_OUTPUT_PORTS), MAX_OUTPUT_PORTS);
            let mut node = Node::new(item.id.clone(), Arc::new(DeviceType::placeholder(&item.type_name, outputs)), item.position);
            node.properties.insert("name".to_string(), Value::from(item.type_name.clone()));
            node
        }
    }
}

/// Import a document into the store.
///
/// Unknown device types become invalid placeholder devices. Devices that do
/// not fit the remaining budget are skipped. Links whose endpoints are
/// missing are dropped. Nothing is changed when the document is rejected.
pub fn import_document(store: &mut GraphStore, catalog: &Catalog, text: &str) -> Result<ImportReport, ImportError> {
    let decoded = decode(text, catalog)?;
    check_ids(&decoded, store)?;

    let mut report = ImportReport {
        unknown_types: decoded.unknown_types.clone(),
        ..Default::default()
    };
    if !decoded.unknown_types.is_empty() {
        let label = if decoded.unknown_types.len() > 1 { "types" } else { "type" };
        let message = format!("Imported unrecognised {}: {}", label, decoded.unknown_types.join(", "));
        log::warn!("{}", message);
        report.notifications.push((NotificationLevel::Error, message));
    }

    let mut imported: HashSet<String> = HashSet::new();
    for item in &decoded.nodes {
        let node = build_node(item, catalog);
        if !store.can_add_node(&node.device_type) {
            report.skipped_over_budget += 1;
            continue;
        }
        if let Err(e) = store.add_node(node) {
            log::warn!("Skipping device {}: {}", item.id, e);
            continue;
        }
        imported.insert(item.id.clone());
        report.nodes_added.push(item.id.clone());
    }
    if report.skipped_over_budget > 0 {
        log::warn!("{} devices skipped over budget", report.skipped_over_budget);
        report.notifications.push((NotificationLevel::Error, BUDGET_EXCEEDED_TEXT.to_string()));
    }

    for link in &decoded.links {
        let new_link = NewLink {
            source: link.source.clone(),
            target: link.target.clone(),
            protocol: link.protocol.clone(),
            ..Default::default()
        };
        match store.add_link(new_link) {
            Ok(id) => report.links_added.push(id),
            Err(e) => log::warn!("Dropping imported link {} -> {}: {}", link.source, link.target, e),
        }
    }

    for item in decoded.nodes.iter().filter(|n| imported.contains(&n.id)) {
        for (port, wires) in item.wires.iter().enumerate() {
            for wire in wires.iter().filter(|w| imported.contains(&w.task)) {
                let new_link = NewLink {
                    source: item.id.clone(),
                    target: wire.task.clone(),
                    source_port: port as u32,
                    target_port: wire.target_port,
                    protocol: wire.protocol.clone(),
                };
                match store.add_link(new_link) {
                    Ok(id) => report.links_added.push(id),
                    Err(e) => log::warn!("Dropping wire {} -> {}: {}", item.id, wire.task, e),
                }
            }
        }
    }

    if let Some(options) = &decoded.options {
        store.merge_options(options);
    }

    log::info!(
        "Imported {} devices and {} links",
        report.nodes_added.len(),
        report.links_added.len()
    );
    Ok(report)
}
