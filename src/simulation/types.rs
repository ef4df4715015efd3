//! Type definitions for the game engine.
//!
//! Contains the data structures shared across the engine:
//! - Plan positions, device nodes and links
//! - Commands accepted by the game task and events it publishes
//! - Communication channels between the game task and the front end

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::achievements::AchievementStatus;
use super::coverage::CoverageReport;
use super::graph::{LinkProperties, ProtocolChoice};
use crate::common::catalog::DeviceType;

/// Depth of the command channel (front end → game task).
pub const GAME_COMMAND_QUEUE_SIZE: usize = 16;
/// Bounded channel carrying commands into the game task.
pub type GameCommandQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, GameCommand, GAME_COMMAND_QUEUE_SIZE>;
/// Receiver side of the command channel.
pub type GameCommandQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, GameCommand, GAME_COMMAND_QUEUE_SIZE>;
/// Sender side of the command channel.
pub type GameCommandQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, GameCommand, GAME_COMMAND_QUEUE_SIZE>;

/// Depth of the event channel (game task → front end). Ticks only publish
/// changes, so bursts stay well below this.
pub const GAME_EVENT_QUEUE_SIZE: usize = 100;
/// Bounded channel carrying events out of the game task.
pub type GameEventQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, GameEvent, GAME_EVENT_QUEUE_SIZE>;
/// Receiver side of the event channel.
pub type GameEventQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, GameEvent, GAME_EVENT_QUEUE_SIZE>;
/// Sender side of the event channel.
pub type GameEventQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, GameEvent, GAME_EVENT_QUEUE_SIZE>;

/// Position on the floor plan, in plan units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A placed device.
///
/// `is_reachable`, `rooms` and `room_segments` are derived state, rebuilt by
/// every reachability pass; they are stale between a move and the next pass.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub device_type: Arc<DeviceType>,
    pub position: Point,
    /// Property values keyed by the type's default property names.
    pub properties: Map<String, Value>,
    pub is_reachable: bool,
    /// Room names, de-duplicated, in layout order.
    pub rooms: Vec<String>,
    /// Every room segment the node falls into.
    pub room_segments: Vec<String>,
    /// Pending redraw.
    pub dirty: bool,
    pub valid: bool,
}

impl Node {
    /// New node with the type's default property values.
    pub fn new(id: impl Into<String>, device_type: Arc<DeviceType>, position: Point) -> Self {
        let properties = device_type.defaults.clone();
        let valid = !device_type.placeholder;
        Self {
            id: id.into(),
            device_type,
            position,
            properties,
            is_reachable: false,
            rooms: Vec::new(),
            room_segments: Vec::new(),
            dirty: true,
            valid,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.device_type.type_name
    }

    /// Display name: the `name` property if set, otherwise the type label.
    pub fn name(&self) -> &str {
        match self.properties.get("name") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => self.device_type.display_label(),
        }
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.iter().any(|r| r == room)
    }
}

/// Link identity. Allocated monotonically by the graph store and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u64);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A directed link between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub source: String,
    pub target: String,
    pub source_port: u32,
    pub target_port: u32,
    pub protocol: String,
    /// Both ends support the protocol, the direction is allowed, and the
    /// endpoints are within range. Refreshed on demand.
    pub valid: bool,
    pub dirty: bool,
}

/// Request to create a link. `protocol` falls back to the configured default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewLink {
    pub source: String,
    pub target: String,
    pub source_port: u32,
    pub target_port: u32,
    pub protocol: Option<String>,
}

impl NewLink {
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

/// Severity attached to user-facing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "INFO"),
            NotificationLevel::Warning => write!(f, "WARN"),
            NotificationLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Commands accepted by the game task.
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    /// Buy and place a device. A random id is generated when `id` is None.
    AddNode { type_name: String, position: Point, id: Option<String> },
    RemoveNode(String),
    MoveNode { id: String, position: Point },
    /// Link two devices after the feasibility check.
    Connect { source: String, target: String, protocol: Option<String> },
    Disconnect(LinkId),
    SetLinkProtocol { link: LinkId, protocol: String },
    ListProtocols(LinkId),
    ShowNode(String),
    ShowLink(LinkId),
    /// A blocking dialog opened or closed in the front end.
    SetDialogOpen(bool),
    Suggest,
    ListAchievements,
    ShowAchievement(String),
    ResetAchievements,
    /// Remove every device.
    Clear,
    Export,
    Import(String),
    Save { force: bool },
    Status,
    Quit,
}

/// Node snapshot for the front end.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDetails {
    pub id: String,
    pub type_name: String,
    pub position: Point,
    pub reachable: bool,
    /// Property values plus `rooms`.
    pub properties: Map<String, Value>,
}

/// Events published by the game task.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Notification { level: NotificationLevel, message: String },
    NodeAdded { id: String, type_name: String },
    NodeRemoved { id: String, links_removed: usize },
    NodeMoved { id: String, position: Point },
    LinkAdded { id: LinkId, source: String, target: String, protocol: String },
    LinkRemoved { id: LinkId },
    LinkUpdated { id: LinkId, protocol: String, valid: bool },
    Credits { spent: u32, remaining: i64, low: bool },
    /// Number of reachable nodes changed.
    ReachabilityChanged { reachable: usize, total: usize },
    CoverageUpdated(CoverageReport),
    AchievementUnlocked { name: String, explanation: String },
    Achievements(Vec<AchievementStatus>),
    Suggestion(String),
    ProtocolChoices { link: LinkId, choices: Vec<ProtocolChoice> },
    NodeDetails(NodeDetails),
    LinkDetails { link: LinkId, properties: LinkProperties },
    Exported(String),
    Saved { path: String },
    Status { nodes: usize, links: usize, reachable: usize, spent: u32, remaining: i64 },
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::Catalog;

    #[test]
    fn new_node_takes_type_defaults() {
        let catalog = Catalog::builtin().unwrap();
        let node = Node::new("n1", catalog.get("Camera").unwrap(), Point::new(1.0, 2.0));
        assert_eq!(node.properties.get("cost"), Some(&Value::from(80)));
        assert!(node.valid);
        assert!(node.dirty);
        assert!(!node.is_reachable);
        assert_eq!(node.name(), "Camera");
    }

    #[test]
    fn placeholder_node_is_invalid() {
        let node = Node::new("n2", Arc::new(DeviceType::placeholder("Toaster", 1)), Point::default());
        assert!(!node.valid);
        assert_eq!(node.type_name(), "unknown");
    }

    #[test]
    fn new_link_builder() {
        let link = NewLink::between("a", "b").with_protocol("BLE");
        assert_eq!(link.protocol.as_deref(), Some("BLE"));
        assert_eq!(link.source_port, 0);
        assert_eq!(LinkId(7).to_string(), "L7");
    }
}
