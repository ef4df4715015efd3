//! Graph store: placed devices, the links between them, and the rules for
//! creating links.
//!
//! Links are kept in creation order and indexed by endpoint, so removing a
//! node cascades to its links without scanning the whole link table.

use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use super::geometry::distance;
use super::types::{Link, LinkId, NewLink, Node, Point};
use crate::common::catalog::{DeviceType, Modality, UNKNOWN_TYPE};
use crate::common::protocol::{ProtocolMode, ProtocolRegistry};
use crate::control::config::GameConfig;

/// Remaining credit figure at or below which the player is warned.
pub const LOW_CREDITS_THRESHOLD: i64 = 300;

/// Why two devices cannot be linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No shared protocol and one side is a wearable.
    WearableAutoConnect,
    NoCommonProtocol,
    WrongDirection,
    TooFar,
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::WearableAutoConnect => write!(
                f,
                "Links to Wristband Sensors do not have to be configured: these devices are mobile and will automatically connect to nearby gateways"
            ),
            LinkError::NoCommonProtocol => write!(f, "These devices cannot be linked directly: they do not share any common communication protocols"),
            LinkError::WrongDirection => write!(f, "These devices cannot be linked in this direction"),
            LinkError::TooFar => write!(f, "These devices cannot be linked: they are too far away"),
        }
    }
}

impl std::error::Error for LinkError {}

/// Outcome of a feasibility check between two devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkCheck {
    pub ok: bool,
    /// A shared protocol exists and works in this direction.
    pub protocols_ok: bool,
    pub error: Option<LinkError>,
}

/// Error type for graph mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    DuplicateNode(String),
    UnknownNode(String),
    UnknownLink(LinkId),
    SelfLink(String),
    DuplicateLink { source: String, target: String },
    CannotLink(LinkError),
    /// The protocol is unknown or not usable between these endpoints.
    ProtocolUnavailable(String),
    InsufficientCredits { type_name: String, cost: u32, remaining: i64 },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::DuplicateNode(id) => write!(f, "A device with id {} already exists", id),
            GraphError::UnknownNode(id) => write!(f, "No device with id {}", id),
            GraphError::UnknownLink(id) => write!(f, "No link with id {}", id),
            GraphError::SelfLink(id) => write!(f, "Device {} cannot be linked to itself", id),
            GraphError::DuplicateLink { source, target } => write!(f, "{} is already linked to {}", source, target),
            GraphError::CannotLink(err) => write!(f, "{}", err),
            GraphError::ProtocolUnavailable(p) => write!(f, "The {} protocol cannot be used for this link", p),
            GraphError::InsufficientCredits { type_name, cost, remaining } => write!(
                f,
                "Cannot add {}: it costs {} cr but only {} cr remain",
                type_name, cost, remaining
            ),
        }
    }
}

impl std::error::Error for GraphError {}

/// A protocol offered for an existing link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolChoice {
    pub nm: String,
    pub name: String,
    pub in_range: bool,
}

/// Summary of a link for the property view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkProperties {
    pub protocol: String,
    /// Length in whole metres.
    pub length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ProtocolMode>,
}

/// A link dropped by [`GraphStore::check_link_ranges`] and the notice for it.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenLink {
    pub link: Link,
    pub message: String,
}

/// Result of the pre-save consistency check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveCheck {
    pub invalid_nodes: usize,
    pub invalid_links: usize,
    /// Original type names of placeholder nodes, de-duplicated.
    pub unknown_types: Vec<String>,
}

impl SaveCheck {
    pub fn is_clean(&self) -> bool {
        self.invalid_nodes == 0 && self.invalid_links == 0 && self.unknown_types.is_empty()
    }
}

/// The mutable device graph.
#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: Vec<Node>,
    links: BTreeMap<LinkId, Link>,
    /// Link ids touching each node, as source or target.
    incident: HashMap<String, BTreeSet<LinkId>>,
    next_link_id: u64,
    protocols: ProtocolRegistry,
    node_width: f64,
    distance_meters_to_pixels: f64,
    starting_credits: u32,
    spent_credits: u32,
    default_protocol: String,
    /// Free-form global options carried through import and export.
    options: Map<String, Value>,
}

impl GraphStore {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            nodes: Vec::new(),
            links: BTreeMap::new(),
            incident: HashMap::new(),
            next_link_id: 1,
            protocols: ProtocolRegistry::builtin(config.distance_meters_to_pixels),
            node_width: config.node_width,
            distance_meters_to_pixels: config.distance_meters_to_pixels,
            starting_credits: config.starting_credits,
            spent_credits: 0,
            default_protocol: config.default_protocol.clone(),
            options: Map::new(),
        }
    }

    // ---------- Accessors ----------

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Merge imported global options over the current ones.
    pub fn merge_options(&mut self, options: &Map<String, Value>) {
        for (k, v) in options {
            self.options.insert(k.clone(), v.clone());
        }
    }

    pub fn node_width(&self) -> f64 {
        self.node_width
    }

    // ---------- Credits ----------

    pub fn starting_credits(&self) -> u32 {
        self.starting_credits
    }

    pub fn spent_credits(&self) -> u32 {
        self.spent_credits
    }

    pub fn remaining_credits(&self) -> i64 {
        self.starting_credits as i64 - self.spent_credits as i64
    }

    pub fn low_credits(&self) -> bool {
        self.remaining_credits() <= LOW_CREDITS_THRESHOLD
    }

    /// Whether one more device of this type fits the budget.
    pub fn can_add_node(&self, device_type: &DeviceType) -> bool {
        self.spent_credits as u64 + device_type.cost() as u64 <= self.starting_credits as u64
    }

    fn recompute_credits(&mut self) {
        let total: u64 = self.nodes.iter().map(|n| n.device_type.cost() as u64).sum();
        self.spent_credits = u32::try_from(total).unwrap_or(u32::MAX);
    }

    // ---------- Nodes ----------

    /// Append a node. The budget is not checked here; callers buying devices
    /// go through [`GraphStore::can_add_node`] first.
    pub fn add_node(&mut self, mut node: Node) -> Result<(), GraphError> {
        if self.node(&node.id).is_some() {
            return Err(GraphError::DuplicateNode(node.id));
        }
        node.dirty = true;
        log::debug!("Adding node {} ({})", node.id, node.type_name());
        self.nodes.push(node);
        self.recompute_credits();
        Ok(())
    }

    /// Remove a node and every link touching it. Returns the removed links,
    /// or nothing when the id is unknown.
    pub fn remove_node(&mut self, id: &str) -> Vec<Link> {
        let Some(index) = self.nodes.iter().position(|n| n.id == id) else {
            return Vec::new();
        };
        let link_ids: Vec<LinkId> = self.incident.get(id).map(|s| s.iter().copied().collect()).unwrap_or_default();
        let removed: Vec<Link> = link_ids.into_iter().filter_map(|l| self.remove_link(l)).collect();
        self.incident.remove(id);
        self.nodes.remove(index);
        self.recompute_credits();
        log::debug!("Removed node {} and {} links", id, removed.len());
        removed
    }

    /// Move a node. Room membership and link validity catch up on the next
    /// refresh; out-of-range links are pruned by [`GraphStore::check_link_ranges`].
    pub fn move_node(&mut self, id: &str, position: Point) -> Result<(), GraphError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        node.position = position;
        node.dirty = true;
        Ok(())
    }

    /// Remove every node and link.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.incident.clear();
        self.options.clear();
        self.recompute_credits();
    }

    /// A random id not used by any current node.
    pub fn generate_node_id<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        loop {
            let id = format!("{:08x}.{:06x}", rng.r#gen::<u32>(), rng.gen_range(0..0x100_0000u32));
            if self.node(&id).is_none() {
                return id;
            }
        }
    }

    // ---------- Links ----------

    /// Insert a link as given, with the default protocol when none is set.
    /// Only endpoint existence is enforced; validity is recorded on the link.
    pub fn add_link(&mut self, new_link: NewLink) -> Result<LinkId, GraphError> {
        for endpoint in [&new_link.source, &new_link.target] {
            if self.node(endpoint).is_none() {
                return Err(GraphError::UnknownNode(endpoint.clone()));
            }
        }
        let protocol = new_link.protocol.unwrap_or_else(|| self.default_protocol.clone());
        let id = LinkId(self.next_link_id);
        self.next_link_id += 1;
        let mut link = Link {
            id,
            source: new_link.source,
            target: new_link.target,
            source_port: new_link.source_port,
            target_port: new_link.target_port,
            protocol,
            valid: true,
            dirty: true,
        };
        link.valid = self.link_is_valid(&link);
        self.incident.entry(link.source.clone()).or_default().insert(id);
        self.incident.entry(link.target.clone()).or_default().insert(id);
        self.links.insert(id, link);
        Ok(id)
    }

    pub fn remove_link(&mut self, id: LinkId) -> Option<Link> {
        let link = self.links.remove(&id)?;
        for endpoint in [&link.source, &link.target] {
            if let Some(set) = self.incident.get_mut(endpoint) {
                set.remove(&id);
            }
        }
        Some(link)
    }

    /// Link two devices the way the player does: reject duplicates and
    /// infeasible pairs, then pick a protocol if none was requested.
    pub fn connect(&mut self, mut new_link: NewLink) -> Result<LinkId, GraphError> {
        if new_link.source == new_link.target {
            return Err(GraphError::SelfLink(new_link.source));
        }
        let source = self.node(&new_link.source).ok_or_else(|| GraphError::UnknownNode(new_link.source.clone()))?;
        let target = self.node(&new_link.target).ok_or_else(|| GraphError::UnknownNode(new_link.target.clone()))?;

        let duplicate = self
            .links_of(&new_link.source)
            .any(|l| l.source == new_link.source && l.target == new_link.target && l.source_port == new_link.source_port);
        if duplicate {
            return Err(GraphError::DuplicateLink {
                source: source.name().to_string(),
                target: target.name().to_string(),
            });
        }

        let check = self.can_be_linked(source, target);
        if !check.ok {
            return Err(GraphError::CannotLink(check.error.unwrap_or(LinkError::NoCommonProtocol)));
        }

        let protocol = match new_link.protocol.take() {
            Some(p) => {
                if !self.protocols.contains(&p) || !self.can_be_linked_with(source, target, &p, true) {
                    return Err(GraphError::ProtocolUnavailable(p));
                }
                p
            }
            None => self.pick_protocol(source, target)?,
        };
        new_link.protocol = Some(protocol);
        self.add_link(new_link)
    }

    /// Default protocol if usable, otherwise the first usable protocol of the source.
    fn pick_protocol(&self, source: &Node, target: &Node) -> Result<String, GraphError> {
        if self.can_be_linked_with(source, target, &self.default_protocol, true) {
            return Ok(self.default_protocol.clone());
        }
        source
            .device_type
            .capabilities
            .iter()
            .find(|p| self.can_be_linked_with(source, target, p, true))
            .cloned()
            .ok_or(GraphError::CannotLink(LinkError::TooFar))
    }

    /// Change a link's protocol. Any protocol both ends support in this
    /// direction is accepted, even out of range; the returned flag is the
    /// link's new validity.
    pub fn set_link_protocol(&mut self, id: LinkId, protocol: &str) -> Result<bool, GraphError> {
        let link = self.links.get(&id).ok_or(GraphError::UnknownLink(id))?;
        let (source, target) = self.endpoints(link).ok_or(GraphError::UnknownLink(id))?;
        if !self.protocols.contains(protocol) || !self.can_be_linked_with(source, target, protocol, false) {
            return Err(GraphError::ProtocolUnavailable(protocol.to_string()));
        }
        let mut updated = link.clone();
        updated.protocol = protocol.to_string();
        updated.valid = self.link_is_valid(&updated);
        updated.dirty = true;
        let valid = updated.valid;
        self.links.insert(id, updated);
        Ok(valid)
    }

    /// Protocols selectable for a link, in registry order.
    pub fn protocol_choices(&self, id: LinkId) -> Result<Vec<ProtocolChoice>, GraphError> {
        let link = self.links.get(&id).ok_or(GraphError::UnknownLink(id))?;
        let (source, target) = self.endpoints(link).ok_or(GraphError::UnknownLink(id))?;
        Ok(self
            .protocols
            .iter()
            .filter(|p| self.can_be_linked_with(source, target, p.nm, false))
            .map(|p| ProtocolChoice {
                nm: p.nm.to_string(),
                name: p.name.to_string(),
                in_range: self.can_be_linked_with(source, target, p.nm, true),
            })
            .collect())
    }

    /// Drop every link longer than its protocol's range. Links with an
    /// unknown protocol are left alone.
    pub fn check_link_ranges(&mut self) -> Vec<BrokenLink> {
        let mut to_remove = Vec::new();
        for link in self.links.values() {
            let Some(p) = self.protocols.get(&link.protocol) else {
                continue;
            };
            let Some((source, target)) = self.endpoints(link) else {
                continue;
            };
            if distance(&source.position, &target.position, self.node_width) > p.range {
                let message = format!(
                    "Breaking link from {} to {}: out of range for the {} protocol",
                    source.name(),
                    target.name(),
                    p.nm
                );
                to_remove.push((link.id, message));
            }
        }
        to_remove
            .into_iter()
            .filter_map(|(id, message)| {
                log::info!("{}", message);
                self.remove_link(id).map(|link| BrokenLink { link, message })
            })
            .collect()
    }

    /// Recompute the `valid` flag of every link.
    pub fn refresh_validation(&mut self) {
        let flags: Vec<(LinkId, bool)> = self.links.values().map(|l| (l.id, self.link_is_valid(l))).collect();
        for (id, valid) in flags {
            if let Some(link) = self.links.get_mut(&id) {
                if link.valid != valid {
                    link.dirty = true;
                }
                link.valid = valid;
            }
        }
    }

    fn link_is_valid(&self, link: &Link) -> bool {
        if !self.protocols.contains(&link.protocol) {
            return false;
        }
        match self.endpoints(link) {
            Some((source, target)) => self.can_be_linked_with(source, target, &link.protocol, true),
            None => false,
        }
    }

    fn endpoints(&self, link: &Link) -> Option<(&Node, &Node)> {
        Some((self.node(&link.source)?, self.node(&link.target)?))
    }

    fn links_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Link> + 'a {
        self.incident
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|l| self.links.get(l))
    }

    // ---------- Feasibility ----------

    /// Whether `source` can be linked to `target` with any protocol.
    ///
    /// A shared protocol only counts for direction when it is neither
    /// input-only on the source nor output-only on the target.
    pub fn can_be_linked(&self, source: &Node, target: &Node) -> LinkCheck {
        let s = &source.device_type;
        let t = &target.device_type;
        let d = distance(&source.position, &target.position, self.node_width);

        let mut any_protocol = false;
        let mut right_direction = false;
        let mut distance_ok = false;
        for key in s.capabilities.iter().filter(|k| t.supports(k)) {
            any_protocol = true;
            if s.is_input_only(key) || t.is_output_only(key) {
                continue;
            }
            right_direction = true;
            if self.protocols.get(key).is_some_and(|p| p.range >= d) {
                distance_ok = true;
            }
        }

        let protocols_ok = any_protocol && right_direction;
        let ok = protocols_ok && distance_ok;
        let error = if ok {
            None
        } else if !any_protocol {
            if s.modality == Modality::Wearable || t.modality == Modality::Wearable {
                Some(LinkError::WearableAutoConnect)
            } else {
                Some(LinkError::NoCommonProtocol)
            }
        } else if !right_direction {
            Some(LinkError::WrongDirection)
        } else {
            Some(LinkError::TooFar)
        };
        LinkCheck { ok, protocols_ok, error }
    }

    /// Whether `source` can be linked to `target` with one given protocol.
    pub fn can_be_linked_with(&self, source: &Node, target: &Node, protocol: &str, check_distance: bool) -> bool {
        let s = &source.device_type;
        let t = &target.device_type;
        if !s.supports(protocol) || !t.supports(protocol) {
            return false;
        }
        if s.is_input_only(protocol) || t.is_output_only(protocol) {
            return false;
        }
        if check_distance {
            let d = distance(&source.position, &target.position, self.node_width);
            return self.protocols.get(protocol).is_some_and(|p| p.range >= d);
        }
        true
    }

    // ---------- Traversal ----------

    /// Ids of nodes sharing a link with `id`, in either direction.
    pub fn neighbors(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for link in self.links_of(id) {
            let other = if link.source == id { &link.target } else { &link.source };
            if other != id && !out.contains(other) {
                out.push(other.clone());
            }
        }
        out
    }

    /// Every node connected to `id` through links of any validity, `id` first.
    pub fn connected_subgraph(&self, id: &str) -> Vec<String> {
        if self.node(id).is_none() {
            return Vec::new();
        }
        let mut visited: Vec<String> = vec![id.to_string()];
        let mut queue: VecDeque<String> = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(&current) {
                if !visited.contains(&next) {
                    visited.push(next.clone());
                    queue.push_back(next);
                }
            }
        }
        visited
    }

    // ---------- Properties ----------

    pub fn link_properties(&self, id: LinkId) -> Option<LinkProperties> {
        let link = self.links.get(&id)?;
        let (source, target) = self.endpoints(link)?;
        let d = distance(&source.position, &target.position, self.node_width);
        Some(LinkProperties {
            protocol: link.protocol.clone(),
            length: (d / self.distance_meters_to_pixels).round() as i64,
            mode: self.protocols.get(&link.protocol).map(|p| p.mode),
        })
    }

    /// Property values plus the node's current rooms.
    pub fn node_properties(&self, id: &str) -> Option<Map<String, Value>> {
        let node = self.node(id)?;
        let mut props = node.properties.clone();
        props.insert("rooms".to_string(), Value::from(node.rooms.clone()));
        Some(props)
    }

    /// Consistency check run before saving.
    pub fn save_check(&self) -> SaveCheck {
        let mut check = SaveCheck::default();
        for node in &self.nodes {
            if !node.valid {
                check.invalid_nodes += 1;
            }
            if node.type_name() == UNKNOWN_TYPE {
                let name = node.properties.get("name").and_then(Value::as_str).unwrap_or(UNKNOWN_TYPE).to_string();
                if !check.unknown_types.contains(&name) {
                    check.unknown_types.push(name);
                }
            }
        }
        check.invalid_links = self.links.values().filter(|l| !self.link_is_valid(l)).count();
        check
    }

    // ---------- Modality queries ----------

    pub fn nodes_of(&self, modality: Modality) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.device_type.modality == modality)
    }

    pub fn reachable_of(&self, modality: Modality) -> impl Iterator<Item = &Node> {
        self.nodes_of(modality).filter(|n| n.is_reachable)
    }

    pub fn has_modality(&self, modality: Modality) -> bool {
        self.nodes_of(modality).next().is_some()
    }

    pub fn has_reachable(&self, modality: Modality) -> bool {
        self.reachable_of(modality).next().is_some()
    }

    pub fn count_links_with_protocol(&self, protocol: &str) -> usize {
        self.links.values().filter(|l| l.protocol == protocol).count()
    }

    /// A gateway with an incoming link from another gateway.
    pub fn has_gateway_mesh(&self) -> bool {
        self.links.values().any(|l| {
            l.source != l.target
                && self.node(&l.source).is_some_and(|n| n.device_type.modality == Modality::Gateway)
                && self.node(&l.target).is_some_and(|n| n.device_type.modality == Modality::Gateway)
        })
    }

    /// Outgoing links of a node.
    pub fn outgoing_count(&self, id: &str) -> usize {
        self.links_of(id).filter(|l| l.source == id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::Catalog;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn store() -> (GraphStore, Catalog) {
        (GraphStore::new(&GameConfig::default()), Catalog::builtin().unwrap())
    }

    fn place(store: &mut GraphStore, catalog: &Catalog, id: &str, type_name: &str, x: f64, y: f64) {
        let node = Node::new(id, catalog.get(type_name).unwrap(), Point::new(x, y));
        store.add_node(node).unwrap();
    }

    #[test]
    fn no_shared_protocol() {
        let (mut g, c) = store();
        place(&mut g, &c, "cam", "Camera", 0.0, 0.0);
        place(&mut g, &c, "env", "EnvironmentalSensor", 0.0, 0.0);
        let check = g.can_be_linked(g.node("cam").unwrap(), g.node("env").unwrap());
        assert!(!check.ok);
        assert!(!check.protocols_ok);
        assert_eq!(check.error, Some(LinkError::NoCommonProtocol));
        assert_eq!(
            check.error.unwrap().to_string(),
            "These devices cannot be linked directly: they do not share any common communication protocols"
        );
    }

    #[test]
    fn wearable_gets_auto_connect_message() {
        let (mut g, c) = store();
        place(&mut g, &c, "hg", "HomeGateway", 0.0, 0.0);
        place(&mut g, &c, "wb", "WristbandSensor", 0.0, 0.0);
        let check = g.can_be_linked(g.node("wb").unwrap(), g.node("hg").unwrap());
        assert_eq!(check.error, Some(LinkError::WearableAutoConnect));
    }

    #[test]
    fn direction_matters() {
        let (mut g, c) = store();
        place(&mut g, &c, "cam", "Camera", 0.0, 0.0);
        place(&mut g, &c, "vg", "VideoGateway", 174.0, 0.0);
        let forward = g.can_be_linked(g.node("cam").unwrap(), g.node("vg").unwrap());
        assert!(forward.ok);
        let backward = g.can_be_linked(g.node("vg").unwrap(), g.node("cam").unwrap());
        assert!(!backward.ok);
        assert!(!backward.protocols_ok);
        assert_eq!(backward.error, Some(LinkError::WrongDirection));
        // Deterministic for identical input.
        assert_eq!(backward, g.can_be_linked(g.node("vg").unwrap(), g.node("cam").unwrap()));
    }

    #[test]
    fn too_far() {
        let (mut g, c) = store();
        place(&mut g, &c, "env", "EnvironmentalSensor", 0.0, 0.0);
        place(&mut g, &c, "hg", "HomeGateway", 2000.0, 0.0);
        let check = g.can_be_linked(g.node("env").unwrap(), g.node("hg").unwrap());
        assert!(check.protocols_ok);
        assert!(!check.ok);
        assert_eq!(check.error, Some(LinkError::TooFar));
        assert!(g.can_be_linked_with(g.node("env").unwrap(), g.node("hg").unwrap(), "TSCH", false));
        assert!(!g.can_be_linked_with(g.node("env").unwrap(), g.node("hg").unwrap(), "TSCH", true));
    }

    #[test]
    fn remove_node_cascades() {
        let (mut g, c) = store();
        place(&mut g, &c, "hg", "HomeGateway", 0.0, 0.0);
        place(&mut g, &c, "fg", "ForwardingGateway", 100.0, 0.0);
        place(&mut g, &c, "env", "EnvironmentalSensor", 200.0, 0.0);
        g.add_link(NewLink::between("env", "fg")).unwrap();
        g.add_link(NewLink::between("fg", "hg")).unwrap();
        let kept = g.add_link(NewLink::between("env", "hg")).unwrap();
        let removed = g.remove_node("fg");
        assert_eq!(removed.len(), 2);
        assert_eq!(g.link_count(), 1);
        assert!(g.link(kept).is_some());
        assert!(g.remove_node("fg").is_empty());
        assert!(g.neighbors("hg") == vec!["env".to_string()]);
    }

    #[test]
    fn add_link_defaults_protocol_and_checks_endpoints() {
        let (mut g, c) = store();
        place(&mut g, &c, "env", "EnvironmentalSensor", 0.0, 0.0);
        place(&mut g, &c, "hg", "HomeGateway", 200.0, 0.0);
        let id = g.add_link(NewLink::between("env", "hg")).unwrap();
        let link = g.link(id).unwrap();
        assert_eq!(link.protocol, "TSCH");
        assert!(link.valid);
        assert_eq!(g.add_link(NewLink::between("env", "ghost")), Err(GraphError::UnknownNode("ghost".to_string())));
        assert!(g.remove_link(id).is_some());
        assert!(g.remove_link(id).is_none());
    }

    #[test]
    fn connect_rejects_duplicates_and_infeasible_pairs() {
        let (mut g, c) = store();
        place(&mut g, &c, "cam", "Camera", 0.0, 0.0);
        place(&mut g, &c, "vg", "VideoGateway", 174.0, 0.0);
        let id = g.connect(NewLink::between("cam", "vg")).unwrap();
        assert_eq!(g.link(id).unwrap().protocol, "USB");
        assert!(matches!(g.connect(NewLink::between("cam", "vg")), Err(GraphError::DuplicateLink { .. })));
        assert_eq!(
            g.connect(NewLink::between("vg", "cam")),
            Err(GraphError::CannotLink(LinkError::WrongDirection))
        );
        assert_eq!(g.link_count(), 1);
    }

    #[test]
    fn protocol_choices_and_switching() {
        let (mut g, c) = store();
        place(&mut g, &c, "env", "EnvironmentalSensor", 0.0, 0.0);
        place(&mut g, &c, "hg", "HomeGateway", 500.0, 0.0);
        // 326 units apart: inside TSCH (500) and BLE (350)
        let id = g.connect(NewLink::between("env", "hg")).unwrap();
        let choices = g.protocol_choices(id).unwrap();
        let names: Vec<&str> = choices.iter().map(|c| c.nm.as_str()).collect();
        assert_eq!(names, vec!["TSCH", "BLE"]);
        assert!(choices.iter().all(|c| c.in_range));
        assert_eq!(g.set_link_protocol(id, "BLE"), Ok(true));
        assert_eq!(g.set_link_protocol(id, "USB"), Err(GraphError::ProtocolUnavailable("USB".to_string())));
        g.move_node("hg", Point::new(600.0, 0.0)).unwrap();
        g.refresh_validation();
        assert!(!g.link(id).unwrap().valid);
    }

    #[test]
    fn moving_out_of_range_breaks_link() {
        let (mut g, c) = store();
        place(&mut g, &c, "env", "EnvironmentalSensor", 0.0, 0.0);
        place(&mut g, &c, "hg", "HomeGateway", 200.0, 0.0);
        g.connect(NewLink::between("env", "hg")).unwrap();
        g.move_node("hg", Point::new(3000.0, 0.0)).unwrap();
        let broken = g.check_link_ranges();
        assert_eq!(broken.len(), 1);
        assert_eq!(
            broken[0].message,
            "Breaking link from Environmental Sensor to Home Gateway: out of range for the TSCH protocol"
        );
        assert_eq!(g.link_count(), 0);
    }

    #[test]
    fn budget_is_honoured_across_adds_and_removes() {
        let config = GameConfig {
            starting_credits: 100,
            ..GameConfig::default()
        };
        let mut g = GraphStore::new(&config);
        let c = Catalog::builtin().unwrap();
        let camera = c.get("Camera").unwrap();
        assert!(g.can_add_node(&camera));
        place(&mut g, &c, "cam1", "Camera", 0.0, 0.0);
        assert_eq!(g.spent_credits(), 80);
        assert!(!g.can_add_node(&camera));
        assert!(!g.can_add_node(&c.get("Router").unwrap()));
        assert!(g.can_add_node(&c.get("HomeGateway").unwrap()));
        g.remove_node("cam1");
        assert_eq!(g.spent_credits(), 0);
        assert!(g.can_add_node(&camera));
        assert!(g.low_credits());
    }

    #[test]
    fn duplicate_node_id_rejected() {
        let (mut g, c) = store();
        place(&mut g, &c, "a", "Router", 0.0, 0.0);
        let again = Node::new("a", c.get("Router").unwrap(), Point::default());
        assert_eq!(g.add_node(again), Err(GraphError::DuplicateNode("a".to_string())));
        assert_eq!(g.spent_credits(), 30);
    }

    #[test]
    fn link_properties_in_metres() {
        let (mut g, c) = store();
        place(&mut g, &c, "env", "EnvironmentalSensor", 0.0, 0.0);
        place(&mut g, &c, "hg", "HomeGateway", 274.0, 0.0);
        let id = g.connect(NewLink::between("env", "hg")).unwrap();
        let props = g.link_properties(id).unwrap();
        assert_eq!(props.length, 2);
        assert_eq!(props.mode, Some(ProtocolMode::Wireless));
        let node_props = g.node_properties("env").unwrap();
        assert!(node_props.contains_key("rooms"));
    }

    #[test]
    fn connected_subgraph_follows_any_link() {
        let (mut g, c) = store();
        place(&mut g, &c, "a", "ForwardingGateway", 0.0, 0.0);
        place(&mut g, &c, "b", "ForwardingGateway", 0.0, 0.0);
        place(&mut g, &c, "d", "ForwardingGateway", 0.0, 0.0);
        place(&mut g, &c, "lonely", "Router", 0.0, 0.0);
        g.add_link(NewLink::between("a", "b")).unwrap();
        g.add_link(NewLink::between("d", "b")).unwrap();
        assert_eq!(g.connected_subgraph("a"), vec!["a", "b", "d"]);
        assert_eq!(g.connected_subgraph("lonely"), vec!["lonely"]);
        assert!(g.has_gateway_mesh());
    }

    #[test]
    fn clear_drops_nodes_links_and_options() {
        let (mut g, c) = store();
        place(&mut g, &c, "env", "EnvironmentalSensor", 0.0, 0.0);
        place(&mut g, &c, "hg", "HomeGateway", 274.0, 0.0);
        g.connect(NewLink::between("env", "hg")).unwrap();
        let mut options = Map::new();
        options.insert("theme".to_string(), Value::from("dark"));
        g.merge_options(&options);
        assert_eq!(g.options().len(), 1);

        g.clear();
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.link_count(), 0);
        assert!(g.options().is_empty());
        assert_eq!(g.spent_credits(), 0);
    }

    #[test]
    fn generated_ids_are_unique() {
        let (g, _) = store();
        let mut rng = StdRng::seed_from_u64(7);
        let a = g.generate_node_id(&mut rng);
        let b = g.generate_node_id(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn save_check_reports_unknown_types() {
        let (mut g, c) = store();
        let mut unknown = Node::new("x", std::sync::Arc::new(DeviceType::placeholder("Toaster", 1)), Point::default());
        unknown.properties.insert("name".to_string(), Value::from("Toaster"));
        g.add_node(unknown).unwrap();
        place(&mut g, &c, "hg", "HomeGateway", 0.0, 0.0);
        let check = g.save_check();
        assert!(!check.is_clean());
        assert_eq!(check.unknown_types, vec!["Toaster".to_string()]);
        assert_eq!(check.invalid_nodes, 1);
    }
}
