//! Reachability pass.
//!
//! Every node starts unreachable; home gateways seed a breadth-first search
//! that follows valid links in both directions. A second pass then assigns
//! rooms to every node from its current position.

use std::collections::{HashMap, VecDeque};

use super::geometry::assign_rooms;
use super::graph::GraphStore;
use crate::common::layout::RoomLayout;

/// Undirected adjacency over node indices, built from valid links only.
fn build_adjacency(store: &GraphStore) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = store.nodes().iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let mut adjacency = vec![Vec::new(); store.node_count()];
    for link in store.links().filter(|l| l.valid) {
        if let (Some(&s), Some(&t)) = (index.get(link.source.as_str()), index.get(link.target.as_str())) {
            adjacency[s].push(t);
            adjacency[t].push(s);
        }
    }
    adjacency
}

/// Recompute `is_reachable` for every node, then rebuild room membership.
/// Returns the number of reachable nodes.
pub fn recompute(store: &mut GraphStore, layout: &RoomLayout, room_boundary: f64) -> usize {
    let adjacency = build_adjacency(store);
    let nodes = store.nodes_mut();

    let mut reachable = vec![false; nodes.len()];
    let mut queue: VecDeque<usize> = VecDeque::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.device_type.is_home_gateway {
            reachable[i] = true;
            queue.push_back(i);
        }
    }
    while let Some(current) = queue.pop_front() {
        for &next in &adjacency[current] {
            if !reachable[next] {
                reachable[next] = true;
                queue.push_back(next);
            }
        }
    }

    for (node, is_reachable) in nodes.iter_mut().zip(reachable.iter()) {
        if node.is_reachable != *is_reachable {
            node.dirty = true;
        }
        node.is_reachable = *is_reachable;
        if node.device_type.mobile {
            node.rooms.clear();
            node.room_segments.clear();
        } else {
            let (rooms, segments) = assign_rooms(&node.position, layout, room_boundary);
            node.rooms = rooms;
            node.room_segments = segments;
        }
    }

    reachable.iter().filter(|r| **r).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::Catalog;
    use crate::common::layout::parse_layout;
    use crate::control::config::GameConfig;
    use crate::simulation::types::{NewLink, Node, Point};

    fn setup() -> (GraphStore, Catalog, RoomLayout) {
        let layout = parse_layout(
            r#"[
                {"roomSegment": "k", "room": "kitchen", "x1": 0, "y1": 0, "x2": 400, "y2": 300},
                {"roomSegment": "l", "room": "living room", "x1": 400, "y1": 0, "x2": 800, "y2": 300}
            ]"#,
        )
        .unwrap();
        (GraphStore::new(&GameConfig::default()), Catalog::builtin().unwrap(), layout)
    }

    fn place(store: &mut GraphStore, catalog: &Catalog, id: &str, type_name: &str, x: f64, y: f64) {
        store.add_node(Node::new(id, catalog.get(type_name).unwrap(), Point::new(x, y))).unwrap();
    }

    fn reachable(store: &GraphStore, id: &str) -> bool {
        store.node(id).unwrap().is_reachable
    }

    #[test]
    fn gateway_and_linked_sensor_are_reachable() {
        let (mut g, c, layout) = setup();
        place(&mut g, &c, "hg", "HomeGateway", 300.0, 100.0);
        place(&mut g, &c, "env", "EnvironmentalSensor", 100.0, 100.0);
        g.connect(NewLink::between("env", "hg")).unwrap();
        assert_eq!(recompute(&mut g, &layout, 30.0), 2);
        assert!(reachable(&g, "hg"));
        assert!(reachable(&g, "env"));
        assert_eq!(g.node("env").unwrap().rooms, vec!["kitchen".to_string()]);
    }

    #[test]
    fn lone_gateway_is_reachable() {
        let (mut g, c, layout) = setup();
        place(&mut g, &c, "hg", "HomeGateway", 0.0, 0.0);
        place(&mut g, &c, "fg", "ForwardingGateway", 0.0, 0.0);
        assert_eq!(recompute(&mut g, &layout, 30.0), 1);
        assert!(reachable(&g, "hg"));
        assert!(!reachable(&g, "fg"));
    }

    #[test]
    fn links_are_followed_backwards_and_through_chains() {
        let (mut g, c, layout) = setup();
        place(&mut g, &c, "hg", "HomeGateway", 300.0, 100.0);
        place(&mut g, &c, "fg", "ForwardingGateway", 100.0, 100.0);
        place(&mut g, &c, "env", "EnvironmentalSensor", -50.0, 100.0);
        g.connect(NewLink::between("fg", "hg")).unwrap();
        g.connect(NewLink::between("env", "fg")).unwrap();
        recompute(&mut g, &layout, 30.0);
        assert!(reachable(&g, "env"));

        // Unlinking the only path makes the sensor unreachable again.
        let removed = g.remove_node("fg");
        assert_eq!(removed.len(), 2);
        recompute(&mut g, &layout, 30.0);
        assert!(!reachable(&g, "env"));
        assert!(reachable(&g, "hg"));
    }

    #[test]
    fn invalid_links_confer_nothing() {
        let (mut g, c, layout) = setup();
        place(&mut g, &c, "hg", "HomeGateway", 0.0, 0.0);
        place(&mut g, &c, "cam", "Camera", 0.0, 0.0);
        // Camera and home gateway share USB, but the camera is too far for it.
        g.add_link(NewLink::between("cam", "hg").with_protocol("USB")).unwrap();
        recompute(&mut g, &layout, 30.0);
        assert!(!reachable(&g, "cam"));
    }

    #[test]
    fn mobile_nodes_have_no_rooms() {
        let (mut g, c, layout) = setup();
        place(&mut g, &c, "wb", "WristbandSensor", 100.0, 100.0);
        place(&mut g, &c, "fg", "ForwardingGateway", 400.0, 100.0);
        recompute(&mut g, &layout, 30.0);
        assert!(g.node("wb").unwrap().rooms.is_empty());
        assert_eq!(
            g.node("fg").unwrap().rooms,
            vec!["kitchen".to_string(), "living room".to_string()]
        );
    }
}
