//! Room coverage per sensing modality.
//!
//! Coverage is derived from reachability and room membership, so it must be
//! computed after a reachability pass. Every figure is an integer percentage
//! paired with whether the full-coverage goal is met.

use serde::Serialize;

use super::graph::GraphStore;
use crate::common::catalog::Modality;
use crate::common::layout::RoomLayout;

/// Rooms where video sensing matters.
pub const VIDEO_ROOMS: [&str; 3] = ["hall-and-stairs", "kitchen", "living room"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CoverageEntry {
    pub achieved: bool,
    /// 0 to 100.
    pub percentage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CoverageReport {
    pub environmental: CoverageEntry,
    pub wearable: CoverageEntry,
    pub video: CoverageEntry,
}

impl CoverageReport {
    pub fn compute(store: &GraphStore, layout: &RoomLayout) -> Self {
        Self {
            environmental: environmental_coverage(store, layout),
            wearable: wearable_coverage(store, layout),
            video: video_coverage(store),
        }
    }
}

/// Facts about forwarding-gateway coverage that several goals share.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WearableStats {
    pub room_count: usize,
    /// Rooms containing a reachable forwarding gateway.
    pub present_rooms: Vec<String>,
    pub has_wearable: bool,
    /// Forwarding gateways placed, reachable or not.
    pub gateway_count: usize,
}

impl WearableStats {
    pub fn collect(store: &GraphStore, layout: &RoomLayout) -> Self {
        Self {
            room_count: layout.room_count(),
            present_rooms: covered_rooms(store, Modality::Gateway),
            has_wearable: store.has_modality(Modality::Wearable),
            gateway_count: store.nodes_of(Modality::Gateway).count(),
        }
    }

    /// At least one forwarding gateway for every two rooms.
    pub fn half_covered(&self) -> bool {
        2 * self.present_rooms.len() >= self.room_count
    }

    pub fn fully_covered(&self) -> bool {
        self.present_rooms.len() >= self.room_count
    }

    pub fn covers(&self, room: &str) -> bool {
        self.present_rooms.iter().any(|r| r == room)
    }
}

/// Distinct rooms containing a reachable node of the given modality.
pub fn covered_rooms(store: &GraphStore, modality: Modality) -> Vec<String> {
    let mut rooms: Vec<String> = Vec::new();
    for node in store.reachable_of(modality) {
        for room in &node.rooms {
            if !rooms.contains(room) {
                rooms.push(room.clone());
            }
        }
    }
    rooms
}

/// A reachable node of the given modality in the named room.
pub fn reachable_in_room(store: &GraphStore, modality: Modality, room: &str) -> bool {
    store.reachable_of(modality).any(|n| n.in_room(room))
}

fn percentage(ratio: f64) -> u8 {
    (100.0 * ratio.clamp(0.0, 1.0)).round() as u8
}

/// Every room has a reachable environmental sensor. A plan without rooms
/// has nothing to cover and never counts as covered.
pub fn environmental_coverage(store: &GraphStore, layout: &RoomLayout) -> CoverageEntry {
    let all = layout.room_count();
    if all == 0 {
        return CoverageEntry::default();
    }
    let covered = covered_rooms(store, Modality::Environmental).len();
    CoverageEntry {
        achieved: covered >= all,
        percentage: percentage(covered as f64 / all as f64),
    }
}

/// A wearable exists and forwarding gateways reach at least every other room.
pub fn wearable_coverage(store: &GraphStore, layout: &RoomLayout) -> CoverageEntry {
    let stats = WearableStats::collect(store, layout);
    let percentage = if stats.room_count > 0 && stats.has_wearable {
        percentage(2.0 * stats.present_rooms.len() as f64 / stats.room_count as f64)
    } else {
        0
    };
    CoverageEntry {
        achieved: stats.has_wearable && stats.half_covered(),
        percentage,
    }
}

/// Reachable cameras in the hall, kitchen and living room.
pub fn video_coverage(store: &GraphStore) -> CoverageEntry {
    let count = VIDEO_ROOMS.iter().filter(|room| reachable_in_room(store, Modality::Video, room)).count();
    CoverageEntry {
        achieved: count >= VIDEO_ROOMS.len(),
        percentage: percentage(count as f64 / VIDEO_ROOMS.len() as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::Catalog;
    use crate::common::layout::{RoomSegment, parse_layout};
    use crate::control::config::GameConfig;
    use crate::simulation::reachability::recompute;
    use crate::simulation::types::{NewLink, Node, Point};

    fn five_rooms() -> RoomLayout {
        parse_layout(
            r#"[
                {"roomSegment": "r1", "room": "kitchen", "x1": 0, "y1": 0, "x2": 200, "y2": 200},
                {"roomSegment": "r2", "room": "living room", "x1": 1000, "y1": 0, "x2": 1200, "y2": 200},
                {"roomSegment": "r3", "room": "hall-and-stairs", "x1": 2000, "y1": 0, "x2": 2200, "y2": 200},
                {"roomSegment": "r4", "room": "study", "x1": 3000, "y1": 0, "x2": 3200, "y2": 200},
                {"roomSegment": "r5", "room": "toilet", "x1": 4000, "y1": 0, "x2": 4200, "y2": 200}
            ]"#,
        )
        .unwrap()
    }

    /// Puts a home gateway and a linked node of `type_name` in each listed room.
    fn cover(store: &mut GraphStore, catalog: &Catalog, type_name: &str, xs: &[f64]) {
        for (i, x) in xs.iter().enumerate() {
            let hg = format!("hg{}-{}", type_name, i);
            let dev = format!("{}-{}", type_name, i);
            store.add_node(Node::new(hg.clone(), catalog.get("HomeGateway").unwrap(), Point::new(*x, 100.0))).unwrap();
            store.add_node(Node::new(dev.clone(), catalog.get(type_name).unwrap(), Point::new(*x - 174.0 + 10.0, 100.0))).unwrap();
            let protocol = if type_name == "Camera" { "USB" } else { "TSCH" };
            store.add_link(NewLink::between(dev, hg).with_protocol(protocol)).unwrap();
        }
    }

    #[test]
    fn environmental_partial() {
        let layout = five_rooms();
        let catalog = Catalog::builtin().unwrap();
        let mut g = GraphStore::new(&GameConfig::default());
        cover(&mut g, &catalog, "EnvironmentalSensor", &[180.0, 1180.0, 2180.0]);
        recompute(&mut g, &layout, 30.0);
        let entry = environmental_coverage(&g, &layout);
        assert_eq!(entry, CoverageEntry { achieved: false, percentage: 60 });
    }

    #[test]
    fn environmental_full() {
        let layout = five_rooms();
        let catalog = Catalog::builtin().unwrap();
        let mut g = GraphStore::new(&GameConfig::default());
        cover(&mut g, &catalog, "EnvironmentalSensor", &[180.0, 1180.0, 2180.0, 3180.0, 4180.0]);
        recompute(&mut g, &layout, 30.0);
        assert_eq!(environmental_coverage(&g, &layout), CoverageEntry { achieved: true, percentage: 100 });
    }

    #[test]
    fn zero_rooms_means_no_environmental_coverage() {
        let layout = RoomLayout::new(Vec::<RoomSegment>::new()).unwrap();
        let catalog = Catalog::builtin().unwrap();
        let mut g = GraphStore::new(&GameConfig::default());
        cover(&mut g, &catalog, "EnvironmentalSensor", &[180.0]);
        recompute(&mut g, &layout, 30.0);
        assert_eq!(environmental_coverage(&g, &layout), CoverageEntry { achieved: false, percentage: 0 });
    }

    #[test]
    fn wearable_needs_a_wristband() {
        let layout = five_rooms();
        let catalog = Catalog::builtin().unwrap();
        let mut g = GraphStore::new(&GameConfig::default());
        cover(&mut g, &catalog, "ForwardingGateway", &[180.0, 1180.0, 2180.0]);
        recompute(&mut g, &layout, 30.0);
        assert_eq!(wearable_coverage(&g, &layout), CoverageEntry { achieved: false, percentage: 0 });

        g.add_node(Node::new("wb", catalog.get("WristbandSensor").unwrap(), Point::new(0.0, 0.0))).unwrap();
        recompute(&mut g, &layout, 30.0);
        // 2 * 3 / 5 clamps to 100%.
        assert_eq!(wearable_coverage(&g, &layout), CoverageEntry { achieved: true, percentage: 100 });
        let stats = WearableStats::collect(&g, &layout);
        assert_eq!(stats.gateway_count, 3);
        assert!(!stats.fully_covered());
    }

    #[test]
    fn video_counts_the_three_main_rooms() {
        let layout = five_rooms();
        let catalog = Catalog::builtin().unwrap();
        let mut g = GraphStore::new(&GameConfig::default());
        // kitchen, living room, study
        cover(&mut g, &catalog, "Camera", &[180.0, 1180.0, 3180.0]);
        recompute(&mut g, &layout, 30.0);
        assert_eq!(video_coverage(&g), CoverageEntry { achieved: false, percentage: 67 });
        let report = CoverageReport::compute(&g, &layout);
        assert_eq!(report.video.percentage, 67);
        assert_eq!(report.environmental.percentage, 0);
    }
}
