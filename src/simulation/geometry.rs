//! Geometry for link lengths and room assignment.
//!
//! Contains helper functions for:
//! - Link length between two placed devices
//! - Point-in-rectangle tests with a tolerance band
//! - Mapping a position to the room segments it falls into

use super::types::Point;
use crate::common::layout::{Rect, RoomLayout};

/// Length of a link from `source` to `target` in plan units.
///
/// Positions are the top-left corner of the drawn node, so the source is
/// shifted right by `node_width` to measure from its output side. The target
/// is not shifted, which makes the distance asymmetric.
pub fn distance(source: &Point, target: &Point, node_width: f64) -> f64 {
    let dx = source.x + node_width - target.x;
    let dy = source.y - target.y;
    (dx * dx + dy * dy).sqrt()
}

/// Inclusive point-in-rectangle test with the rectangle grown by `tolerance`
/// on every side.
pub fn point_in_rect_with_tolerance(p: &Point, rect: &Rect, tolerance: f64) -> bool {
    let left = rect.x1.min(rect.x2) - tolerance;
    let right = rect.x1.max(rect.x2) + tolerance;
    let top = rect.y1.min(rect.y2) - tolerance;
    let bottom = rect.y1.max(rect.y2) + tolerance;
    p.x >= left && p.x <= right && p.y >= top && p.y <= bottom
}

/// Rooms and room segments containing `position`.
///
/// Returns `(rooms, segments)`: room names are de-duplicated and keep layout
/// order, segments list every match. A position near a shared wall lands in
/// both rooms.
pub fn assign_rooms(position: &Point, layout: &RoomLayout, room_boundary: f64) -> (Vec<String>, Vec<String>) {
    let mut rooms: Vec<String> = Vec::new();
    let mut segments = Vec::new();
    for segment in layout.segments() {
        if point_in_rect_with_tolerance(position, &segment.rect, room_boundary) {
            if !rooms.contains(&segment.room) {
                rooms.push(segment.room.clone());
            }
            segments.push(segment.room_segment.clone());
        }
    }
    (rooms, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::layout::parse_layout;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Rect {
        Rect { x1, y1, x2, y2 }
    }

    #[test]
    fn distance_offsets_source_only() {
        let a = p(0.0, 0.0);
        let b = p(174.0, 0.0);
        assert_eq!(distance(&a, &b, 174.0), 0.0);
        assert_eq!(distance(&b, &a, 174.0), 348.0);
        assert_eq!(distance(&p(0.0, 0.0), &p(3.0, 4.0), 0.0), 5.0);
    }

    #[test]
    fn rect_test_is_inclusive_and_tolerant() {
        let r = rect(10.0, 10.0, 20.0, 20.0);
        assert!(point_in_rect_with_tolerance(&p(10.0, 10.0), &r, 0.0));
        assert!(point_in_rect_with_tolerance(&p(20.0, 20.0), &r, 0.0));
        assert!(!point_in_rect_with_tolerance(&p(9.0, 10.0), &r, 0.0));
        assert!(point_in_rect_with_tolerance(&p(9.0, 10.0), &r, 1.0));
        assert!(point_in_rect_with_tolerance(&p(25.0, 25.0), &r, 5.0));
        assert!(!point_in_rect_with_tolerance(&p(25.1, 25.0), &r, 5.0));
    }

    #[test]
    fn shared_boundary_lands_in_both_rooms() {
        let layout = parse_layout(
            r#"[
                {"roomSegment": "k", "room": "kitchen", "x1": 0, "y1": 0, "x2": 100, "y2": 100},
                {"roomSegment": "d", "room": "dining room", "x1": 100, "y1": 0, "x2": 200, "y2": 100}
            ]"#,
        )
        .unwrap();
        let (rooms, segments) = assign_rooms(&p(110.0, 50.0), &layout, 30.0);
        assert_eq!(rooms, vec!["kitchen".to_string(), "dining room".to_string()]);
        assert_eq!(segments, vec!["k".to_string(), "d".to_string()]);

        let (rooms, _) = assign_rooms(&p(150.0, 50.0), &layout, 30.0);
        assert_eq!(rooms, vec!["dining room".to_string()]);
    }

    #[test]
    fn split_room_is_listed_once() {
        let layout = parse_layout(
            r#"[
                {"roomSegment": "h1", "room": "hall", "x1": 0, "y1": 0, "x2": 100, "y2": 100},
                {"roomSegment": "h2", "room": "hall", "x1": 100, "y1": 0, "x2": 200, "y2": 100}
            ]"#,
        )
        .unwrap();
        let (rooms, segments) = assign_rooms(&p(100.0, 50.0), &layout, 0.0);
        assert_eq!(rooms, vec!["hall".to_string()]);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn outside_every_room() {
        let layout = parse_layout(r#"[{"roomSegment": "k", "room": "kitchen", "x1": 0, "y1": 0, "x2": 100, "y2": 100}]"#).unwrap();
        let (rooms, segments) = assign_rooms(&p(500.0, 500.0), &layout, 30.0);
        assert!(rooms.is_empty());
        assert!(segments.is_empty());
    }
}
