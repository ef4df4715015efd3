//! Room layout loading, parsing, and validation logic.
//!
//! A layout is a flat list of room segments: axis-aligned rectangles on the
//! floor plan, each tagged with the room it belongs to. A room may consist of
//! several segments (an L-shaped hall is two rectangles).

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

/// Error type for layout loading failures.
#[derive(Debug)]
pub enum LayoutLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for LayoutLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            LayoutLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            LayoutLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for LayoutLoadError {}

/// Axis-aligned rectangle with top-left `(x1, y1)` and bottom-right `(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One rectangle of a room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSegment {
    pub room_segment: String,
    pub room: String,
    #[serde(flatten)]
    pub rect: Rect,
}

/// The whole floor plan.
#[derive(Debug, Clone, Default)]
pub struct RoomLayout {
    segments: Vec<RoomSegment>,
    /// Unique room names in first-appearance order.
    room_names: Vec<String>,
}

impl RoomLayout {
    pub fn new(segments: Vec<RoomSegment>) -> Result<Self, LayoutLoadError> {
        validate_layout(&segments).map_err(LayoutLoadError::ValidationError)?;
        let mut room_names: Vec<String> = Vec::new();
        for s in &segments {
            if !room_names.contains(&s.room) {
                room_names.push(s.room.clone());
            }
        }
        Ok(Self { segments, room_names })
    }

    pub fn segments(&self) -> &[RoomSegment] {
        &self.segments
    }

    pub fn room_names(&self) -> &[String] {
        &self.room_names
    }

    pub fn room_count(&self) -> usize {
        self.room_names.len()
    }

    pub fn has_room(&self, room: &str) -> bool {
        self.room_names.iter().any(|r| r == room)
    }
}

/// Parse and validate a layout from JSON text.
pub fn parse_layout(data: &str) -> Result<RoomLayout, LayoutLoadError> {
    let segments: Vec<RoomSegment> = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| LayoutLoadError::ParseError(e.to_string()))?;
    RoomLayout::new(segments)
}

/// Load and parse a layout from a file.
pub fn load_layout(path: &str) -> Result<RoomLayout, LayoutLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| LayoutLoadError::FileReadError(e.to_string()))?;
    let layout = parse_layout(&data)?;
    log::info!(
        "Loaded layout {} with {} rooms in {} segments",
        path,
        layout.room_count(),
        layout.segments().len()
    );
    log::debug!("Rooms: {}", layout.room_names().join(", "));
    Ok(layout)
}

/// Validate a list of room segments.
///
/// Segment ids must be unique, room names non-empty, and every rectangle must
/// have its first corner strictly above and left of the second.
pub fn validate_layout(segments: &[RoomSegment]) -> Result<(), String> {
    const MAX_PLAN_COORD: f64 = 100000.0;

    let mut ids = HashSet::new();
    for (idx, segment) in segments.iter().enumerate() {
        if segment.room_segment.is_empty() {
            return Err(format!("Room segment {} has an empty id", idx));
        }
        if !ids.insert(segment.room_segment.as_str()) {
            return Err(format!("Duplicate room segment found: {}", segment.room_segment));
        }
        if segment.room.is_empty() {
            return Err(format!("Room segment {} has an empty room name", segment.room_segment));
        }
        let r = &segment.rect;
        if [r.x1, r.y1, r.x2, r.y2].iter().any(|c| !c.is_finite() || c.abs() > MAX_PLAN_COORD) {
            return Err(format!(
                "Room segment {} has coordinates outside the plan (±{})",
                segment.room_segment, MAX_PLAN_COORD
            ));
        }
        if r.x1 >= r.x2 || r.y1 >= r.y2 {
            return Err(format!(
                "Room segment {} has invalid geometry: ({}, {}) must be strictly less than ({}, {})",
                segment.room_segment, r.x1, r.y1, r.x2, r.y2
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../data/sphere-house-layout.json");

    #[test]
    fn bundled_layout_loads() {
        let layout = parse_layout(SAMPLE).unwrap();
        assert_eq!(layout.segments().len(), 10);
        assert_eq!(layout.room_count(), 9);
        assert_eq!(layout.room_names()[0], "living room");
        assert!(layout.has_room("hall-and-stairs"));
        assert!(!layout.has_room("garage"));
    }

    #[test]
    fn duplicate_segment_rejected() {
        let json = r#"[
            {"roomSegment": "a", "room": "kitchen", "x1": 0, "y1": 0, "x2": 10, "y2": 10},
            {"roomSegment": "a", "room": "toilet", "x1": 10, "y1": 0, "x2": 20, "y2": 10}
        ]"#;
        match parse_layout(json) {
            Err(LayoutLoadError::ValidationError(msg)) => assert!(msg.contains("Duplicate")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn inverted_rectangle_rejected() {
        let json = r#"[{"roomSegment": "a", "room": "kitchen", "x1": 10, "y1": 0, "x2": 0, "y2": 10}]"#;
        assert!(matches!(parse_layout(json), Err(LayoutLoadError::ValidationError(_))));
    }

    #[test]
    fn missing_field_is_parse_error() {
        let json = r#"[{"roomSegment": "a", "x1": 0, "y1": 0, "x2": 10, "y2": 10}]"#;
        assert!(matches!(parse_layout(json), Err(LayoutLoadError::ParseError(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let path = std::env::temp_dir().join("homenet-planner-no-such-layout.json");
        let result = load_layout(path.to_str().unwrap());
        assert!(matches!(result, Err(LayoutLoadError::FileReadError(_))));
    }
}
