//! Home network planner engine.
//!
//! Devices are placed on a floor plan and linked together; every tick the
//! engine recomputes which devices reach a home gateway, which rooms they
//! cover, and which achievements the current plan has earned.

pub mod common;
pub mod control;
pub mod simulation;
