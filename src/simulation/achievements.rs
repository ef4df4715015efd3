//! Achievements: a fixed table of goals and the persisted set of goals the
//! player has reached.
//!
//! Once an achievement is done it stays done until the log is reset, even if
//! the plan later stops satisfying it.

use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::coverage::{CoverageReport, VIDEO_ROOMS, WearableStats, reachable_in_room};
use super::graph::GraphStore;
use crate::common::catalog::Modality;
use crate::common::layout::RoomLayout;

/// Name shown in listings for hidden achievements not yet reached.
pub const HIDDEN_NAME: &str = "Hidden achievement";

/// What a plan must satisfy for an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// A reachable device of this modality exists.
    AnyReachable(Modality),
    /// A wristband exists anywhere and a forwarding gateway is reachable.
    WearableSensing,
    /// A forwarding gateway has an incoming link from another one.
    MeshNetwork,
    FullEnvironmental,
    FullWearable,
    FullVideo,
    /// A wristband exists and a reachable forwarding gateway covers a bedroom.
    SleepMonitoring,
    /// Mesh, reachable environmental sensing and a wristband, with every
    /// TSCH/BLE link using the given protocol.
    WholeEmbeddedNetwork(&'static str),
    /// At most two forwarding gateways reaching every other room.
    Minimalist,
    /// Forwarding gateways reach every room.
    IndoorLocalization,
    /// A reachable water sensor in the room.
    WaterInRoom(&'static str),
}

/// Everything a criterion may look at, gathered once per evaluation.
pub struct EvalContext<'a> {
    pub store: &'a GraphStore,
    pub coverage: &'a CoverageReport,
    pub stats: WearableStats,
}

impl<'a> EvalContext<'a> {
    pub fn new(store: &'a GraphStore, layout: &RoomLayout, coverage: &'a CoverageReport) -> Self {
        Self {
            store,
            coverage,
            stats: WearableStats::collect(store, layout),
        }
    }
}

impl Criterion {
    pub fn is_met(&self, ctx: &EvalContext<'_>) -> bool {
        let store = ctx.store;
        match *self {
            Criterion::AnyReachable(modality) => store.has_reachable(modality),
            Criterion::WearableSensing => store.has_modality(Modality::Wearable) && store.has_reachable(Modality::Gateway),
            Criterion::MeshNetwork => store.has_gateway_mesh(),
            Criterion::FullEnvironmental => ctx.coverage.environmental.achieved,
            Criterion::FullWearable => ctx.coverage.wearable.achieved,
            Criterion::FullVideo => ctx.coverage.video.achieved,
            Criterion::SleepMonitoring => {
                ctx.stats.has_wearable
                    && ctx.stats.room_count > 0
                    && (ctx.stats.covers("guest bedroom") || ctx.stats.covers("master bedroom"))
            }
            Criterion::WholeEmbeddedNetwork(protocol) => {
                // With no TSCH or BLE links at all the count check holds trivially.
                store.has_gateway_mesh()
                    && store.has_reachable(Modality::Environmental)
                    && store.has_modality(Modality::Wearable)
                    && store.count_links_with_protocol(protocol)
                        == store.count_links_with_protocol("TSCH") + store.count_links_with_protocol("BLE")
            }
            Criterion::Minimalist => ctx.stats.gateway_count <= 2 && ctx.stats.has_wearable && ctx.stats.half_covered(),
            Criterion::IndoorLocalization => ctx.stats.has_wearable && ctx.stats.fully_covered(),
            Criterion::WaterInRoom(room) => reachable_in_room(store, Modality::Water, room),
        }
    }
}

/// Static achievement definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub name: &'static str,
    pub explanation: &'static str,
    pub criterion: Criterion,
    pub hidden: bool,
}

/// Every achievement, in evaluation order.
pub const ACHIEVEMENTS: [Achievement; 16] = [
    Achievement {
        name: "Environmental sensing",
        explanation: "You have collected the first data from an environmental sensor: temperature, humidity, light levels, and movement detection (via a PIR sensor)",
        criterion: Criterion::AnyReachable(Modality::Environmental),
        hidden: false,
    },
    Achievement {
        name: "Wearable sensing",
        explanation: "You have collected the first data from a wristband sensor: activity levels and location information",
        criterion: Criterion::WearableSensing,
        hidden: false,
    },
    Achievement {
        name: "Video sensing",
        explanation: "You have collected the first information extracted from video data: location information, movement quality, and information about activity types",
        criterion: Criterion::AnyReachable(Modality::Video),
        hidden: false,
    },
    Achievement {
        name: "Mesh network",
        explanation: "You have connected two forwarding gateways with each other, forming a wireless mesh network. This will allow to extend the range of wireless coverage",
        criterion: Criterion::MeshNetwork,
        hidden: false,
    },
    Achievement {
        name: "Full environmental sensing",
        explanation: "You have fully covered the house with environmental sensors",
        criterion: Criterion::FullEnvironmental,
        hidden: false,
    },
    Achievement {
        name: "Full wearable sensing",
        explanation: "You have fully covered the house with devices picking up data from wristband (wearable) sensors: at least one for each two rooms",
        criterion: Criterion::FullWearable,
        hidden: false,
    },
    Achievement {
        name: "Full video sensing",
        explanation: "You have installed video sensors in the hall, kitchen, and living room: the main areas of interest for video sensing",
        criterion: Criterion::FullVideo,
        hidden: false,
    },
    Achievement {
        name: "System monitoring",
        explanation: "You have installed a monitoring service over a 3G mobile connection. This will allow to remotely learn the state of the system, and schedule a maintenance visit in case some of the components have stopped working correctly",
        criterion: Criterion::AnyReachable(Modality::Cellular),
        hidden: false,
    },
    Achievement {
        name: "Sleep monitoring",
        explanation: "You have installed a wristband sensor and a forwarding gateway in a bedroom. This will allow to monitor activity levels during sleep",
        criterion: Criterion::SleepMonitoring,
        hidden: false,
    },
    Achievement {
        name: "TSCH network",
        explanation: "You have connected all embedded sensing and forwarding devices in a TSCH network",
        criterion: Criterion::WholeEmbeddedNetwork("TSCH"),
        hidden: true,
    },
    Achievement {
        name: "BLE network",
        explanation: "You have connected all embedded sensing and forwarding devices in a BLE network",
        criterion: Criterion::WholeEmbeddedNetwork("BLE"),
        hidden: true,
    },
    Achievement {
        name: "Minimalist",
        explanation: "You have covered the whole house with just two forwarding gateways.\n\nNote that while this is cost-efficient in the short term, adding some redundancy is usually a better option that helps to avoid losing data even if some devices stop working, which in home environment may happen due to a variety of reasons",
        criterion: Criterion::Minimalist,
        hidden: true,
    },
    Achievement {
        name: "Indoor localization",
        explanation: "You have installed forwarding gateways in sufficiently many rooms. This will allow to accurately track the location of the users of wristband sensors. From healthcare perspective, a lifestyle that is increasingly stationary may increasingly deteriorating health",
        criterion: Criterion::IndoorLocalization,
        hidden: true,
    },
    Achievement {
        name: "Water monitoring: kitchen",
        explanation: "You have installed a water sensor in kitchen. Food preparation and water consumption habits are highly correlated with long-term health outcomes",
        criterion: Criterion::WaterInRoom("kitchen"),
        hidden: true,
    },
    Achievement {
        name: "Water monitoring: bathroom",
        explanation: "You have installed a water sensor in bathroom. It may be helpful to know the showering frequency and duration; if not for health reasons, then at least for the energy bill",
        criterion: Criterion::WaterInRoom("bathroom"),
        hidden: true,
    },
    Achievement {
        name: "Water monitoring: toilet",
        explanation: "You have installed a water sensor in toilet. Frequency of toilet usage may be correlated with health; changes in this frequency may signal health problems",
        criterion: Criterion::WaterInRoom("toilet"),
        hidden: true,
    },
];

pub fn find_by_name(name: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.name == name)
}

/// Rooms named by video coverage or a water achievement that the layout
/// does not have. Goals tied to them can never be reached.
pub fn goal_rooms_missing_from(layout: &RoomLayout) -> Vec<&'static str> {
    let water_rooms = ACHIEVEMENTS.iter().filter_map(|a| match a.criterion {
        Criterion::WaterInRoom(room) => Some(room),
        _ => None,
    });
    let mut missing: Vec<&'static str> = Vec::new();
    for room in VIDEO_ROOMS.into_iter().chain(water_rooms) {
        if !layout.has_room(room) && !missing.contains(&room) {
            missing.push(room);
        }
    }
    missing
}

/// One row of the achievement listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementStatus {
    /// Real name, or [`HIDDEN_NAME`] for hidden achievements not yet done.
    pub name: String,
    pub done: bool,
}

/// Append-only set of reached achievement names, optionally backed by a
/// JSON file holding an array of names.
#[derive(Debug, Clone, Default)]
pub struct AchievementLog {
    path: Option<PathBuf>,
    done: Vec<String>,
}

impl AchievementLog {
    /// Log that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Read the persisted set. A missing, unreadable or malformed file is
    /// treated as an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let done = match read_names(&path) {
            Ok(names) => names,
            Err(e) => {
                if path.exists() {
                    log::warn!("Ignoring achievement file {}: {:#}", path.display(), e);
                }
                Vec::new()
            }
        };
        log::info!("{} achievements already done", done.len());
        Self { path: Some(path), done }
    }

    pub fn is_done(&self, name: &str) -> bool {
        self.done.iter().any(|n| n == name)
    }

    pub fn done(&self) -> &[String] {
        &self.done
    }

    /// Record an achievement. Returns false if it was already done.
    pub fn mark_done(&mut self, name: &str) -> bool {
        if self.is_done(name) {
            return false;
        }
        self.done.push(name.to_string());
        self.persist();
        true
    }

    /// Forget every achievement and persist the empty set.
    pub fn reset(&mut self) {
        self.done.clear();
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let result = serde_json::to_string(&self.done)
            .context("Failed to encode achievements")
            .and_then(|json| fs::write(path, json).with_context(|| format!("Failed to write {}", path.display())));
        if let Err(e) = result {
            log::warn!("Could not persist achievements: {:#}", e);
        }
    }
}

fn read_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let data = fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let names: Vec<String> = serde_json::from_str(&data).context("Invalid JSON format")?;
    Ok(names)
}

/// Evaluates the table against the plan and records newly reached goals.
#[derive(Debug, Clone, Default)]
pub struct AchievementEngine {
    log: AchievementLog,
}

impl AchievementEngine {
    pub fn new(log: AchievementLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &AchievementLog {
        &self.log
    }

    /// Check every achievement in table order and return the ones reached
    /// for the first time. Nothing is evaluated while a blocking dialog is
    /// open; a goal met meanwhile is picked up by a later call.
    pub fn evaluate(&mut self, ctx: &EvalContext<'_>, dialog_open: bool) -> Vec<&'static Achievement> {
        if dialog_open {
            return Vec::new();
        }
        let mut unlocked = Vec::new();
        for achievement in ACHIEVEMENTS.iter() {
            if self.log.is_done(achievement.name) {
                continue;
            }
            if achievement.criterion.is_met(ctx) && self.log.mark_done(achievement.name) {
                log::info!("Achievement unlocked: {}", achievement.name);
                unlocked.push(achievement);
            }
        }
        unlocked
    }

    /// Listing in table order with hidden, unreached names masked.
    pub fn summary(&self) -> Vec<AchievementStatus> {
        ACHIEVEMENTS
            .iter()
            .map(|a| {
                let done = self.log.is_done(a.name);
                let name = if a.hidden && !done { HIDDEN_NAME } else { a.name };
                AchievementStatus { name: name.to_string(), done }
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.log.reset();
    }
}
