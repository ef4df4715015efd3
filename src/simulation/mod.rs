//! Game engine core module.
//!
//! Everything that reads or writes the device graph lives here:
//! - `types`: nodes, links, commands, events and channels
//! - `graph`: the graph store with link feasibility and credit accounting
//! - `geometry`: distance and room assignment
//! - `reachability`: breadth-first reachability from home gateways
//! - `coverage` and `achievements`: goals evaluated every tick
//! - `suggestions`: the hint picker
//! - `document`: graph import and export
//! - `session` and `game_task`: the state owner and the task driving it
//!
//! The entry point is `game_task`, which should be spawned by the Embassy
//! executor. It talks to the front end through the channels in `types`.

pub mod achievements;
pub mod coverage;
pub mod document;
pub mod game_task;
pub mod geometry;
pub mod graph;
pub mod reachability;
pub mod session;
pub mod suggestions;
pub mod types;

pub use game_task::game_task;
pub use session::GameSession;
pub use types::{GameCommand, GameEvent, LinkId, Point};
