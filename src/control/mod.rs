//! Front-end facing configuration and console command parsing.

pub mod command;
pub mod config;

pub use command::{HELP_TEXT, parse_command};
pub use config::GameConfig;
