//! Console command parsing.
//!
//! One command per line, words separated by whitespace. Link ids may be
//! written with or without the `L` prefix.

use crate::simulation::types::{GameCommand, LinkId, Point};

pub const HELP_TEXT: &str = "Commands:
  add <type> <x> <y> [id]        place a device
  remove <id>                    remove a device and its links
  move <id> <x> <y>              move a device
  connect <source> <target> [protocol]
  disconnect <link>              remove a link
  protocol <link> <protocol>     change the protocol of a link
  protocols <link>               list usable protocols for a link
  show <id>                      device details
  link <link>                    link details
  dialog open|close              pause or resume achievement checks
  suggest                        get a hint
  achievements                   list achievements
  achievement <name>             show one achievement
  reset-achievements
  clear                          remove every device
  export                         print the plan as JSON
  import <file>                  load a plan document
  save [force]                   write the plan to the configured file
  status
  quit";

fn arg<'a>(words: &[&'a str], index: usize, what: &str) -> Result<&'a str, String> {
    words.get(index).copied().ok_or_else(|| format!("Missing {}", what))
}

fn coordinate(words: &[&str], index: usize, what: &str) -> Result<f64, String> {
    let raw = arg(words, index, what)?;
    let value: f64 = raw.parse().map_err(|_| format!("Invalid {}: {}", what, raw))?;
    if !value.is_finite() {
        return Err(format!("Invalid {}: {}", what, raw));
    }
    Ok(value)
}

fn position(words: &[&str], index: usize) -> Result<Point, String> {
    Ok(Point::new(coordinate(words, index, "x")?, coordinate(words, index + 1, "y")?))
}

pub fn parse_link_id(raw: &str) -> Result<LinkId, String> {
    let digits = raw.strip_prefix('L').or_else(|| raw.strip_prefix('l')).unwrap_or(raw);
    digits.parse().map(LinkId).map_err(|_| format!("Invalid link id: {}", raw))
}

fn link(words: &[&str], index: usize) -> Result<LinkId, String> {
    parse_link_id(arg(words, index, "link id")?)
}

fn no_more(words: &[&str], count: usize) -> Result<(), String> {
    match words.get(count) {
        Some(extra) => Err(format!("Unexpected argument: {}", extra)),
        None => Ok(()),
    }
}

/// Parse one console line. Blank lines are an error the caller can ignore.
pub fn parse_command(line: &str) -> Result<GameCommand, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some(&verb) = words.first() else {
        return Err("Empty command".to_string());
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" => {
            let type_name = arg(&words, 1, "device type")?.to_string();
            let position = position(&words, 2)?;
            let id = words.get(4).map(|s| s.to_string());
            no_more(&words, 5)?;
            GameCommand::AddNode { type_name, position, id }
        }
        "remove" | "rm" => {
            let id = arg(&words, 1, "device id")?.to_string();
            no_more(&words, 2)?;
            GameCommand::RemoveNode(id)
        }
        "move" | "mv" => {
            let id = arg(&words, 1, "device id")?.to_string();
            let position = position(&words, 2)?;
            no_more(&words, 4)?;
            GameCommand::MoveNode { id, position }
        }
        "connect" => {
            let source = arg(&words, 1, "source id")?.to_string();
            let target = arg(&words, 2, "target id")?.to_string();
            let protocol = words.get(3).map(|s| s.to_string());
            no_more(&words, 4)?;
            GameCommand::Connect { source, target, protocol }
        }
        "disconnect" => {
            let id = link(&words, 1)?;
            no_more(&words, 2)?;
            GameCommand::Disconnect(id)
        }
        "protocol" => {
            let id = link(&words, 1)?;
            let protocol = arg(&words, 2, "protocol")?.to_string();
            no_more(&words, 3)?;
            GameCommand::SetLinkProtocol { link: id, protocol }
        }
        "protocols" => {
            let id = link(&words, 1)?;
            no_more(&words, 2)?;
            GameCommand::ListProtocols(id)
        }
        "show" => {
            let id = arg(&words, 1, "device id")?.to_string();
            no_more(&words, 2)?;
            GameCommand::ShowNode(id)
        }
        "link" => {
            let id = link(&words, 1)?;
            no_more(&words, 2)?;
            GameCommand::ShowLink(id)
        }
        "dialog" => match arg(&words, 1, "open or close")? {
            "open" => GameCommand::SetDialogOpen(true),
            "close" => GameCommand::SetDialogOpen(false),
            other => return Err(format!("Expected open or close, got {}", other)),
        },
        "suggest" | "hint" => GameCommand::Suggest,
        "achievements" => GameCommand::ListAchievements,
        "achievement" => {
            if words.len() < 2 {
                return Err("Missing achievement name".to_string());
            }
            GameCommand::ShowAchievement(words[1..].join(" "))
        }
        "reset-achievements" => GameCommand::ResetAchievements,
        "clear" => GameCommand::Clear,
        "export" => GameCommand::Export,
        "import" | "load" => {
            let path = arg(&words, 1, "file name")?.to_string();
            no_more(&words, 2)?;
            GameCommand::Import(path)
        }
        "save" => match words.get(1) {
            None => GameCommand::Save { force: false },
            Some(&"force") => GameCommand::Save { force: true },
            Some(other) => return Err(format!("Unexpected argument: {}", other)),
        },
        "status" => GameCommand::Status,
        "quit" | "exit" => GameCommand::Quit,
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(command)
}
