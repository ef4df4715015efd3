use chrono::Local;
use embassy_executor::{Executor, Spawner};
use env_logger::Builder;
use log::{LevelFilter, error, info};
use std::io::BufRead;
use std::path::Path;
use std::thread;
use std::time::Duration;

use homenet_planner::common::catalog::{Catalog, load_catalog};
use homenet_planner::common::layout::load_layout;
use homenet_planner::control::{GameConfig, HELP_TEXT, parse_command};
use homenet_planner::simulation::achievements::{AchievementEngine, AchievementLog};
use homenet_planner::simulation::game_task;
use homenet_planner::simulation::session::GameSession;
use homenet_planner::simulation::types::{
    GameCommand, GameCommandQueue, GameCommandQueueReceiver, GameCommandQueueSender, GameEvent, GameEventQueue, GameEventQueueSender,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// Back-off while the command queue is full.
const COMMAND_RETRY_DELAY: Duration = Duration::from_millis(10);

fn embassy_init(spawner: Spawner, session: GameSession, command_rx: GameCommandQueueReceiver, event_tx: GameEventQueueSender) {
    let _ = spawner.spawn(game_task(session, command_rx, event_tx));
}

fn send_command(command_tx: &GameCommandQueueSender, mut command: GameCommand) {
    loop {
        match command_tx.try_send(command) {
            Ok(()) => return,
            Err(embassy_sync::channel::TrySendError::Full(rejected)) => {
                command = rejected;
                thread::sleep(COMMAND_RETRY_DELAY);
            }
        }
    }
}

/// Read console lines until end of input or `quit`.
fn console_loop(command_tx: GameCommandQueueSender) {
    println!("{}", HELP_TEXT);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read console input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == "help" {
            println!("{}", HELP_TEXT);
            continue;
        }
        match parse_command(&line) {
            Ok(command) => {
                let quit = matches!(command, GameCommand::Quit);
                send_command(&command_tx, command);
                if quit {
                    return;
                }
            }
            Err(e) => println!("{}", e),
        }
    }
    send_command(&command_tx, GameCommand::Quit);
}

fn print_event(event: &GameEvent) {
    let stamp = Local::now().format("%H:%M:%S");
    match event {
        GameEvent::Notification { level, message } => println!("[{}] {}: {}", stamp, level, message),
        GameEvent::NodeAdded { id, type_name } => println!("[{}] Added {} ({})", stamp, id, type_name),
        GameEvent::NodeRemoved { id, links_removed } => println!("[{}] Removed {} and {} links", stamp, id, links_removed),
        GameEvent::NodeMoved { id, position } => println!("[{}] Moved {} to ({}, {})", stamp, id, position.x, position.y),
        GameEvent::LinkAdded { id, source, target, protocol } => {
            println!("[{}] Link {}: {} -> {} over {}", stamp, id, source, target, protocol)
        }
        GameEvent::LinkRemoved { id } => println!("[{}] Link {} removed", stamp, id),
        GameEvent::LinkUpdated { id, protocol, valid } => {
            println!("[{}] Link {} now uses {}{}", stamp, id, protocol, if *valid { "" } else { " (out of range)" })
        }
        GameEvent::Credits { spent, remaining, low } => {
            println!("[{}] Credits: {} cr spent, {} cr left{}", stamp, spent, remaining, if *low { " (low)" } else { "" })
        }
        GameEvent::ReachabilityChanged { reachable, total } => println!("[{}] {} of {} devices reachable", stamp, reachable, total),
        GameEvent::CoverageUpdated(report) => println!(
            "[{}] Coverage: environmental {}%, wearable {}%, video {}%",
            stamp, report.environmental.percentage, report.wearable.percentage, report.video.percentage
        ),
        GameEvent::AchievementUnlocked { name, explanation } => println!("[{}] Achievement unlocked: {}\n  {}", stamp, name, explanation),
        GameEvent::Achievements(list) => {
            for status in list {
                println!("  [{}] {}", if status.done { "x" } else { " " }, status.name);
            }
        }
        GameEvent::Suggestion(text) => println!("{}", text),
        GameEvent::ProtocolChoices { link, choices } => {
            println!("Protocols for link {}:", link);
            for choice in choices {
                println!("  {} ({}){}", choice.nm, choice.name, if choice.in_range { "" } else { " - out of range" });
            }
        }
        GameEvent::NodeDetails(details) => {
            println!(
                "{} ({}) at ({}, {}), {}",
                details.id,
                details.type_name,
                details.position.x,
                details.position.y,
                if details.reachable { "reachable" } else { "unreachable" }
            );
            for (key, value) in &details.properties {
                println!("  {}: {}", key, value);
            }
        }
        GameEvent::LinkDetails { link, properties } => {
            let mode = properties.mode.map(|m| format!(", {}", m)).unwrap_or_default();
            println!("Link {}: {}, {} m{}", link, properties.protocol, properties.length, mode);
        }
        GameEvent::Exported(json) => println!("{}", json),
        GameEvent::Saved { path } => println!("[{}] Saved to {}", stamp, path),
        GameEvent::Status {
            nodes,
            links,
            reachable,
            spent,
            remaining,
        } => println!(
            "{} devices ({} reachable), {} links, {} cr spent, {} cr left",
            nodes, reachable, links, spent, remaining
        ),
        GameEvent::Shutdown => println!("[{}] Bye", stamp),
    }
}

fn build_session(config: GameConfig) -> Result<GameSession, String> {
    let catalog = match &config.catalog_path {
        Some(path) => load_catalog(path),
        None => Catalog::builtin(),
    }
    .map_err(|e| e.to_string())?;
    let layout = load_layout(&config.layout_path).map_err(|e| e.to_string())?;
    let achievements = AchievementEngine::new(AchievementLog::load(&config.achievements_path));
    Ok(GameSession::new(config, catalog, layout, achievements))
}

fn main() {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter(Some("homenet_planner"), LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Starting up");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match GameConfig::load_or_default(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let session = match build_session(config) {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let command_queue: &'static GameCommandQueue = Box::leak(Box::new(GameCommandQueue::new()));
    let event_queue: &'static GameEventQueue = Box::leak(Box::new(GameEventQueue::new()));
    let command_rx = command_queue.receiver();
    let event_tx = event_queue.sender();

    let spawned = thread::Builder::new().name("embassy-executor".to_string()).spawn(move || {
        // Leak the executor to satisfy the 'static lifetime required by run()
        let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
        executor.run(|spawner| embassy_init(spawner, session, command_rx, event_tx));
    });
    if let Err(e) = spawned {
        error!("Failed to spawn executor thread: {}", e);
        std::process::exit(1);
    }

    let command_tx = command_queue.sender();
    if let Err(e) = thread::Builder::new().name("console".to_string()).spawn(move || console_loop(command_tx)) {
        error!("Failed to spawn console thread: {}", e);
        std::process::exit(1);
    }

    let event_rx = event_queue.receiver();
    loop {
        match event_rx.try_receive() {
            Ok(event) => {
                print_event(&event);
                if matches!(event, GameEvent::Shutdown) {
                    break;
                }
            }
            Err(_) => thread::sleep(Duration::from_millis(20)),
        }
    }
    info!("Shut down");
}
