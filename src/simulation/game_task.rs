//! Game task: owns the session and drives it from commands and the tick timer.
//!
//! High-level flow each loop iteration:
//! 1) `select` waits for a front-end command or the next tick deadline.
//! 2) A command is applied to the session and its events are published.
//! 3) On the deadline the session runs one evaluation pass; the next deadline
//!    is set only once the pass has finished, so passes never overlap.

use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use std::path::Path;

use super::session::GameSession;
use super::types::{GameCommand, GameEvent, GameCommandQueueReceiver, GameEventQueueSender};

/// Evaluation passes slower than this are logged.
const SLOW_TICK_WARNING: Duration = Duration::from_millis(100);

/// Waits for room in the event queue rather than dropping events.
async fn publish(event_tx: &GameEventQueueSender, events: Vec<GameEvent>) {
    for event in events {
        event_tx.send(event).await;
    }
}

#[embassy_executor::task]
pub async fn game_task(mut session: GameSession, command_rx: GameCommandQueueReceiver, event_tx: GameEventQueueSender) {
    let tick_period = Duration::from_millis(session.config().tick_period_ms);

    let graph_path = session.config().graph_path.clone();
    if Path::new(&graph_path).exists() {
        log::info!("Loading saved plan from {}", graph_path);
        let events = session.apply(GameCommand::Import(graph_path));
        publish(&event_tx, events).await;
    }

    let mut next_tick = Instant::now();
    loop {
        match select(command_rx.receive(), Timer::at(next_tick)).await {
            Either::First(command) => {
                let quit = matches!(command, GameCommand::Quit);
                let events = session.apply(command);
                publish(&event_tx, events).await;
                if quit {
                    log::info!("Game task stopping");
                    return;
                }
            }
            Either::Second(_) => {
                let started = Instant::now();
                let events = session.tick();
                publish(&event_tx, events).await;
                let elapsed = started.elapsed();
                if elapsed > SLOW_TICK_WARNING {
                    log::warn!("Evaluation pass took {} ms", elapsed.as_millis());
                }
                next_tick = Instant::now() + tick_period;
            }
        }
    }
}
