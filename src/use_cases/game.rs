use super::arena::Arena;
use super::types::GameEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Fixed-rate simulation loop for one arena.
///
/// Queued input is drained once per tick, then players and projectiles advance by one
/// step. Exits when `shutdown` flips to true or its sender goes away.
pub async fn world_task(
    arena: Arc<Arena>,
    mut input_rx: mpsc::Receiver<GameEvent>,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // Drive the fixed-step game loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }

        while let Ok(ev) = input_rx.try_recv() {
            apply_event(&arena, ev);
        }

        arena.tick(tick_interval);
    }

    info!("world task stopped");
}

fn apply_event(arena: &Arena, ev: GameEvent) {
    match ev {
        GameEvent::Move {
            player_id,
            direction,
        } => {
            if !arena.movement_input(&player_id, direction) {
                debug!(%player_id, "movement input ignored");
            }
        }
        GameEvent::Cast {
            player_id,
            spell_name,
            target,
        } => {
            // Rejections are logged by the arena and otherwise a no-op.
            let _ = arena.cast(&player_id, &spell_name, target);
        }
    }
}
