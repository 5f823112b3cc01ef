use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::ports::{Clock, Replicator};
use crate::domain::{PlayerState, SpellEvent};

// Hand-advanced time source for deterministic cooldown and expiry tests.
#[derive(Default)]
pub(crate) struct ManualClock(AtomicU64);

impl ManualClock {
    pub(crate) fn at(millis: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(millis)))
    }

    pub(crate) fn advance(&self, millis: u64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// Replicator that keeps everything it was asked to send.
#[derive(Default)]
pub(crate) struct RecordingReplicator {
    pub(crate) players: Mutex<Vec<Vec<String>>>,
    pub(crate) spells: Mutex<Vec<SpellEvent>>,
}

impl Replicator for RecordingReplicator {
    fn replicate_players(&self, players: &[PlayerState]) {
        let ids = players.iter().map(|p| p.id.clone()).collect();
        self.players.lock().expect("players mutex poisoned").push(ids);
    }

    fn replicate_spell(&self, event: &SpellEvent) {
        self.spells
            .lock()
            .expect("spells mutex poisoned")
            .push(event.clone());
    }
}
