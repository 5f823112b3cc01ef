// Use-case level inputs/outputs for the arena loop.

use crate::domain::{SpellEvent, Vec2, Vec3};

/// Player input queued for a room's world task.
#[derive(Debug, Clone)]
pub enum GameEvent {
    Move {
        player_id: String,
        direction: Vec2,
    },
    Cast {
        player_id: String,
        spell_name: String,
        target: Option<Vec3>,
    },
}

/// Outcome of a successful cast.
#[derive(Debug, Clone, PartialEq)]
pub struct CastReport {
    pub event: SpellEvent,
    pub mana_after: i32,
    pub affected: Vec<String>,
    pub defeated: Vec<String>,
    /// Pool slot of the launched projectile, for spells that launch one.
    pub projectile_slot: Option<usize>,
}

/// Why a cast request was turned into a no-op.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CastRejection {
    #[error("unknown spell `{0}`")]
    UnknownSpell(String),
    #[error("caster `{0}` is not in the arena")]
    UnknownCaster(String),
    #[error("caster `{0}` is defeated")]
    CasterDefeated(String),
    #[error("caster `{0}` is stunned")]
    CasterStunned(String),
    #[error("not enough mana: need {required}, have {available}")]
    InsufficientMana { required: i32, available: i32 },
    #[error("spell on cooldown for another {remaining_millis} ms")]
    OnCooldown { remaining_millis: u64 },
}

/// Errors returned by room registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room `{0}` not found")]
    NotFound(String),
    /// The player must leave its current room first.
    #[error("player is already in room `{current}`")]
    AlreadyInRoom { current: String },
}
