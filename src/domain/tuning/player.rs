/// Gameplay tuning for arena players.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Hit points a fresh or respawned player starts with.
    pub max_hp: i32,

    /// Mana a fresh or respawned player starts with.
    pub max_mana: i32,

    /// Ground-plane movement speed in units per second.
    pub speed: f32,

    /// Passive hit point regeneration per second.
    pub hp_regen: f32,

    /// Passive mana regeneration per second.
    pub mana_regen: f32,

    /// Seconds a defeated player waits before respawning.
    pub respawn_seconds: f32,

    /// Edge length of the square arena; positions are clamped to half of it.
    pub map_size: f32,

    /// Distance in front of the caster used when a cast carries no target.
    pub cast_range: f32,
}

impl PlayerTuning {
    pub fn half_map(&self) -> f32 {
        self.map_size / 2.0
    }
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_hp: 100,
            max_mana: 100,
            speed: 5.0,
            hp_regen: 5.0,
            mana_regen: 10.0,
            respawn_seconds: 10.0,
            map_size: 50.0,
            cast_range: 3.0,
        }
    }
}
