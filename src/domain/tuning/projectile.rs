/// Gameplay tuning for spell projectiles.

#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    /// Launch speed in units per second.
    pub speed: f32,

    /// Lifetime in milliseconds before the slot is released.
    pub ttl_millis: u64,

    /// Slots preallocated by the pool.
    pub pool_size: usize,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 12.0,
            ttl_millis: 3000,
            pool_size: 32,
        }
    }
}
