// Projectile slots and the reusable pool that owns them.

use crate::domain::geometry::Vec3;

/// One pool slot. Contents outlive deactivation until the next spawn reuses the slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projectile {
    pub slot_index: usize,
    /// Unique per spawn, so clients can tell a reused slot from the previous occupant.
    pub serial: u64,
    /// Spell that launched the projectile.
    pub kind: String,
    pub owner_id: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub damage: i32,
    pub age_millis: u64,
    pub ttl_millis: u64,
    pub active: bool,
}

impl Projectile {
    fn empty(slot_index: usize) -> Self {
        Self {
            slot_index,
            ..Self::default()
        }
    }

    /// Explicit Euler step; deactivates once age reaches ttl.
    fn advance(&mut self, dt_millis: u64) {
        if !self.active {
            return;
        }
        let dt = dt_millis as f32 / 1000.0;
        self.position = self.position + self.velocity * dt;
        self.age_millis = self.age_millis.saturating_add(dt_millis);
        if self.age_millis >= self.ttl_millis {
            self.active = false;
        }
    }
}

/// Launch parameters for [`ProjectilePool::spawn`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpawn<'a> {
    pub kind: &'a str,
    pub owner_id: &'a str,
    pub position: Vec3,
    pub velocity: Vec3,
    pub damage: i32,
    pub ttl_millis: u64,
}

/// Fixed-identity projectile slots. Grows on demand and never shrinks.
#[derive(Debug, Clone)]
pub struct ProjectilePool {
    slots: Vec<Projectile>,
    next_serial: u64,
}

impl ProjectilePool {
    pub fn new(initial_slots: usize) -> Self {
        Self {
            slots: (0..initial_slots).map(Projectile::empty).collect(),
            next_serial: 1,
        }
    }

    /// Index of the first inactive slot, appending a new one if all are busy.
    pub fn obtain(&mut self) -> usize {
        if let Some(index) = self.slots.iter().position(|slot| !slot.active) {
            return index;
        }
        let index = self.slots.len();
        self.slots.push(Projectile::empty(index));
        index
    }

    /// Activates a slot with fresh launch parameters and returns its index.
    pub fn spawn(&mut self, spawn: ProjectileSpawn<'_>) -> usize {
        let index = self.obtain();
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);

        let slot = &mut self.slots[index];
        slot.serial = serial;
        // Reuse the slot's string buffers.
        slot.kind.clear();
        slot.kind.push_str(spawn.kind);
        slot.owner_id.clear();
        slot.owner_id.push_str(spawn.owner_id);
        slot.position = spawn.position;
        slot.velocity = spawn.velocity;
        slot.damage = spawn.damage;
        slot.age_millis = 0;
        slot.ttl_millis = spawn.ttl_millis;
        slot.active = true;
        index
    }

    pub fn advance(&mut self, dt_millis: u64) {
        for slot in &mut self.slots {
            slot.advance(dt_millis);
        }
    }

    /// Copies of the active slots only.
    pub fn active_snapshot(&self) -> Vec<Projectile> {
        self.slots.iter().filter(|slot| slot.active).cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    pub fn slot(&self, index: usize) -> Option<&Projectile> {
        self.slots.get(index)
    }

    /// Total slots, active or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
