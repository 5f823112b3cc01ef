// Domain layer: arena rules with no I/O.

pub mod effects;
pub mod events;
pub mod geometry;
pub mod player;
pub mod ports;
pub mod projectile;
pub mod spells;
pub mod tuning;

pub use events::{CastRecord, PlayerReplica, SpellEvent};
pub use geometry::{Vec2, Vec3};
pub use player::PlayerState;
pub use projectile::{Projectile, ProjectilePool, ProjectileSpawn};
pub use spells::{SpellBook, SpellDefinition, SpellEffect};
