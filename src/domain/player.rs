// Player entity: vitals, status effects, and per-tick upkeep.

use crate::domain::events::PlayerReplica;
use crate::domain::geometry::{Vec2, Vec3};
use crate::domain::tuning::PlayerTuning;

/// Timed status effects. Expiry times are clock milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusEffects {
    /// Bonus hit points consumed before base hp.
    pub shield_hp: i32,
    pub shield_until: u64,
    /// Fraction of movement speed removed while slowed (0.0..=1.0).
    pub slow_potency: f32,
    pub slow_until: u64,
    pub stunned_until: u64,
}

/// Result of a single damage application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageOutcome {
    /// Damage soaked by the shield.
    pub absorbed: i32,
    /// Damage subtracted from base hp.
    pub dealt: i32,
    /// True when this hit took the player to zero hp.
    pub defeated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: String,
    pub position: Vec3,
    /// Last movement input, length <= 1.
    pub steering: Vec2,
    /// Facing angle in radians on the ground plane.
    pub facing: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    /// Set when hp reaches zero; cleared by respawn.
    pub defeated: bool,
    pub effects: StatusEffects,
    respawn_at: Option<u64>,
    hp_carry: f32,
    mana_carry: f32,
}

impl PlayerState {
    pub fn new(id: impl Into<String>, position: Vec3, tuning: &PlayerTuning) -> Self {
        Self {
            id: id.into(),
            position,
            steering: Vec2::ZERO,
            facing: 0.0,
            hp: tuning.max_hp,
            max_hp: tuning.max_hp,
            mana: tuning.max_mana,
            max_mana: tuning.max_mana,
            defeated: false,
            effects: StatusEffects::default(),
            respawn_at: None,
            hp_carry: 0.0,
            mana_carry: 0.0,
        }
    }

    /// Builds a player from a remote peer's replica.
    pub fn from_replica(replica: &PlayerReplica, tuning: &PlayerTuning) -> Self {
        let mut player = Self::new(replica.id.clone(), replica.position, tuning);
        player.apply_replica(replica);
        player
    }

    /// Overwrites the replicated fields (last writer wins). Local effects are kept.
    pub fn apply_replica(&mut self, replica: &PlayerReplica) {
        if replica.position.is_finite() {
            self.position = replica.position;
        }
        self.hp = replica.hp.clamp(0, self.max_hp);
        self.mana = replica.mana.clamp(0, self.max_mana);
        self.defeated = self.hp == 0;
        if !self.defeated {
            self.respawn_at = None;
        }
    }

    pub fn to_replica(&self) -> PlayerReplica {
        PlayerReplica {
            id: self.id.clone(),
            position: self.position,
            hp: self.hp,
            mana: self.mana,
        }
    }

    /// Applies damage to the shield first, then to base hp.
    pub fn take_damage(&mut self, amount: i32) -> DamageOutcome {
        if self.defeated || amount <= 0 {
            return DamageOutcome::default();
        }

        let absorbed = self.effects.shield_hp.min(amount);
        self.effects.shield_hp -= absorbed;
        let dealt = (amount - absorbed).min(self.hp);
        self.hp -= dealt;

        let defeated = self.hp == 0;
        if defeated {
            self.defeated = true;
            self.steering = Vec2::ZERO;
        }

        DamageOutcome {
            absorbed,
            dealt,
            defeated,
        }
    }

    /// Deducts mana if the player can afford it. Leaves mana untouched otherwise.
    pub fn spend_mana(&mut self, cost: i32) -> bool {
        if cost < 0 || self.mana < cost {
            return false;
        }
        self.mana -= cost;
        true
    }

    pub fn apply_shield(&mut self, amount: i32, until: u64) {
        self.effects.shield_hp = amount.max(0);
        self.effects.shield_until = until;
    }

    pub fn apply_slow(&mut self, potency: f32, until: u64) {
        self.effects.slow_potency = potency.clamp(0.0, 1.0);
        self.effects.slow_until = until;
    }

    pub fn apply_stun(&mut self, until: u64) {
        self.effects.stunned_until = self.effects.stunned_until.max(until);
    }

    /// Pushes the player along the ground plane, staying inside the map.
    pub fn apply_knockback(&mut self, push: Vec2, half_map: f32) {
        self.position.x = (self.position.x + push.x).clamp(-half_map, half_map);
        self.position.y = (self.position.y + push.y).clamp(-half_map, half_map);
    }

    pub fn is_stunned(&self, now: u64) -> bool {
        now < self.effects.stunned_until
    }

    pub fn speed_multiplier(&self, now: u64) -> f32 {
        if self.effects.slow_potency > 0.0 && now < self.effects.slow_until {
            1.0 - self.effects.slow_potency
        } else {
            1.0
        }
    }

    /// Stores a movement input. Non-finite input is rejected.
    pub fn steer(&mut self, direction: Vec2) -> bool {
        if !direction.is_finite() {
            return false;
        }
        self.steering = direction.clamp_unit();
        if self.steering.length() > f32::EPSILON {
            self.facing = self.steering.y.atan2(self.steering.x);
        }
        true
    }

    /// Unit vector the player is facing, on the ground plane.
    pub fn facing_direction(&self) -> Vec3 {
        Vec3::new(self.facing.cos(), self.facing.sin(), 0.0)
    }

    pub fn respawn(&mut self, spawn: Vec3) {
        self.hp = self.max_hp;
        self.mana = self.max_mana;
        self.defeated = false;
        self.position = spawn;
        self.steering = Vec2::ZERO;
        self.facing = 0.0;
        self.effects = StatusEffects::default();
        self.respawn_at = None;
        self.hp_carry = 0.0;
        self.mana_carry = 0.0;
    }

    /// Per-tick upkeep: respawn timer, regeneration, effect expiry, movement.
    pub fn tick(&mut self, dt: f32, now: u64, tuning: &PlayerTuning) {
        if self.defeated {
            let delay = (tuning.respawn_seconds * 1000.0) as u64;
            let respawn_at = *self.respawn_at.get_or_insert(now + delay);
            if now >= respawn_at {
                self.respawn(Vec3::ZERO);
            }
            return;
        }

        regenerate(&mut self.hp, self.max_hp, &mut self.hp_carry, tuning.hp_regen, dt);
        regenerate(
            &mut self.mana,
            self.max_mana,
            &mut self.mana_carry,
            tuning.mana_regen,
            dt,
        );

        self.expire_effects(now);

        if self.is_stunned(now) || self.steering.length() <= f32::EPSILON {
            return;
        }

        let speed = tuning.speed * self.speed_multiplier(now);
        let half_map = tuning.half_map();
        self.position.x = (self.position.x + self.steering.x * speed * dt).clamp(-half_map, half_map);
        self.position.y = (self.position.y + self.steering.y * speed * dt).clamp(-half_map, half_map);
    }

    fn expire_effects(&mut self, now: u64) {
        let effects = &mut self.effects;
        if effects.shield_hp > 0 && now >= effects.shield_until {
            effects.shield_hp = 0;
            effects.shield_until = 0;
        }
        if effects.slow_potency > 0.0 && now >= effects.slow_until {
            effects.slow_potency = 0.0;
            effects.slow_until = 0;
        }
        if effects.stunned_until != 0 && now >= effects.stunned_until {
            effects.stunned_until = 0;
        }
    }
}

// Whole points are applied as they accumulate so short ticks still regenerate.
fn regenerate(current: &mut i32, max: i32, carry: &mut f32, rate: f32, dt: f32) {
    if *current >= max {
        *carry = 0.0;
        return;
    }

    *carry += rate * dt;
    let whole = carry.floor();
    if whole >= 1.0 {
        *current = (*current + whole as i32).min(max);
        *carry -= whole;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> PlayerState {
        PlayerState::new("p1", Vec3::ZERO, &PlayerTuning::default())
    }

    #[test]
    fn when_shielded_then_damage_hits_shield_first() {
        let mut p = player();
        p.apply_shield(50, 8_000);

        let outcome = p.take_damage(30);

        assert_eq!(outcome.absorbed, 30);
        assert_eq!(outcome.dealt, 0);
        assert_eq!(p.effects.shield_hp, 20);
        assert_eq!(p.hp, 100);

        let outcome = p.take_damage(30);

        assert_eq!(outcome.absorbed, 20);
        assert_eq!(outcome.dealt, 10);
        assert_eq!(p.hp, 90);
    }

    #[test]
    fn when_damage_exceeds_hp_then_hp_clamps_at_zero_and_player_is_defeated() {
        let mut p = player();
        p.hp = 10;

        let outcome = p.take_damage(15);

        assert_eq!(p.hp, 0);
        assert!(p.defeated);
        assert!(outcome.defeated);
        assert_eq!(outcome.dealt, 10);
    }

    #[test]
    fn when_defeated_then_further_damage_is_ignored() {
        let mut p = player();
        p.take_damage(500);

        assert_eq!(p.take_damage(10), DamageOutcome::default());
        assert_eq!(p.hp, 0);
    }

    #[test]
    fn when_mana_is_insufficient_then_spend_mana_leaves_it_unchanged() {
        let mut p = player();
        p.mana = 10;

        assert!(!p.spend_mana(20));
        assert_eq!(p.mana, 10);
        assert!(p.spend_mana(10));
        assert_eq!(p.mana, 0);
    }

    #[test]
    fn when_ticking_in_short_steps_then_regeneration_still_accumulates() {
        let tuning = PlayerTuning::default();
        let mut p = player();
        p.hp = 50;
        p.mana = 50;

        // 32 ticks of 62.5 ms = 2 s; each tick alone is worth less than one point of hp.
        for i in 0..32u64 {
            p.tick(0.0625, i * 62, &tuning);
        }

        assert_eq!(p.hp, 60);
        assert_eq!(p.mana, 70);
    }

    #[test]
    fn when_regenerating_then_values_never_exceed_max() {
        let tuning = PlayerTuning::default();
        let mut p = player();
        p.hp = 99;
        p.mana = 99;

        p.tick(10.0, 0, &tuning);

        assert_eq!(p.hp, p.max_hp);
        assert_eq!(p.mana, p.max_mana);
    }

    #[test]
    fn when_effects_expire_then_tick_sweep_clears_them() {
        let tuning = PlayerTuning::default();
        let mut p = player();
        p.apply_shield(50, 1_000);
        p.apply_slow(0.5, 1_000);
        p.apply_stun(1_000);

        p.tick(0.016, 999, &tuning);
        assert_eq!(p.effects.shield_hp, 50);
        assert!(p.is_stunned(999));

        p.tick(0.016, 1_000, &tuning);
        assert_eq!(p.effects, StatusEffects::default());
    }

    #[test]
    fn when_slowed_then_movement_is_scaled() {
        let tuning = PlayerTuning::default();
        let mut p = player();
        p.steer(Vec2::new(1.0, 0.0));
        p.apply_slow(0.5, 10_000);

        p.tick(1.0, 0, &tuning);

        assert!((p.position.x - 2.5).abs() < 1e-5);
    }

    #[test]
    fn when_stunned_then_player_does_not_move() {
        let tuning = PlayerTuning::default();
        let mut p = player();
        p.steer(Vec2::new(0.0, 1.0));
        p.apply_stun(1_000);

        p.tick(0.5, 500, &tuning);

        assert_eq!(p.position, Vec3::ZERO);
    }

    #[test]
    fn when_moving_past_the_edge_then_position_is_clamped() {
        let tuning = PlayerTuning::default();
        let mut p = player();
        p.steer(Vec2::new(1.0, 0.0));

        p.tick(100.0, 0, &tuning);

        assert_eq!(p.position.x, tuning.half_map());
    }

    #[test]
    fn when_steering_is_not_finite_then_input_is_rejected() {
        let mut p = player();

        assert!(!p.steer(Vec2::new(f32::NAN, 0.0)));
        assert_eq!(p.steering, Vec2::ZERO);
    }

    #[test]
    fn when_respawn_delay_elapses_then_defeated_player_comes_back() {
        let tuning = PlayerTuning::default();
        let mut p = player();
        p.position = Vec3::new(4.0, 4.0, 0.0);
        p.mana = 3;
        p.take_damage(1_000);

        p.tick(0.016, 1_000, &tuning);
        assert!(p.defeated);

        p.tick(0.016, 10_999, &tuning);
        assert!(p.defeated);

        p.tick(0.016, 11_000, &tuning);
        assert!(!p.defeated);
        assert_eq!(p.hp, p.max_hp);
        assert_eq!(p.mana, p.max_mana);
        assert_eq!(p.position, Vec3::ZERO);
    }

    #[test]
    fn when_knocked_back_then_position_stays_inside_map() {
        let mut p = player();
        p.position = Vec3::new(24.0, 0.0, 1.0);

        p.apply_knockback(Vec2::new(5.0, -2.0), 25.0);

        assert_eq!(p.position, Vec3::new(25.0, -2.0, 1.0));
    }

    #[test]
    fn when_replica_is_out_of_range_then_vitals_are_clamped() {
        let tuning = PlayerTuning::default();
        let replica = PlayerReplica {
            id: "remote".to_string(),
            position: Vec3::new(1.0, 2.0, 3.0),
            hp: 250,
            mana: -5,
        };

        let p = PlayerState::from_replica(&replica, &tuning);

        assert_eq!(p.hp, 100);
        assert_eq!(p.mana, 0);
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
