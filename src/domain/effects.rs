// Spell effect resolution. One function dispatches every effect kind.

use crate::domain::geometry::{Vec2, Vec3};
use crate::domain::player::PlayerState;
use crate::domain::spells::{SpellDefinition, SpellEffect};
use std::collections::HashMap;

/// Players touched by a resolved effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectReport {
    pub affected: Vec<String>,
    pub defeated: Vec<String>,
}

impl EffectReport {
    fn record(&mut self, player: &PlayerState, defeated: bool) {
        self.affected.push(player.id.clone());
        if defeated {
            self.defeated.push(player.id.clone());
        }
    }
}

/// Applies `spell` cast by `caster_id` at `target`. Gates (mana, cooldown) are the
/// caller's job; this only mutates the players the effect reaches.
pub fn resolve_effect(
    spell: &SpellDefinition,
    caster_id: &str,
    target: Vec3,
    players: &mut HashMap<String, PlayerState>,
    now: u64,
    half_map: f32,
) -> EffectReport {
    let mut report = EffectReport::default();

    match spell.effect {
        SpellEffect::DirectDamage { hit_radius } => {
            if let Some(victim) = closest_other(players, caster_id, target, hit_radius) {
                let outcome = victim.take_damage(spell.base_damage);
                report.record(victim, outcome.defeated);
            }
        }
        SpellEffect::Strike {
            hit_radius,
            stun_secs,
        } => {
            if let Some(victim) = closest_other(players, caster_id, target, hit_radius) {
                let outcome = victim.take_damage(spell.base_damage);
                if !victim.defeated {
                    victim.apply_stun(now + secs_to_millis(stun_secs));
                }
                report.record(victim, outcome.defeated);
            }
        }
        SpellEffect::AreaSlow {
            radius,
            potency,
            duration_secs,
        } => {
            let until = now + secs_to_millis(duration_secs);
            for victim in others_within(players, caster_id, target, radius) {
                let outcome = victim.take_damage(spell.base_damage);
                victim.apply_slow(potency, until);
                report.record(victim, outcome.defeated);
            }
        }
        SpellEffect::AreaKnockback { radius, force } => {
            for victim in others_within(players, caster_id, target, radius) {
                let outcome = victim.take_damage(spell.base_damage);
                let away = Vec2::new(victim.position.x - target.x, victim.position.y - target.y);
                let len = away.length();
                // A player standing exactly on the target point has no direction to be pushed in.
                if len > f32::EPSILON {
                    let push = Vec2::new(away.x / len * force, away.y / len * force);
                    victim.apply_knockback(push, half_map);
                }
                report.record(victim, outcome.defeated);
            }
        }
        SpellEffect::SelfShield {
            bonus_hp,
            duration_secs,
        } => {
            if let Some(caster) = players.get_mut(caster_id) {
                caster.apply_shield(bonus_hp, now + secs_to_millis(duration_secs));
                report.record(caster, false);
            }
        }
    }

    report
}

fn secs_to_millis(secs: f32) -> u64 {
    (secs.max(0.0) * 1000.0) as u64
}

fn closest_other<'a>(
    players: &'a mut HashMap<String, PlayerState>,
    caster_id: &str,
    target: Vec3,
    hit_radius: f32,
) -> Option<&'a mut PlayerState> {
    players
        .values_mut()
        .filter(|p| p.id != caster_id && !p.defeated)
        .map(|p| (p.position.distance(target), p))
        .filter(|(distance, _)| *distance < hit_radius)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, p)| p)
}

fn others_within<'a>(
    players: &'a mut HashMap<String, PlayerState>,
    caster_id: &'a str,
    target: Vec3,
    radius: f32,
) -> impl Iterator<Item = &'a mut PlayerState> {
    players
        .values_mut()
        .filter(move |p| p.id != caster_id && !p.defeated && p.position.distance(target) <= radius)
}
