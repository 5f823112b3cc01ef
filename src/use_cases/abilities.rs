// Ability resolution: gates a cast on caster state, mana and cooldown, then applies its effect.

use crate::domain::effects::{EffectReport, resolve_effect};
use crate::domain::tuning::PlayerTuning;
use crate::domain::{SpellBook, SpellDefinition, Vec3};
use crate::use_cases::cooldowns::CooldownTable;
use crate::use_cases::store::StateStore;
use crate::use_cases::types::CastRejection;

/// Everything the caller needs to finish a resolved cast (events, projectiles).
#[derive(Debug, Clone)]
pub struct CastResolution {
    pub spell: SpellDefinition,
    pub caster_position: Vec3,
    pub caster_facing: Vec3,
    pub target: Vec3,
    pub mana_after: i32,
    pub report: EffectReport,
}

#[derive(Debug)]
pub struct AbilityEngine {
    book: SpellBook,
    cooldowns: CooldownTable,
    tuning: PlayerTuning,
}

impl AbilityEngine {
    pub fn new(book: SpellBook, tuning: PlayerTuning) -> Self {
        Self {
            book,
            cooldowns: CooldownTable::new(),
            tuning,
        }
    }

    pub fn spell_book(&self) -> &SpellBook {
        &self.book
    }

    pub fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// Runs the cast state machine against `store`.
    ///
    /// Checks run in order: spell lookup, caster presence, caster condition, mana, cooldown.
    /// A rejection leaves every player and the cooldown table untouched. On success the
    /// mana deduction, effect application and cooldown arming happen while the store's
    /// player table is locked, so concurrent casts observe them all or none.
    pub fn resolve(
        &self,
        store: &StateStore,
        caster_id: &str,
        spell_name: &str,
        target: Option<Vec3>,
        now: u64,
    ) -> Result<CastResolution, CastRejection> {
        let spell = self
            .book
            .find(spell_name)
            .ok_or_else(|| CastRejection::UnknownSpell(spell_name.trim().to_string()))?;

        store.try_with_players_mut(|players| {
            let caster = players
                .get_mut(caster_id)
                .ok_or_else(|| CastRejection::UnknownCaster(caster_id.to_string()))?;

            if caster.defeated {
                return Err(CastRejection::CasterDefeated(caster_id.to_string()));
            }
            if caster.is_stunned(now) {
                return Err(CastRejection::CasterStunned(caster_id.to_string()));
            }
            if caster.mana < spell.mana_cost {
                return Err(CastRejection::InsufficientMana {
                    required: spell.mana_cost,
                    available: caster.mana,
                });
            }
            if let Some(remaining_millis) =
                self.cooldowns
                    .remaining(caster_id, &spell.name, spell.cooldown_millis(), now)
            {
                return Err(CastRejection::OnCooldown { remaining_millis });
            }

            let caster_position = caster.position;
            let caster_facing = caster.facing_direction();
            let target = target
                .filter(|t| t.is_finite())
                .unwrap_or_else(|| caster_position + caster_facing * self.tuning.cast_range);

            // Affordability was checked above, so this always succeeds.
            caster.spend_mana(spell.mana_cost);
            let mana_after = caster.mana;

            let report = resolve_effect(
                spell,
                caster_id,
                target,
                players,
                now,
                self.tuning.half_map(),
            );
            self.cooldowns.record(caster_id, &spell.name, now);

            let mut written = Vec::with_capacity(report.affected.len() + 1);
            written.push(caster_id.to_string());
            written.extend(report.affected.iter().cloned());

            let resolution = CastResolution {
                spell: spell.clone(),
                caster_position,
                caster_facing,
                target,
                mana_after,
                report,
            };
            Ok((resolution, written))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlayerState;

    fn setup(players: &[(&str, Vec3)]) -> (AbilityEngine, StateStore) {
        let tuning = PlayerTuning::default();
        let store = StateStore::default();
        for (id, position) in players {
            store.upsert_player(PlayerState::new(*id, *position, &tuning));
        }
        (AbilityEngine::new(SpellBook::standard(), tuning), store)
    }

    #[test]
    fn when_fireball_hits_then_mana_is_spent_target_damaged_and_cooldown_armed() {
        let (engine, store) = setup(&[
            ("caster", Vec3::ZERO),
            ("target", Vec3::new(5.0, 0.0, 0.0)),
        ]);
        let aim = Some(Vec3::new(5.5, 0.0, 0.0));

        let resolution = engine
            .resolve(&store, "caster", "Fireball", aim, 10_000)
            .expect("first cast succeeds");

        assert_eq!(resolution.mana_after, 80);
        assert_eq!(store.get_player("target").map(|p| p.hp), Some(70));
        assert_eq!(
            engine
                .resolve(&store, "caster", "Fireball", aim, 11_999)
                .map(|r| r.mana_after),
            Err(CastRejection::OnCooldown { remaining_millis: 1 })
        );
        assert!(engine.resolve(&store, "caster", "Fireball", aim, 12_000).is_ok());
    }

    #[test]
    fn when_mana_is_insufficient_then_nothing_changes() {
        let (engine, store) = setup(&[
            ("caster", Vec3::ZERO),
            ("target", Vec3::new(1.0, 0.0, 0.0)),
        ]);
        store.update_player("caster", |p| p.mana = 10);
        let before = store.get_all_players();

        let result = engine.resolve(&store, "caster", "fireball", Some(Vec3::new(1.0, 0.0, 0.0)), 0);

        assert_eq!(
            result.map(|r| r.mana_after),
            Err(CastRejection::InsufficientMana {
                required: 20,
                available: 10
            })
        );
        assert_eq!(store.get_all_players(), before);
        assert!(engine.cooldowns().last_cast("caster", "Fireball").is_none());
    }

    #[test]
    fn when_mana_and_cooldown_both_fail_then_mana_is_reported_first() {
        let (engine, store) = setup(&[("caster", Vec3::ZERO)]);
        engine
            .resolve(&store, "caster", "Lightning", None, 0)
            .expect("first cast succeeds");
        store.update_player("caster", |p| p.mana = 5);

        let result = engine.resolve(&store, "caster", "Lightning", None, 100);

        assert!(matches!(result, Err(CastRejection::InsufficientMana { .. })));
    }

    #[test]
    fn when_spell_is_unknown_then_cast_is_rejected() {
        let (engine, store) = setup(&[("caster", Vec3::ZERO)]);

        let result = engine.resolve(&store, "caster", "Meteor", None, 0);

        assert_eq!(
            result.map(|r| r.mana_after),
            Err(CastRejection::UnknownSpell("Meteor".to_string()))
        );
    }

    #[test]
    fn when_caster_is_stunned_then_cast_is_rejected() {
        let (engine, store) = setup(&[("caster", Vec3::ZERO)]);
        store.update_player("caster", |p| p.apply_stun(500));

        let result = engine.resolve(&store, "caster", "Stone", None, 100);

        assert_eq!(
            result.map(|r| r.mana_after),
            Err(CastRejection::CasterStunned("caster".to_string()))
        );
        assert_eq!(store.get_player("caster").map(|p| p.mana), Some(100));
    }

    #[test]
    fn when_no_target_is_given_then_cast_aims_ahead_of_caster() {
        let (engine, store) = setup(&[("caster", Vec3::ZERO)]);
        store.update_player("caster", |p| p.steer(crate::domain::Vec2::new(0.0, 1.0)));

        let resolution = engine
            .resolve(&store, "caster", "Gust", None, 0)
            .expect("cast succeeds");

        assert!(resolution.target.x.abs() < 1e-5);
        assert!((resolution.target.y - 3.0).abs() < 1e-5);
    }

    #[test]
    fn when_casts_race_on_one_caster_then_mana_never_goes_negative() {
        let (engine, store) = setup(&[("caster", Vec3::ZERO)]);
        let spells = ["Fireball", "Freeze", "Lightning", "Stone", "Gust"];

        std::thread::scope(|scope| {
            for spell in spells {
                let engine = &engine;
                let store = &store;
                scope.spawn(move || {
                    let _ = engine.resolve(store, "caster", spell, None, 0);
                });
            }
        });

        let mana = store.get_player("caster").map(|p| p.mana).unwrap_or(-1);
        assert!((0..=100).contains(&mana));
    }
}
