// Spell roster. Definitions are immutable and loaded once per arena.

/// What a spell does once its mana and cooldown gates pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpellEffect {
    /// Damages the single closest other player within `hit_radius` of the target.
    /// Also launches a visual projectile from the caster toward the target.
    DirectDamage { hit_radius: f32 },
    /// Slows every other player within `radius` of the target.
    AreaSlow {
        radius: f32,
        potency: f32,
        duration_secs: f32,
    },
    /// Instant damage plus stun on the closest other player within `hit_radius`.
    Strike { hit_radius: f32, stun_secs: f32 },
    /// Grants the caster bonus hit points for a while.
    SelfShield { bonus_hp: i32, duration_secs: f32 },
    /// Pushes every other player within `radius` away from the target point.
    AreaKnockback { radius: f32, force: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpellDefinition {
    /// Display name; also the voice keyword (matched case-insensitively).
    pub name: String,
    pub mana_cost: i32,
    pub cooldown_secs: f32,
    pub base_damage: i32,
    pub effect: SpellEffect,
}

impl SpellDefinition {
    pub fn cooldown_millis(&self) -> u64 {
        (self.cooldown_secs.max(0.0) * 1000.0) as u64
    }

    pub fn launches_projectile(&self) -> bool {
        matches!(self.effect, SpellEffect::DirectDamage { .. })
    }
}

/// Lookup table for the spells an arena accepts.
#[derive(Debug, Clone)]
pub struct SpellBook {
    spells: Vec<SpellDefinition>,
}

impl SpellBook {
    pub fn new(spells: Vec<SpellDefinition>) -> Self {
        Self { spells }
    }

    /// The five base spells: fire, ice, lightning, stone and wind.
    pub fn standard() -> Self {
        Self::new(vec![
            SpellDefinition {
                name: "Fireball".to_string(),
                mana_cost: 20,
                cooldown_secs: 2.0,
                base_damage: 30,
                effect: SpellEffect::DirectDamage { hit_radius: 1.0 },
            },
            SpellDefinition {
                name: "Freeze".to_string(),
                mana_cost: 25,
                cooldown_secs: 5.0,
                base_damage: 0,
                effect: SpellEffect::AreaSlow {
                    radius: 3.0,
                    potency: 0.5,
                    duration_secs: 3.0,
                },
            },
            SpellDefinition {
                name: "Lightning".to_string(),
                mana_cost: 30,
                cooldown_secs: 3.0,
                base_damage: 25,
                effect: SpellEffect::Strike {
                    hit_radius: 1.5,
                    stun_secs: 1.0,
                },
            },
            SpellDefinition {
                name: "Stone".to_string(),
                mana_cost: 15,
                cooldown_secs: 10.0,
                base_damage: 0,
                effect: SpellEffect::SelfShield {
                    bonus_hp: 50,
                    duration_secs: 8.0,
                },
            },
            SpellDefinition {
                name: "Gust".to_string(),
                mana_cost: 10,
                cooldown_secs: 4.0,
                base_damage: 0,
                effect: SpellEffect::AreaKnockback {
                    radius: 2.5,
                    force: 5.0,
                },
            },
        ])
    }

    pub fn find(&self, name: &str) -> Option<&SpellDefinition> {
        let name = name.trim();
        self.spells
            .iter()
            .find(|spell| spell.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpellDefinition> {
        self.spells.iter()
    }

    pub fn len(&self) -> usize {
        self.spells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }
}

impl Default for SpellBook {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_loading_standard_roster_then_one_spell_per_effect_kind() {
        let book = SpellBook::standard();

        assert_eq!(book.len(), 5);
        let count = |pred: fn(&SpellEffect) -> bool| book.iter().filter(|s| pred(&s.effect)).count();
        assert_eq!(count(|e| matches!(e, SpellEffect::DirectDamage { .. })), 1);
        assert_eq!(count(|e| matches!(e, SpellEffect::AreaSlow { .. })), 1);
        assert_eq!(count(|e| matches!(e, SpellEffect::Strike { .. })), 1);
        assert_eq!(count(|e| matches!(e, SpellEffect::SelfShield { .. })), 1);
        assert_eq!(count(|e| matches!(e, SpellEffect::AreaKnockback { .. })), 1);
    }

    #[test]
    fn when_keyword_differs_in_case_then_find_still_matches() {
        let book = SpellBook::standard();

        let spell = book.find("  FIREBALL ").expect("fireball should resolve");

        assert_eq!(spell.name, "Fireball");
        assert_eq!(spell.cooldown_millis(), 2_000);
        assert!(book.find("meteor").is_none());
    }
}
