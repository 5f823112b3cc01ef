// Broadcast-mode datagram format: `<kind>:<json-array>`, UTF-8 text.

use crate::domain::{PlayerReplica, PlayerState, SpellEvent, Vec3};
use crate::interface_adapters::protocol::SpellEventDto;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    State,
    Spell,
}

impl EnvelopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeKind::State => "state",
            EnvelopeKind::Spell => "spell",
        }
    }
}

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    State(Vec<PlayerReplica>),
    Spell(Vec<SpellEvent>),
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::State(_) => EnvelopeKind::State,
            Envelope::Spell(_) => EnvelopeKind::Spell,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope has no `:` separator")]
    MissingSeparator,
    #[error("unknown envelope kind `{0}`")]
    UnknownKind(String),
    #[error("invalid envelope payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlayerReplicaDto {
    id: String,
    x: f32,
    y: f32,
    z: f32,
    hp: i32,
    mana: i32,
}

impl From<&PlayerState> for PlayerReplicaDto {
    fn from(player: &PlayerState) -> Self {
        Self {
            id: player.id.clone(),
            x: player.position.x,
            y: player.position.y,
            z: player.position.z,
            hp: player.hp,
            mana: player.mana,
        }
    }
}

impl From<PlayerReplicaDto> for PlayerReplica {
    fn from(dto: PlayerReplicaDto) -> Self {
        Self {
            id: dto.id,
            position: Vec3::new(dto.x, dto.y, dto.z),
            hp: dto.hp,
            mana: dto.mana,
        }
    }
}

// Older peers send a single object instead of an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

pub fn encode_state(players: &[PlayerState]) -> Result<String, serde_json::Error> {
    let dtos: Vec<PlayerReplicaDto> = players.iter().map(PlayerReplicaDto::from).collect();
    frame(EnvelopeKind::State, &dtos)
}

pub fn encode_spells(events: &[SpellEvent]) -> Result<String, serde_json::Error> {
    let dtos: Vec<SpellEventDto> = events.iter().map(SpellEventDto::from).collect();
    frame(EnvelopeKind::Spell, &dtos)
}

fn frame<T: Serialize>(kind: EnvelopeKind, payload: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(payload)?;
    Ok(format!("{}:{json}", kind.as_str()))
}

/// Splits on the first `:` and decodes the payload for a known kind.
pub fn decode(text: &str) -> Result<Envelope, EnvelopeError> {
    let (kind, payload) = text
        .split_once(':')
        .ok_or(EnvelopeError::MissingSeparator)?;

    match kind.trim() {
        "state" => {
            let dtos: OneOrMany<PlayerReplicaDto> = serde_json::from_str(payload)?;
            Ok(Envelope::State(
                dtos.into_vec().into_iter().map(PlayerReplica::from).collect(),
            ))
        }
        "spell" => {
            let dtos: OneOrMany<SpellEventDto> = serde_json::from_str(payload)?;
            Ok(Envelope::Spell(
                dtos.into_vec().into_iter().map(SpellEvent::from).collect(),
            ))
        }
        other => Err(EnvelopeError::UnknownKind(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tuning::PlayerTuning;

    #[test]
    fn when_state_is_encoded_then_payload_uses_flat_fields() {
        let mut player = PlayerState::new("p1", Vec3::new(1.5, -2.0, 0.0), &PlayerTuning::default());
        player.mana = 40;

        let text = encode_state(&[player]).expect("encodes");

        assert_eq!(
            text,
            r#"state:[{"id":"p1","x":1.5,"y":-2.0,"z":0.0,"hp":100,"mana":40}]"#
        );
    }

    #[test]
    fn when_spell_datagram_arrives_then_it_decodes_with_default_timestamp() {
        let text = r#"spell:[{"casterId":"p2","spellName":"Gust","targetX":1.0,"targetY":2.0,"targetZ":0.0}]"#;

        let envelope = decode(text).expect("decodes");

        assert_eq!(
            envelope,
            Envelope::Spell(vec![SpellEvent {
                caster_id: "p2".to_string(),
                spell_name: "Gust".to_string(),
                target: Vec3::new(1.0, 2.0, 0.0),
                timestamp: 0,
            }])
        );
    }

    #[test]
    fn when_single_object_is_sent_then_it_decodes_as_one_entry() {
        let text = r#"state:{"id":"p3","x":0.0,"y":0.0,"z":1.0,"hp":10,"mana":5}"#;

        let envelope = decode(text).expect("decodes");

        assert!(matches!(envelope, Envelope::State(ref players) if players.len() == 1));
    }

    #[test]
    fn when_payload_contains_colons_then_only_first_one_splits() {
        let text = r#"state:[{"id":"a:b","x":0.0,"y":0.0,"z":0.0,"hp":1,"mana":1}]"#;

        let envelope = decode(text).expect("decodes");

        assert!(matches!(envelope, Envelope::State(ref players) if players[0].id == "a:b"));
    }

    #[test]
    fn when_datagram_is_malformed_then_decode_reports_why() {
        assert!(matches!(decode("hello"), Err(EnvelopeError::MissingSeparator)));
        assert!(matches!(decode("chat:[]"), Err(EnvelopeError::UnknownKind(k)) if k == "chat"));
        assert!(matches!(decode("state:[{"), Err(EnvelopeError::Payload(_))));
    }
}
