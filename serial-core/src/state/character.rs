//! Character records tracked per novel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The mutable "where is this character right now" portion of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    /// Current location in the story world.
    pub location: String,
    /// Dominant emotion as of the latest chapter.
    pub emotion: String,
    /// Relative power/competence level (0-100).
    pub power_level: u8,
}

/// A character registered in a novel's story state.
///
/// Registered names (plus aliases) form the allow-list the validator
/// checks chapter text against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// Narrative role, e.g. "protagonist" or "rival".
    pub role: String,
    /// Stable personality traits.
    pub personality_traits: Vec<String>,
    /// Abilities, skills, or powers.
    pub abilities: Vec<String>,
    /// Alternative names and nicknames used in prose.
    pub aliases: Vec<String>,
    /// Relations to other characters, keyed by the other character's name.
    pub relationships: BTreeMap<String, String>,
    /// Current state as of the latest committed chapter.
    pub current: CharacterState,
    /// Running summary of this character's arc.
    pub arc_summary: String,
}

impl CharacterRecord {
    /// Create a record with the given role.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }

    /// Add an alias for this character.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a personality trait.
    pub fn with_trait(mut self, personality_trait: impl Into<String>) -> Self {
        self.personality_traits.push(personality_trait.into());
        self
    }

    /// Add an ability.
    pub fn with_ability(mut self, ability: impl Into<String>) -> Self {
        self.abilities.push(ability.into());
        self
    }

    /// Record a relationship to another character.
    pub fn with_relationship(
        mut self,
        other: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        self.relationships.insert(other.into(), relation.into());
        self
    }

    /// Check if a name matches this character (case-insensitive).
    pub fn matches_name(&self, query: &str, own_name: &str) -> bool {
        let query_lower = query.to_lowercase();
        if own_name.to_lowercase() == query_lower {
            return true;
        }
        self.aliases.iter().any(|a| a.to_lowercase() == query_lower)
    }
}

/// A declared change to a character's current state, carried by a
/// generated chapter and applied by the recorder on commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterUpdate {
    /// Registered character name the update applies to.
    pub name: String,
    /// New location, if changed.
    pub location: Option<String>,
    /// New dominant emotion, if changed.
    pub emotion: Option<String>,
    /// New power level, if changed.
    pub power_level: Option<u8>,
}

impl CharacterUpdate {
    /// Create an empty update for the named character.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Apply this update to a character state.
    pub fn apply(&self, state: &mut CharacterState) {
        if let Some(ref location) = self.location {
            state.location = location.clone();
        }
        if let Some(ref emotion) = self.emotion {
            state.emotion = emotion.clone();
        }
        if let Some(power_level) = self.power_level {
            state.power_level = power_level.min(100);
        }
    }
}
