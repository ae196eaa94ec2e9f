//! Declarative, versioned rule set for banned-pattern and threshold
//! policy.
//!
//! Rules are data, not code: each entry carries a text pattern, a
//! weight, the stages it applies in, and the violation class it raises.
//! Operators can load a replacement table from JSON without touching
//! the validator.

use crate::progression::Stage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from loading a rule set.
#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule set version {found} is newer than supported {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Newest rule set format this build understands.
pub const RULESET_VERSION: u32 = 1;

/// Which violation class a matched pattern raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleClass {
    /// The pattern breaks pacing bounds for the stage.
    Pacing,
    /// The pattern contradicts established story facts.
    Continuity,
}

/// One banned pattern with its policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingRule {
    /// Phrase matched at word boundaries, case-insensitive.
    pub pattern: String,
    /// Severity weight contributed when matched.
    pub weight: f32,
    /// Stages in which the pattern is prohibited.
    pub stages: Vec<Stage>,
    /// Violation class raised on match.
    pub class: RuleClass,
    /// Operator-facing explanation.
    pub message: String,
}

impl PacingRule {
    fn new(
        pattern: &str,
        weight: f32,
        stages: &[Stage],
        class: RuleClass,
        message: &str,
    ) -> Self {
        Self {
            pattern: pattern.to_string(),
            weight,
            stages: stages.to_vec(),
            class,
            message: message.to_string(),
        }
    }

    /// Whether this rule is in force during the given stage.
    pub fn applies_in(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

/// A versioned collection of rules plus the validator's thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Format version, checked on load.
    pub version: u32,
    /// Any single violation at or above this weight fails validation.
    pub hard_threshold: f32,
    /// Total violation weight above this fails validation.
    pub soft_threshold: f32,
    /// The banned-pattern table.
    pub rules: Vec<PacingRule>,
}

impl RuleSet {
    /// The built-in default table.
    pub fn builtin() -> Self {
        BUILTIN_RULESET.clone()
    }

    /// Parse a rule set from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, RuleSetError> {
        let set: Self = serde_json::from_str(json)?;
        if set.version > RULESET_VERSION {
            return Err(RuleSetError::UnsupportedVersion {
                found: set.version,
                supported: RULESET_VERSION,
            });
        }
        Ok(set)
    }

    /// Load a rule set from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    /// Rules in force during the given stage.
    pub fn applicable(&self, stage: Stage) -> impl Iterator<Item = &PacingRule> {
        self.rules.iter().filter(move |r| r.applies_in(stage))
    }

    /// Patterns prohibited in the given stage, sorted and deduplicated
    /// for deterministic prompt output.
    pub fn prohibited_patterns(&self, stage: Stage) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .applicable(stage)
            .map(|r| r.pattern.to_lowercase())
            .collect();
        patterns.sort();
        patterns.dedup();
        patterns
    }
}

lazy_static::lazy_static! {
    static ref BUILTIN_RULESET: RuleSet = RuleSet {
        version: RULESET_VERSION,
        hard_threshold: 1.0,
        soft_threshold: 1.5,
        rules: vec![
            // Relationship endpoints reserved for later stages.
            PacingRule::new(
                "marriage",
                1.5,
                &[Stage::Introduction],
                RuleClass::Pacing,
                "marriage cannot occur before the rising stage",
            ),
            PacingRule::new(
                "wedding",
                1.5,
                &[Stage::Introduction],
                RuleClass::Pacing,
                "a wedding cannot occur before the rising stage",
            ),
            PacingRule::new(
                "i love you too",
                1.2,
                &[Stage::Introduction],
                RuleClass::Pacing,
                "declared mutual love is premature before the rising stage",
            ),
            PacingRule::new(
                "engaged to be married",
                1.5,
                &[Stage::Introduction],
                RuleClass::Pacing,
                "an engagement cannot occur before the rising stage",
            ),
            // Large time skips break serialized continuity early on.
            PacingRule::new(
                "years later",
                1.2,
                &[Stage::Introduction, Stage::Rising],
                RuleClass::Continuity,
                "multi-year time skips are prohibited before the climax",
            ),
            PacingRule::new(
                "years passed",
                1.2,
                &[Stage::Introduction, Stage::Rising],
                RuleClass::Continuity,
                "multi-year time skips are prohibited before the climax",
            ),
            PacingRule::new(
                "a decade later",
                1.2,
                &[Stage::Introduction, Stage::Rising],
                RuleClass::Continuity,
                "multi-year time skips are prohibited before the climax",
            ),
            // Endings cannot leak into the body of the novel.
            PacingRule::new(
                "happily ever after",
                1.0,
                &[Stage::Introduction, Stage::Rising, Stage::Climax],
                RuleClass::Pacing,
                "closing formula reserved for the resolution",
            ),
            PacingRule::new(
                "the end",
                0.6,
                &[Stage::Introduction, Stage::Rising],
                RuleClass::Pacing,
                "ending marker too early in the novel",
            ),
        ],
    };
}
