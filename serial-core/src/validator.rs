//! Rule-based validation of candidate chapters against story state.
//!
//! This is deliberately a keyword-weighted scorer over a configurable
//! [`RuleSet`], not an NLP model. Four checks run in order: unknown
//! character names, progression pacing, stage-scoped banned patterns,
//! and reuse of consumed plot elements. Violations carry severities
//! whose weighted sum decides validity.

use crate::parser::ParsedChapter;
use crate::progression::{self, Stage};
use crate::rules::{RuleClass, RuleSet};
use crate::state::{Dimension, StoryState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Violation taxonomy: content either contradicts recorded state or
/// moves outside stage pacing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    Continuity,
    Pacing,
}

/// How strongly a single violation counts against the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Weight contributed to the aggregate score.
    pub fn weight(&self) -> f32 {
        match self {
            Severity::Low => 0.25,
            Severity::Moderate => 0.5,
            Severity::High => 1.0,
            Severity::Critical => 1.5,
        }
    }

    /// Map a rule weight onto a severity bucket.
    pub fn from_weight(weight: f32) -> Self {
        if weight < 0.5 {
            Severity::Low
        } else if weight < 1.0 {
            Severity::Moderate
        } else if weight < 1.5 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

/// A single problem found in a candidate chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

/// Outcome of validating one candidate chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the chapter may be committed.
    pub valid: bool,
    /// Everything found, worst first.
    pub violations: Vec<Violation>,
    /// Mean story progression (0.0-1.0) after the latest commit.
    pub overall_progress: f32,
    /// Suggestions the orchestrator can fold into a regeneration prompt.
    pub suggestions: Vec<String>,
}

impl ValidationReport {
    /// Whether any violation of the given kind was recorded.
    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

/// Validates candidate chapters against current state and the rule set.
#[derive(Debug, Clone)]
pub struct ConstraintValidator {
    rules: RuleSet,
}

impl ConstraintValidator {
    /// Create a validator with the built-in rule set.
    pub fn new() -> Self {
        Self {
            rules: RuleSet::builtin(),
        }
    }

    /// Create a validator with a custom rule set.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// The active rule set.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Validate a parsed candidate chapter against the novel state.
    pub fn validate(&self, candidate: &ParsedChapter, state: &StoryState) -> ValidationReport {
        let chapter = state.next_chapter_number();
        let target = state.metadata.target_chapters;
        let stage = progression::stage_of(chapter, target);
        let text_lower = candidate.content.to_lowercase();

        let mut violations = Vec::new();
        let mut suggestions = Vec::new();

        self.check_characters(&candidate.content, state, &mut violations);
        self.check_pacing(candidate, state, stage, &mut violations, &mut suggestions);
        self.check_banned_patterns(&text_lower, stage, &mut violations);
        self.check_repetition(&text_lower, candidate, state, &mut violations);

        violations.sort_by(|a, b| b.severity.cmp(&a.severity));

        let aggregate: f32 = violations.iter().map(|v| v.severity.weight()).sum();
        let hard_hit = violations
            .iter()
            .any(|v| v.severity.weight() >= self.rules.hard_threshold);
        let valid = !hard_hit && aggregate <= self.rules.soft_threshold;

        tracing::debug!(
            chapter,
            stage = stage.name(),
            valid,
            violation_count = violations.len(),
            aggregate,
            "validated candidate chapter"
        );

        ValidationReport {
            valid,
            violations,
            overall_progress: state.progression.overall(),
            suggestions,
        }
    }

    /// Check 1: every character name in the text must be registered.
    fn check_characters(&self, text: &str, state: &StoryState, violations: &mut Vec<Violation>) {
        let registered = state.registered_names();
        // Individual words of multi-word names and aliases are also
        // acceptable ("Stormcaller" from "the Stormcaller").
        let mut allowed_words: BTreeSet<String> = BTreeSet::new();
        for name in &registered {
            for word in name.split_whitespace() {
                allowed_words.insert(word.to_string());
            }
        }

        for name in extract_candidate_names(text) {
            let lower = name.to_lowercase();
            if !registered.contains(&lower) && !allowed_words.contains(&lower) {
                violations.push(Violation::new(
                    ViolationKind::Continuity,
                    Severity::High,
                    format!("unregistered character name '{name}' appears in the chapter"),
                ));
            }
        }
    }

    /// Check 2: every declared progression delta, plus the romance
    /// delta and absolute level, must stay within the stage bounds.
    fn check_pacing(
        &self,
        candidate: &ParsedChapter,
        state: &StoryState,
        stage: Stage,
        violations: &mut Vec<Violation>,
        suggestions: &mut Vec<String>,
    ) {
        let chapter = state.next_chapter_number();
        let target = state.metadata.target_chapters;

        for (&dimension, &delta) in &candidate.deltas {
            let cap = stage.max_delta(dimension);
            if delta > cap {
                violations.push(Violation::new(
                    ViolationKind::Pacing,
                    overage_severity(delta - cap, cap),
                    format!(
                        "{} progression advances by {delta} in one chapter; the {} stage permits at most {cap}",
                        dimension.name(),
                        stage.name()
                    ),
                ));
            }

            let resulting = state.progression.get(dimension).saturating_add(delta).min(100);
            let (_, high) = progression::expected_range(chapter, target, dimension);
            if resulting > high {
                violations.push(Violation::new(
                    ViolationKind::Pacing,
                    Severity::High,
                    format!(
                        "{} progression would reach {resulting}, above the expected high of {high} for chapter {chapter}",
                        dimension.name()
                    ),
                ));
            }
        }

        let Some(level) = candidate.romance_level else {
            return;
        };
        let previous = state.current_romance_level();
        let cap = stage.max_delta(Dimension::Emotional);
        let delta = level.saturating_sub(previous);

        if delta > cap {
            violations.push(Violation::new(
                ViolationKind::Pacing,
                overage_severity(delta - cap, cap),
                format!(
                    "romance progression jumps by {delta} in one chapter; the {} stage permits at most {cap}",
                    stage.name()
                ),
            ));
        }

        let (low, high) = progression::expected_range(chapter, target, Dimension::Emotional);
        if level > high {
            violations.push(Violation::new(
                ViolationKind::Pacing,
                Severity::High,
                format!(
                    "romance progression {level} exceeds the expected high of {high} for chapter {chapter}"
                ),
            ));
        } else if level < low {
            // Too slow is advisory: it never blocks a commit on its own.
            violations.push(Violation::new(
                ViolationKind::Pacing,
                Severity::Low,
                format!(
                    "romance progression {level} is below the expected low of {low} for chapter {chapter}"
                ),
            ));
        }

        let adjustment =
            progression::suggest_pacing_adjustment(chapter, target, Dimension::Emotional, level);
        if adjustment.needed {
            suggestions.extend(adjustment.suggestions);
        }
    }

    /// Check 3: stage-scoped banned patterns from the rule set.
    fn check_banned_patterns(
        &self,
        text_lower: &str,
        stage: Stage,
        violations: &mut Vec<Violation>,
    ) {
        for rule in self.rules.applicable(stage) {
            if contains_word(text_lower, &rule.pattern.to_lowercase()) {
                let kind = match rule.class {
                    RuleClass::Pacing => ViolationKind::Pacing,
                    RuleClass::Continuity => ViolationKind::Continuity,
                };
                violations.push(Violation::new(
                    kind,
                    Severity::from_weight(rule.weight),
                    format!("banned pattern '{}': {}", rule.pattern, rule.message),
                ));
            }
        }
    }

    /// Check 4: consumed plot elements must not reappear.
    fn check_repetition(
        &self,
        text_lower: &str,
        candidate: &ParsedChapter,
        state: &StoryState,
        violations: &mut Vec<Violation>,
    ) {
        let declared: Vec<String> = candidate
            .used_elements
            .iter()
            .map(|e| e.to_lowercase())
            .collect();

        for (class, element) in state.used_elements.iter() {
            let reused =
                contains_word(text_lower, element) || declared.iter().any(|d| d == element);
            if reused {
                violations.push(Violation::new(
                    ViolationKind::Continuity,
                    Severity::High,
                    format!("reuses already-consumed {} '{element}'", class.name()),
                ));
            }
        }
    }
}

impl Default for ConstraintValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Severity of a delta exceeding its stage cap, scaled by overage.
fn overage_severity(overage: u8, cap: u8) -> Severity {
    if overage <= cap {
        Severity::Moderate
    } else if overage <= cap * 2 {
        Severity::High
    } else {
        Severity::Critical
    }
}

lazy_static::lazy_static! {
    /// Capitalized words that are never character names.
    static ref NAME_STOPWORDS: BTreeSet<&'static str> = [
        "a", "after", "all", "although", "an", "and", "as", "at", "before",
        "behind", "beneath", "but", "by", "chapter", "do", "don", "even",
        "every", "for", "from", "he", "her", "here", "hers", "his", "how",
        "i", "if", "in", "inside", "it", "its", "lady", "later", "lord",
        "madam", "maybe", "miss", "mr", "mrs", "my", "no", "not", "now",
        "of", "on", "once", "only", "or", "our", "outside", "perhaps",
        "she", "since", "sir", "so", "some", "that", "the", "their",
        "theirs", "then", "there", "these", "they", "this", "those",
        "though", "through", "to", "today", "tomorrow", "tonight", "under",
        "until", "was", "we", "what", "when", "where", "while", "who",
        "why", "with", "without", "yes", "yesterday", "yet", "you", "your",
        "yours",
    ]
    .into_iter()
    .collect();
}

/// Extract proper-noun-like tokens from prose.
///
/// A token qualifies when it is capitalized, at least three letters,
/// appears somewhere other than the start of a sentence, is not a
/// stopword, and never appears lowercased in the same text (which would
/// mark it as an ordinary word).
pub fn extract_candidate_names(text: &str) -> Vec<String> {
    let lower_words: BTreeSet<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && w.chars().next().is_some_and(|c| c.is_lowercase()))
        .map(|w| w.to_lowercase())
        .collect();

    let mut found = Vec::new();
    let mut seen = BTreeSet::new();

    for sentence in text.split(['.', '!', '?', '\n']) {
        for (index, raw) in sentence.split_whitespace().enumerate() {
            if index == 0 {
                // Sentence-initial capitals are ambiguous; a real name
                // will recur mid-sentence.
                continue;
            }
            let word: String = raw.chars().filter(|c| c.is_alphabetic()).collect();
            if word.chars().count() < 3 {
                continue;
            }
            if !word.chars().next().is_some_and(|c| c.is_uppercase()) {
                continue;
            }
            let lower = word.to_lowercase();
            if NAME_STOPWORDS.contains(lower.as_str()) || lower_words.contains(&lower) {
                continue;
            }
            if seen.insert(lower) {
                found.push(word);
            }
        }
    }

    found
}

/// Check if `text` contains `word` at word boundaries.
///
/// A boundary is the start/end of the string or a non-alphanumeric
/// character, so multi-word phrases match as phrases and "Thor" does
/// not match inside "Thorin". Both arguments are expected lowercased.
pub fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }

    let text_bytes = text.as_bytes();
    let word_bytes = word.as_bytes();
    let text_len = text_bytes.len();
    let word_len = word_bytes.len();

    if word_len > text_len {
        return false;
    }

    let mut i = 0;
    while i + word_len <= text_len {
        if &text_bytes[i..i + word_len] == word_bytes {
            let left_ok = i == 0 || !text_bytes[i - 1].is_ascii_alphanumeric();
            let right_ok =
                i + word_len == text_len || !text_bytes[i + word_len].is_ascii_alphanumeric();
            if left_ok && right_ok {
                return true;
            }
        }
        i += 1;
    }

    false
}
