//! Deterministic constraint and prompt assembly for the generation
//! collaborator.
//!
//! Everything here is a pure function of story state and the rule set:
//! ordered maps and pre-sorted vectors only, so identical state always
//! yields byte-identical output. That property is load-bearing — tests
//! rely on reproducible constraints, and retries must not drift.

use crate::progression::{self, Stage};
use crate::rules::RuleSet;
use crate::state::{Dimension, StoryState};
use crate::validator::ValidationReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many chapters a foreshadowing hint may age before the generator
/// is told to pay it off.
const FORESHADOW_DUE_AGE: u32 = 3;

/// How many recent completed events the prompt reminds the
/// collaborator about.
const RECENT_EVENT_WINDOW: usize = 5;

/// The constraint payload attached to a chapter request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterConstraints {
    /// Current progression scalars by dimension name, plus the romance
    /// level.
    pub progress: BTreeMap<String, u8>,
    /// Patterns and consumed elements the chapter must avoid.
    pub prohibited_keywords: Vec<String>,
    /// Emotional tones appropriate to the current stage.
    pub allowed_emotions: Vec<String>,
    /// Foreshadowing due for resolution and conflicts to address.
    pub must_include: Vec<String>,
    /// Established facts the chapter must stay consistent with.
    pub must_not_forget: Vec<String>,
}

/// A ready-to-send chapter request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPlan {
    /// The full instruction payload.
    pub prompt: String,
    /// The structured constraints embedded in the prompt.
    pub constraints: ChapterConstraints,
}

impl ChapterPlan {
    /// Produce a tightened plan after a rejected attempt: the original
    /// prompt plus the violations to fix and any pacing suggestions.
    pub fn with_rejection_feedback(&self, report: &ValidationReport) -> ChapterPlan {
        let mut prompt = self.prompt.clone();
        prompt.push_str("\n## Previous Attempt Rejected\n\n");
        prompt.push_str("The previous draft violated these constraints. Fix every one:\n");
        for violation in &report.violations {
            prompt.push_str(&format!("- {}\n", violation.message));
        }
        if !report.suggestions.is_empty() {
            prompt.push_str("\nSuggestions:\n");
            for suggestion in &report.suggestions {
                prompt.push_str(&format!("- {suggestion}\n"));
            }
        }

        ChapterPlan {
            prompt,
            constraints: self.constraints.clone(),
        }
    }
}

/// Builds constraint payloads and prompts from story state.
#[derive(Debug, Clone)]
pub struct PromptConstraintGenerator {
    rules: RuleSet,
}

impl PromptConstraintGenerator {
    /// Create a generator with the built-in rule set.
    pub fn new() -> Self {
        Self {
            rules: RuleSet::builtin(),
        }
    }

    /// Create a generator with a custom rule set.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Build the constraints for the next chapter of a novel.
    pub fn constraints_for(&self, state: &StoryState) -> ChapterConstraints {
        let chapter = state.next_chapter_number();
        let target = state.metadata.target_chapters;
        let stage = progression::stage_of(chapter, target);

        let mut progress = BTreeMap::new();
        for dimension in Dimension::ALL {
            progress.insert(
                dimension.name().to_string(),
                state.progression.get(dimension),
            );
        }
        progress.insert("romance".to_string(), state.current_romance_level());

        let mut prohibited_keywords = self.rules.prohibited_patterns(stage);
        prohibited_keywords.extend(
            state
                .used_elements
                .iter()
                .map(|(_, element)| element.to_string()),
        );
        prohibited_keywords.sort();
        prohibited_keywords.dedup();

        let mut allowed_emotions: Vec<String> = stage
            .allowed_emotions()
            .iter()
            .map(|e| e.to_string())
            .collect();
        allowed_emotions.sort();

        let mut must_include: Vec<String> = state
            .plot
            .foreshadowing_due(chapter, FORESHADOW_DUE_AGE)
            .iter()
            .map(|f| format!("resolve the planted hint: {}", f.content))
            .collect();
        if stage == Stage::Resolution {
            // Nothing may stay dangling in the final stretch.
            for entry in state.plot.pending_foreshadowing() {
                let line = format!("resolve the planted hint: {}", entry.content);
                if !must_include.contains(&line) {
                    must_include.push(line);
                }
            }
        }
        for conflict in &state.plot.active_conflicts {
            must_include.push(format!("address the open conflict: {conflict}"));
        }

        let mut must_not_forget: Vec<String> = state.world.rules.clone();
        for (name, subsystem) in &state.world.subsystems {
            must_not_forget.push(format!("{name}: {subsystem}"));
        }
        for (name, record) in &state.characters {
            if !record.current.location.is_empty() || !record.current.emotion.is_empty() {
                must_not_forget.push(format!(
                    "{name} ({}) is at {}, feeling {}",
                    record.role, record.current.location, record.current.emotion
                ));
            }
        }
        for event in state
            .plot
            .completed_events
            .iter()
            .rev()
            .take(RECENT_EVENT_WINDOW)
            .rev()
        {
            must_not_forget.push(format!("already happened: {event}"));
        }

        ChapterConstraints {
            progress,
            prohibited_keywords,
            allowed_emotions,
            must_include,
            must_not_forget,
        }
    }

    /// Build the full request for the next chapter.
    pub fn prepare_next_chapter(&self, state: &StoryState) -> ChapterPlan {
        let constraints = self.constraints_for(state);
        let prompt = self.render_prompt(state, &constraints, false);
        ChapterPlan {
            prompt,
            constraints,
        }
    }

    /// Build the request for the final (epilogue) chapter. The reply
    /// must carry an ENDING_TYPE marker.
    pub fn prepare_completion_chapter(&self, state: &StoryState) -> ChapterPlan {
        let constraints = self.constraints_for(state);
        let prompt = self.render_prompt(state, &constraints, true);
        ChapterPlan {
            prompt,
            constraints,
        }
    }

    fn render_prompt(
        &self,
        state: &StoryState,
        constraints: &ChapterConstraints,
        completing: bool,
    ) -> String {
        let chapter = state.next_chapter_number();
        let target = state.metadata.target_chapters;
        let stage = progression::stage_of(chapter, target);

        let mut prompt = String::new();

        prompt.push_str(&format!(
            "# Write Chapter {chapter} of \"{}\"\n\n",
            state.metadata.title
        ));
        prompt.push_str(&format!(
            "Genre: {}. Target length: {target} chapters. Narrative stage: {}.\n\n",
            state.metadata.genre,
            stage.name()
        ));

        if !state.world.setting.is_empty() {
            prompt.push_str("## Setting\n\n");
            prompt.push_str(&state.world.setting);
            prompt.push_str("\n\n");
        }

        if !state.plot.main_arc_summary.is_empty() {
            prompt.push_str("## Story So Far\n\n");
            prompt.push_str(&state.plot.main_arc_summary);
            prompt.push_str("\n\n");
        }

        if !state.chapters.is_empty() {
            prompt.push_str("## Recent Chapters\n\n");
            for record in state.chapters.iter().rev().take(3).rev() {
                prompt.push_str(&format!(
                    "- Chapter {}: {} — {}\n",
                    record.number, record.title, record.summary
                ));
            }
            prompt.push('\n');
        }

        if !state.characters.is_empty() {
            prompt.push_str("## Characters\n\n");
            for (name, record) in &state.characters {
                prompt.push_str(&format!("### {name} ({})\n", record.role));
                if !record.personality_traits.is_empty() {
                    prompt.push_str(&format!("- traits: {}\n", record.personality_traits.join(", ")));
                }
                for (other, relation) in &record.relationships {
                    prompt.push_str(&format!("- {relation} of {other}\n"));
                }
                if !record.arc_summary.is_empty() {
                    prompt.push_str(&format!("- arc: {}\n", record.arc_summary));
                }
            }
            prompt.push('\n');
        }

        prompt.push_str("## Constraints\n\n");
        // serde_json keeps struct field order and BTreeMap key order, so
        // this block is byte-stable for identical state.
        let json = serde_json::to_string_pretty(constraints)
            .unwrap_or_else(|_| String::from("{}"));
        prompt.push_str(&json);
        prompt.push_str("\n\n");

        prompt.push_str("Suggested beats for this stage: ");
        prompt.push_str(&stage.suggested_beats().join(", "));
        prompt.push_str(".\n\n");

        if completing {
            prompt.push_str("## Ending\n\n");
            prompt.push_str(
                "This is the final chapter. Resolve every open thread and close the novel. \
                 Your reply MUST include an ENDING_TYPE field (e.g. ENDING_TYPE: happy_ending).\n\n",
            );
        }

        prompt.push_str("## Reply Format\n\n");
        prompt.push_str(&format!(
            "Reply with exactly these fields, each on its own line:\n\
             CHAPTER_NUMBER: {chapter}\n\
             TITLE: <chapter title>\n\
             EMOTIONAL_TONE: <one of the allowed emotions>\n\
             KEY_EVENTS: <comma-separated list>\n\
             ROMANCE_LEVEL: <0-100, the level after this chapter>\n\
             PHYSICAL_DELTA / EMOTIONAL_DELTA / SOCIAL_DELTA / PLOT_DELTA: <per-chapter advance>\n\
             CHARACTER_UPDATE: <name | location=... | emotion=... | power=N> (repeatable)\n\
             RESOLVES_FORESHADOWING: <comma-separated hints paid off>\n\
             USED_ELEMENTS: <comma-separated beats consumed>\n\
             CONTENT:\n\
             <the full prose, until end of reply>\n"
        ));

        prompt
    }
}

impl Default for PromptConstraintGenerator {
    fn default() -> Self {
        Self::new()
    }
}
