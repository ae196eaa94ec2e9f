//! The continuity chapter recorder: the only component that writes
//! story state.
//!
//! Every accepted chapter flows through [`ContinuityChapterRecorder::commit`],
//! which applies the chapter's declared effects (character updates,
//! foreshadowing payoffs, progression advances, consumed elements) as a
//! single unit and persists the result atomically. Rejected drafts and
//! retried commits leave state exactly as it was.

use crate::parser::ParsedChapter;
use crate::state::{
    ChapterFrontMatter, ChapterRecord, ElementClass, Milestone, NovelStatus, StoryState,
};
use crate::store::{self, NovelStore, StoreError};
use crate::validator::ValidationReport;

/// Romance levels that mark a relationship milestone when first crossed.
const MILESTONE_THRESHOLDS: [(u8, &str); 4] = [
    (25, "mutual awareness"),
    (50, "first confession"),
    (75, "deep commitment"),
    (100, "union"),
];

/// How many words of prose seed the chapter summary when the draft
/// declares no key events.
const SUMMARY_WORDS: usize = 30;

/// The result of a commit attempt.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// The chapter was appended and the state persisted.
    Committed {
        /// The record now stored in the novel state.
        record: ChapterRecord,
        /// The rendered content file: front matter plus prose.
        rendered: String,
    },
    /// A retry of an already-committed chapter number. State untouched.
    AlreadyCommitted(ChapterRecord),
    /// The draft failed validation. State untouched.
    Rejected(ValidationReport),
}

/// Applies validated chapter drafts to story state and persists them.
#[derive(Debug, Clone)]
pub struct ContinuityChapterRecorder {
    content_rating: String,
}

impl ContinuityChapterRecorder {
    /// Create a recorder with the default content rating.
    pub fn new() -> Self {
        Self {
            content_rating: "PG-13".to_string(),
        }
    }

    /// Create a recorder with a custom content rating for front matter.
    pub fn with_content_rating(rating: impl Into<String>) -> Self {
        Self {
            content_rating: rating.into(),
        }
    }

    /// Commit a validated draft to the named novel.
    ///
    /// The caller must hold the novel's lease and must have run the
    /// draft through the validator; an invalid report short-circuits to
    /// [`CommitOutcome::Rejected`] without touching state. Retrying a
    /// chapter number that already committed returns the stored record
    /// unchanged, so a crashed-then-retried pipeline never double-writes.
    pub async fn commit(
        &self,
        store: &NovelStore,
        slug: &str,
        draft: &ParsedChapter,
        report: &ValidationReport,
    ) -> Result<CommitOutcome, StoreError> {
        if !report.valid {
            return Ok(CommitOutcome::Rejected(report.clone()));
        }

        let mut state = store.load_existing(slug).await?;
        if state.is_closed() {
            return Err(StoreError::ClosedNovel {
                slug: slug.to_string(),
            });
        }

        let expected = state.next_chapter_number();
        let number = match draft.number {
            Some(number) => number,
            None => {
                // Without a declared number, a retry is recognized by
                // the draft matching the latest committed chapter.
                if let Some(last) = state.chapters.last() {
                    if last.title == draft.title && last.word_count == draft.word_count() {
                        tracing::debug!(
                            slug,
                            number = last.number,
                            "chapter already committed, returning stored record"
                        );
                        return Ok(CommitOutcome::AlreadyCommitted(last.clone()));
                    }
                }
                expected
            }
        };
        if number < expected {
            // Retried commit; the chapter is already in.
            if let Some(record) = state.chapters.iter().find(|c| c.number == number) {
                tracing::debug!(slug, number, "chapter already committed, returning stored record");
                return Ok(CommitOutcome::AlreadyCommitted(record.clone()));
            }
        }

        let record = self.build_record(&state, draft, number);
        state.append_chapter(record.clone())?;

        self.apply_character_updates(&mut state, draft);
        self.apply_plot_effects(&mut state, draft);
        self.apply_progression(&mut state, draft);
        self.record_milestones(&mut state, &record);

        if draft.ending_type.is_some() {
            if state.metadata.status == NovelStatus::Active {
                state.advance_status(NovelStatus::Completing)?;
            }
            state.advance_status(NovelStatus::Completed)?;
            tracing::info!(slug, number, "novel completed");
        }

        store.save(slug, &state).await?;

        let front = ChapterFrontMatter::new(&record, slug, store::timestamp_now(), self.content_rating.as_str());
        let rendered = front.render_markdown(&draft.content)?;

        Ok(CommitOutcome::Committed { record, rendered })
    }

    fn build_record(&self, state: &StoryState, draft: &ParsedChapter, number: u32) -> ChapterRecord {
        let summary = if draft.key_events.is_empty() {
            draft
                .content
                .split_whitespace()
                .take(SUMMARY_WORDS)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            draft.key_events.join("; ")
        };

        let romance_level = draft
            .romance_level
            .unwrap_or_else(|| state.current_romance_level());

        ChapterRecord {
            number,
            title: draft.title.clone(),
            summary,
            key_events: draft.key_events.clone(),
            emotional_tone: draft.emotional_tone.clone().unwrap_or_default(),
            word_count: draft.word_count(),
            romance_progression_level: romance_level,
        }
    }

    fn apply_character_updates(&self, state: &mut StoryState, draft: &ParsedChapter) {
        for update in &draft.character_updates {
            let mut applied = false;
            for (name, record) in state.characters.iter_mut() {
                if record.matches_name(&update.name, name) {
                    update.apply(&mut record.current);
                    applied = true;
                    break;
                }
            }
            if !applied {
                // Unregistered names are caught by validation; a miss
                // here means the update referenced an alias dropped
                // since the draft was generated. Skip rather than fail.
                tracing::warn!(name = %update.name, "character update for unknown name skipped");
            }
        }
    }

    fn apply_plot_effects(&self, state: &mut StoryState, draft: &ParsedChapter) {
        for reference in &draft.resolves_foreshadowing {
            let resolved = state.plot.resolve_matching(reference);
            if resolved == 0 {
                tracing::debug!(reference, "declared foreshadowing payoff matched nothing");
            }
        }

        state
            .plot
            .completed_events
            .extend(draft.key_events.iter().cloned());

        for element in &draft.used_elements {
            state.used_elements.record(classify_element(element), element);
        }
    }

    fn apply_progression(&self, state: &mut StoryState, draft: &ParsedChapter) {
        for (dimension, delta) in &draft.deltas {
            state.progression.advance(*dimension, *delta);
        }
    }

    fn record_milestones(&self, state: &mut StoryState, record: &ChapterRecord) {
        let previous = state
            .chapters
            .iter()
            .rev()
            .nth(1)
            .map(|c| c.romance_progression_level)
            .unwrap_or(0);
        let current = record.romance_progression_level;

        for (threshold, label) in MILESTONE_THRESHOLDS {
            if previous < threshold && current >= threshold {
                state
                    .relationship_milestones
                    .push(Milestone::new(label, record.number));
            }
        }
    }
}

impl Default for ContinuityChapterRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort classification of a consumed plot element.
fn classify_element(element: &str) -> ElementClass {
    let lower = element.to_lowercase();
    const ROMANCE_MARKERS: &[&str] = &["kiss", "confession", "date", "embrace", "romance"];
    const CONFLICT_MARKERS: &[&str] = &["battle", "fight", "dispute", "war", "duel", "siege", "conflict"];

    if ROMANCE_MARKERS.iter().any(|m| lower.contains(m)) {
        ElementClass::RomanceBeat
    } else if CONFLICT_MARKERS.iter().any(|m| lower.contains(m)) {
        ElementClass::Conflict
    } else {
        ElementClass::Twist
    }
}
