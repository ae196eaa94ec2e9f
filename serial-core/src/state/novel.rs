//! The per-novel story state record and its invariants.

use super::chapter::ChapterRecord;
use super::character::CharacterRecord;
use super::plot::{Milestone, PlotState, UsedElements};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Invariant violations raised by schema checks and state mutation.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("target_chapters must be positive")]
    NonPositiveTargetChapters,

    #[error("duplicate foreshadowing id in novel state")]
    DuplicateForeshadowId,

    #[error("chapter numbers must be contiguous: expected {expected}, found {found}")]
    NonContiguousChapter { expected: u32, found: u32 },

    #[error("{dimension} progression {value} is out of range (0-100)")]
    ProgressionOutOfRange { dimension: &'static str, value: u8 },

    #[error("status cannot move from {from:?} to {to:?}")]
    InvalidStatusTransition { from: NovelStatus, to: NovelStatus },

    #[error("novel is completed and accepts no further chapters")]
    NovelClosed,
}

/// Lifecycle status of a novel.
///
/// Advances only forward: NotStarted -> Active -> Completing -> Completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NovelStatus {
    /// Default for a bare record; the engine advances to Active when it
    /// opens the novel.
    #[default]
    NotStarted,
    /// Chapters are being generated and committed.
    Active,
    /// Completion requested; the epilogue is being generated.
    Completing,
    /// The epilogue has committed. Terminal.
    Completed,
}

impl NovelStatus {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            NovelStatus::NotStarted => "not started",
            NovelStatus::Active => "active",
            NovelStatus::Completing => "completing",
            NovelStatus::Completed => "completed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            NovelStatus::NotStarted => 0,
            NovelStatus::Active => 1,
            NovelStatus::Completing => 2,
            NovelStatus::Completed => 3,
        }
    }

    /// Whether moving to `next` is a legal forward step.
    pub fn can_advance_to(&self, next: NovelStatus) -> bool {
        next.rank() == self.rank() + 1
    }
}

/// Novel-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelMetadata {
    /// Display title.
    pub title: String,
    /// Credited author name.
    pub author: String,
    /// Genre label for the front end.
    pub genre: String,
    /// Lifecycle status.
    pub status: NovelStatus,
    /// Planned chapter count, always positive.
    pub target_chapters: u32,
}

impl Default for NovelMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            genre: String::new(),
            status: NovelStatus::NotStarted,
            target_chapters: 1,
        }
    }
}

/// World-building state shared by every chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Setting description.
    pub setting: String,
    /// Ordered list of world rules the prose must respect.
    pub rules: Vec<String>,
    /// Named subsystems (e.g. a magic system) mapped to rule text.
    pub subsystems: BTreeMap<String, String>,
}

/// A progression dimension tracked as a 0-100 scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    Physical,
    Emotional,
    Social,
    Plot,
}

impl Dimension {
    /// All dimensions in stable order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Physical,
        Dimension::Emotional,
        Dimension::Social,
        Dimension::Plot,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Physical => "physical",
            Dimension::Emotional => "emotional",
            Dimension::Social => "social",
            Dimension::Plot => "plot",
        }
    }
}

/// The four progression scalars. Each is monotonically non-decreasing
/// across committed chapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub physical: u8,
    pub emotional: u8,
    pub social: u8,
    pub plot: u8,
}

impl Progression {
    /// Read one dimension.
    pub fn get(&self, dimension: Dimension) -> u8 {
        match dimension {
            Dimension::Physical => self.physical,
            Dimension::Emotional => self.emotional,
            Dimension::Social => self.social,
            Dimension::Plot => self.plot,
        }
    }

    /// Advance one dimension by a delta, saturating at 100.
    pub fn advance(&mut self, dimension: Dimension, delta: u8) {
        let slot = match dimension {
            Dimension::Physical => &mut self.physical,
            Dimension::Emotional => &mut self.emotional,
            Dimension::Social => &mut self.social,
            Dimension::Plot => &mut self.plot,
        };
        *slot = slot.saturating_add(delta).min(100);
    }

    /// Mean of the four scalars, as a 0.0-1.0 fraction.
    pub fn overall(&self) -> f32 {
        let sum = self.physical as u32 + self.emotional as u32 + self.social as u32 + self.plot as u32;
        sum as f32 / 400.0
    }
}

/// The complete structured record for one novel, keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    /// Novel-level metadata.
    pub metadata: NovelMetadata,
    /// World-building state.
    pub world: WorldState,
    /// Registered characters by name.
    pub characters: BTreeMap<String, CharacterRecord>,
    /// Plot state.
    pub plot: PlotState,
    /// Committed chapters, contiguous from 1.
    pub chapters: Vec<ChapterRecord>,
    /// Progression scalars.
    pub progression: Progression,
    /// Relationship milestones reached so far.
    pub relationship_milestones: Vec<Milestone>,
    /// Plot elements already consumed.
    pub used_elements: UsedElements,
}

impl StoryState {
    /// Create a fresh state for a novel with the given metadata.
    pub fn new(metadata: NovelMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Number of committed chapters.
    pub fn chapter_count(&self) -> u32 {
        self.chapters.len() as u32
    }

    /// The chapter number the next commit must carry.
    pub fn next_chapter_number(&self) -> u32 {
        self.chapter_count() + 1
    }

    /// Romance progression level after the latest chapter (0 before any).
    pub fn current_romance_level(&self) -> u8 {
        self.chapters
            .last()
            .map(|c| c.romance_progression_level)
            .unwrap_or(0)
    }

    /// Whether the novel refuses further chapters.
    pub fn is_closed(&self) -> bool {
        self.metadata.status == NovelStatus::Completed
    }

    /// Every name the validator accepts in prose: registered character
    /// names plus their aliases, lowercased.
    pub fn registered_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for (name, record) in &self.characters {
            names.insert(name.to_lowercase());
            for alias in &record.aliases {
                names.insert(alias.to_lowercase());
            }
        }
        names
    }

    /// Insert or replace a character record.
    pub fn upsert_character(&mut self, name: impl Into<String>, record: CharacterRecord) {
        self.characters.insert(name.into(), record);
    }

    /// Advance the lifecycle status by one legal step.
    pub fn advance_status(&mut self, next: NovelStatus) -> Result<(), StateError> {
        if !self.metadata.status.can_advance_to(next) {
            return Err(StateError::InvalidStatusTransition {
                from: self.metadata.status,
                to: next,
            });
        }
        self.metadata.status = next;
        Ok(())
    }

    /// Append a chapter, enforcing closure and contiguity.
    pub fn append_chapter(&mut self, record: ChapterRecord) -> Result<(), StateError> {
        if self.is_closed() {
            return Err(StateError::NovelClosed);
        }
        let expected = self.next_chapter_number();
        if record.number != expected {
            return Err(StateError::NonContiguousChapter {
                expected,
                found: record.number,
            });
        }
        self.chapters.push(record);
        Ok(())
    }

    /// Check the record against its schema invariants. Run before every
    /// persisted save so a bad state never reaches disk.
    pub fn validate_schema(&self) -> Result<(), StateError> {
        if self.metadata.target_chapters == 0 {
            return Err(StateError::NonPositiveTargetChapters);
        }

        let mut ids = BTreeSet::new();
        for entry in &self.plot.foreshadowing {
            if !ids.insert(entry.id) {
                return Err(StateError::DuplicateForeshadowId);
            }
        }

        for (number, chapter) in self.chapters.iter().enumerate() {
            let expected = number as u32 + 1;
            if chapter.number != expected {
                return Err(StateError::NonContiguousChapter {
                    expected,
                    found: chapter.number,
                });
            }
        }

        for dimension in Dimension::ALL {
            let value = self.progression.get(dimension);
            if value > 100 {
                return Err(StateError::ProgressionOutOfRange {
                    dimension: dimension.name(),
                    value,
                });
            }
        }

        Ok(())
    }
}
