//! Narrative continuity and pacing constraint engine for serialized
//! fiction.
//!
//! The crate keeps long-running generated novels coherent: every
//! chapter a collaborator produces is checked against durable story
//! state (characters, plot threads, progression scalars) and against
//! stage-scoped pacing rules before it is allowed to commit. The main
//! pieces:
//!
//! - [`state`]: the per-novel [`state::StoryState`] record and its
//!   invariants.
//! - [`store`]: durable JSON persistence with atomic saves and a
//!   per-slug lease.
//! - [`progression`]: pure stage and pacing math.
//! - [`rules`] and [`validator`]: the configurable rule set and the
//!   four-check chapter validator.
//! - [`prompt`]: deterministic constraint payloads and prompt assembly.
//! - [`recorder`]: the sole writer of story state.
//! - [`engine`]: the orchestration façade, including the bounded
//!   generate-validate-retry cycle.
//! - [`generator`]: the trait boundary to the external generation
//!   collaborator, with a scripted mock in [`testing`].

pub mod engine;
pub mod generator;
pub mod parser;
pub mod progression;
pub mod prompt;
pub mod recorder;
pub mod rules;
pub mod state;
pub mod store;
pub mod testing;
pub mod validator;

pub use engine::{
    EngineConfig, EngineError, GeneratedChapter, NovelEngine, NovelSeed, StartedNovel,
    SystemStatus,
};
pub use generator::{ChapterGenerator, Creativity, GeneratorError};
pub use parser::{parse_chapter, ParseError, ParsedChapter};
pub use progression::{PacingAdjustment, PacingDirection, Stage};
pub use prompt::{ChapterConstraints, ChapterPlan, PromptConstraintGenerator};
pub use recorder::{CommitOutcome, ContinuityChapterRecorder};
pub use rules::{PacingRule, RuleClass, RuleSet, RuleSetError};
pub use state::{
    ChapterRecord, CharacterRecord, CharacterUpdate, Dimension, NovelMetadata, NovelStatus,
    StateError, StoryState,
};
pub use store::{NovelInfo, NovelStore, StoreError};
pub use validator::{ConstraintValidator, Severity, ValidationReport, Violation, ViolationKind};
