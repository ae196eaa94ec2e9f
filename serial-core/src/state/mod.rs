//! Structured story state for serialized fiction.
//!
//! One [`StoryState`] record exists per novel, keyed by slug. It is
//! created by the engine, mutated only by the chapter recorder after
//! validation passes, and persisted whole by the store.

mod chapter;
mod character;
mod novel;
mod plot;

pub use chapter::{ChapterFrontMatter, ChapterRecord};
pub use character::{CharacterRecord, CharacterState, CharacterUpdate};
pub use novel::{
    Dimension, NovelMetadata, NovelStatus, Progression, StateError, StoryState, WorldState,
};
pub use plot::{
    ElementClass, ForeshadowId, ForeshadowingEntry, Milestone, MilestoneId, PlotState,
    UsedElements,
};
