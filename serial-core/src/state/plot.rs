//! Plot state: arc summary, conflicts, foreshadowing, and used elements.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for a planted foreshadowing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeshadowId(Uuid);

impl ForeshadowId {
    /// Create a new unique foreshadowing ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ForeshadowId {
    fn default() -> Self {
        Self::new()
    }
}

/// A planted narrative hint awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeshadowingEntry {
    /// Unique within the novel.
    pub id: ForeshadowId,
    /// What was hinted at.
    pub content: String,
    /// Chapter number the hint was planted in.
    pub planted_chapter: u32,
    /// Whether a later chapter paid the hint off.
    pub resolved: bool,
}

impl ForeshadowingEntry {
    /// Plant a new unresolved entry.
    pub fn new(content: impl Into<String>, planted_chapter: u32) -> Self {
        Self {
            id: ForeshadowId::new(),
            content: content.into(),
            planted_chapter,
            resolved: false,
        }
    }
}

/// Unique identifier for a relationship milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MilestoneId(Uuid);

impl MilestoneId {
    /// Create a new unique milestone ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MilestoneId {
    fn default() -> Self {
        Self::new()
    }
}

/// A relationship milestone reached at a specific chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique identifier.
    pub id: MilestoneId,
    /// Short label, e.g. "first confession".
    pub label: String,
    /// Chapter number the milestone was achieved in.
    pub achieved_at_chapter: u32,
}

impl Milestone {
    /// Record a milestone at the given chapter.
    pub fn new(label: impl Into<String>, achieved_at_chapter: u32) -> Self {
        Self {
            id: MilestoneId::new(),
            label: label.into(),
            achieved_at_chapter,
        }
    }
}

/// Classes of plot elements tracked against reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementClass {
    /// A conflict already played out.
    Conflict,
    /// A plot twist already spent.
    Twist,
    /// A romance beat already consumed.
    RomanceBeat,
}

impl ElementClass {
    /// Display name for reports.
    pub fn name(&self) -> &'static str {
        match self {
            ElementClass::Conflict => "conflict",
            ElementClass::Twist => "twist",
            ElementClass::RomanceBeat => "romance beat",
        }
    }
}

/// Plot elements already consumed by earlier chapters.
///
/// Ordered sets keep serialization and prompt output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedElements {
    /// Conflicts already played out.
    pub conflicts: BTreeSet<String>,
    /// Twists already spent.
    pub twists: BTreeSet<String>,
    /// Romance beats already consumed.
    pub romance_beats: BTreeSet<String>,
}

impl UsedElements {
    /// Record a used element under its class.
    pub fn record(&mut self, class: ElementClass, element: impl Into<String>) {
        let element = element.into().to_lowercase();
        match class {
            ElementClass::Conflict => self.conflicts.insert(element),
            ElementClass::Twist => self.twists.insert(element),
            ElementClass::RomanceBeat => self.romance_beats.insert(element),
        };
    }

    /// Iterate every used element with its class.
    pub fn iter(&self) -> impl Iterator<Item = (ElementClass, &str)> {
        self.conflicts
            .iter()
            .map(|e| (ElementClass::Conflict, e.as_str()))
            .chain(
                self.twists
                    .iter()
                    .map(|e| (ElementClass::Twist, e.as_str())),
            )
            .chain(
                self.romance_beats
                    .iter()
                    .map(|e| (ElementClass::RomanceBeat, e.as_str())),
            )
    }

    /// Total count of tracked elements.
    pub fn len(&self) -> usize {
        self.conflicts.len() + self.twists.len() + self.romance_beats.len()
    }

    /// Check whether nothing has been consumed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The plot portion of a novel's story state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotState {
    /// One-paragraph summary of the main arc.
    pub main_arc_summary: String,
    /// Events that have already happened, in order.
    pub completed_events: Vec<String>,
    /// Conflicts currently open.
    pub active_conflicts: Vec<String>,
    /// Planted foreshadowing entries.
    pub foreshadowing: Vec<ForeshadowingEntry>,
}

impl PlotState {
    /// Plant a foreshadowing entry, returning its id.
    pub fn plant_foreshadowing(
        &mut self,
        content: impl Into<String>,
        chapter: u32,
    ) -> ForeshadowId {
        let entry = ForeshadowingEntry::new(content, chapter);
        let id = entry.id;
        self.foreshadowing.push(entry);
        id
    }

    /// Unresolved foreshadowing entries.
    pub fn pending_foreshadowing(&self) -> impl Iterator<Item = &ForeshadowingEntry> {
        self.foreshadowing.iter().filter(|f| !f.resolved)
    }

    /// Unresolved entries planted at least `age` chapters before `chapter`.
    pub fn foreshadowing_due(&self, chapter: u32, age: u32) -> Vec<&ForeshadowingEntry> {
        self.pending_foreshadowing()
            .filter(|f| f.planted_chapter + age <= chapter)
            .collect()
    }

    /// Mark any pending entry whose content matches the reference as
    /// resolved. Matching is case-insensitive substring in either
    /// direction so "the sealed letter" resolves "Aria finds the sealed
    /// letter from her mother".
    pub fn resolve_matching(&mut self, reference: &str) -> usize {
        let reference = reference.to_lowercase();
        let mut resolved = 0;
        for entry in self.foreshadowing.iter_mut().filter(|f| !f.resolved) {
            let content = entry.content.to_lowercase();
            if content.contains(&reference) || reference.contains(&content) {
                entry.resolved = true;
                resolved += 1;
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_and_pending() {
        let mut plot = PlotState::default();
        plot.plant_foreshadowing("the sealed letter", 1);
        plot.plant_foreshadowing("a scar shaped like a crescent", 2);

        assert_eq!(plot.pending_foreshadowing().count(), 2);
        assert_eq!(plot.foreshadowing_due(4, 3).len(), 1);
        assert_eq!(plot.foreshadowing_due(5, 3).len(), 2);
    }

    #[test]
    fn test_resolve_matching() {
        let mut plot = PlotState::default();
        plot.plant_foreshadowing("the sealed letter", 1);

        assert_eq!(plot.resolve_matching("Aria opens the sealed letter"), 1);
        assert_eq!(plot.pending_foreshadowing().count(), 0);
        // Already resolved, nothing further to match.
        assert_eq!(plot.resolve_matching("the sealed letter"), 0);
    }

    #[test]
    fn test_used_elements_deterministic_order() {
        let mut used = UsedElements::default();
        used.record(ElementClass::Twist, "Hidden Sibling");
        used.record(ElementClass::Conflict, "border dispute");
        used.record(ElementClass::Conflict, "assassination plot");

        let all: Vec<_> = used.iter().map(|(_, e)| e.to_string()).collect();
        assert_eq!(
            all,
            vec!["assassination plot", "border dispute", "hidden sibling"]
        );
    }
}
