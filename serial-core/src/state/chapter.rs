//! Committed chapter records and the persisted front matter format.

use serde::{Deserialize, Serialize};

/// A chapter committed into a novel's story state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// Chapter number, contiguous from 1.
    pub number: u32,
    /// Chapter title.
    pub title: String,
    /// Short summary of what happened.
    pub summary: String,
    /// Key events declared by the chapter.
    pub key_events: Vec<String>,
    /// Dominant emotional tone.
    pub emotional_tone: String,
    /// Word count of the prose.
    pub word_count: u32,
    /// Romance progression after this chapter (0-100).
    pub romance_progression_level: u8,
}

impl ChapterRecord {
    /// Create a record with the given number and title.
    pub fn new(number: u32, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            summary: String::new(),
            key_events: Vec::new(),
            emotional_tone: String::new(),
            word_count: 0,
            romance_progression_level: 0,
        }
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the emotional tone.
    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.emotional_tone = tone.into();
        self
    }

    /// Set the romance progression level, clamped to 100.
    pub fn with_romance_level(mut self, level: u8) -> Self {
        self.romance_progression_level = level.min(100);
        self
    }
}

/// Front matter persisted alongside generated prose for the web front
/// end. Field names are part of the published content contract and must
/// stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterFrontMatter {
    pub title: String,
    pub novel_slug: String,
    pub chapter_number: u32,
    pub publication_date: String,
    pub word_count: u32,
    pub content_rating: String,
    pub emotional_tone: String,
    pub romance_progression_level: u8,
    /// True when the chapter passed continuity validation before commit.
    pub continuity_guaranteed: bool,
}

impl ChapterFrontMatter {
    /// Build front matter for a committed chapter.
    pub fn new(
        record: &ChapterRecord,
        slug: impl Into<String>,
        publication_date: impl Into<String>,
        content_rating: impl Into<String>,
    ) -> Self {
        Self {
            title: record.title.clone(),
            novel_slug: slug.into(),
            chapter_number: record.number,
            publication_date: publication_date.into(),
            word_count: record.word_count,
            content_rating: content_rating.into(),
            emotional_tone: record.emotional_tone.clone(),
            romance_progression_level: record.romance_progression_level,
            continuity_guaranteed: true,
        }
    }

    /// Render a complete content file: JSON front matter fenced by `---`
    /// lines, then the prose body.
    pub fn render_markdown(&self, content: &str) -> Result<String, serde_json::Error> {
        let header = serde_json::to_string_pretty(self)?;
        Ok(format!("---\n{header}\n---\n\n{content}\n"))
    }
}
