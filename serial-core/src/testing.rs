//! Test doubles and harness helpers.
//!
//! [`MockGenerator`] stands in for the generation collaborator with a
//! scripted sequence of replies, so engine behavior can be exercised
//! deterministically and without network access.

use crate::engine::{EngineConfig, NovelEngine, NovelSeed};
use crate::generator::{ChapterGenerator, Creativity, GeneratorError};
use crate::state::CharacterRecord;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

/// A scripted generation collaborator.
///
/// Replies are returned in order; a call past the end of the script
/// fails with [`GeneratorError::Unavailable`]. Every prompt received is
/// recorded for assertions.
pub struct MockGenerator {
    replies: Vec<String>,
    index: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
    creativities: Mutex<Vec<Creativity>>,
}

impl MockGenerator {
    /// Create a generator that plays back the given replies in order.
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            index: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
            creativities: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Every creativity setting received so far, in call order.
    pub fn creativities(&self) -> Vec<Creativity> {
        self.creativities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// How many times the generator was called.
    pub fn call_count(&self) -> usize {
        *self
            .index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChapterGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        creativity: Creativity,
    ) -> Result<String, GeneratorError> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());
        self.creativities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(creativity);

        let mut index = self
            .index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let reply = self
            .replies
            .get(*index)
            .cloned()
            .ok_or_else(|| GeneratorError::Unavailable("mock script exhausted".to_string()))?;
        *index += 1;
        Ok(reply)
    }
}

/// Build a well-formed chapter reply mentioning only the stock cast
/// from [`sample_seed`].
pub fn chapter_reply(number: u32, title: &str, romance_level: u8) -> String {
    format!(
        "CHAPTER_NUMBER: {number}\n\
         TITLE: {title}\n\
         EMOTIONAL_TONE: tense\n\
         KEY_EVENTS: the wall holds through the night\n\
         ROMANCE_LEVEL: {romance_level}\n\
         EMOTIONAL_DELTA: 4\n\
         PLOT_DELTA: 5\n\
         CONTENT:\n\
         The storm pressed hard against the walls that night. From the \
         rampart Aria counted the watchfires, and beside her Kael said \
         nothing at all. The wind carried rain and the smell of cold iron.\n"
    )
}

/// The stock seed used across the test suites: two registered
/// characters, a twenty-chapter target.
pub fn sample_seed() -> NovelSeed {
    NovelSeed {
        title: "Storm and Silk".to_string(),
        author: "A. Veil".to_string(),
        genre: "romantasy".to_string(),
        target_chapters: 20,
        setting: "A storm-locked border province.".to_string(),
        world_rules: vec!["storm magic drains its wielder".to_string()],
        main_arc_summary: "Aria must hold the border while falling for her rival.".to_string(),
        characters: vec![
            (
                "Aria".to_string(),
                CharacterRecord::new("protagonist").with_alias("the Stormcaller"),
            ),
            ("Kael".to_string(), CharacterRecord::new("love interest")),
        ],
    }
}

/// An engine wired to a caller-owned storage directory, plus the slug
/// of one pre-seeded novel.
pub struct TestHarness {
    pub engine: NovelEngine,
    pub slug: String,
}

impl TestHarness {
    /// Create an engine over `root` and open the stock novel in it.
    pub async fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, EngineConfig::default()).await
    }

    /// Same, with explicit engine configuration.
    pub async fn with_config(root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        let engine = NovelEngine::with_config(root, config);
        let started = engine
            .start_new_novel(sample_seed())
            .await
            .expect("harness seed novel should open");
        Self {
            engine,
            slug: started.slug,
        }
    }

    /// Run one cycle with a single scripted reply, asserting it commits.
    pub async fn commit_reply(&self, reply: String) -> crate::engine::GeneratedChapter {
        let generator = MockGenerator::new(vec![reply]);
        self.engine
            .run_chapter_cycle(&self.slug, &generator)
            .await
            .expect("scripted reply should commit")
    }

    /// The current persisted state of the harness novel.
    pub async fn state(&self) -> crate::state::StoryState {
        self.engine
            .store()
            .load_existing(&self.slug)
            .await
            .expect("harness novel should load")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generator_plays_script_in_order() {
        let generator = MockGenerator::new(vec!["one".to_string(), "two".to_string()]);

        assert_eq!(
            generator.generate("p1", Creativity::Balanced).await.unwrap(),
            "one"
        );
        assert_eq!(
            generator
                .generate("p2", Creativity::Conservative)
                .await
                .unwrap(),
            "two"
        );
        assert!(matches!(
            generator.generate("p3", Creativity::Balanced).await,
            Err(GeneratorError::Unavailable(_))
        ));

        assert_eq!(generator.prompts(), vec!["p1", "p2"]);
        assert_eq!(
            generator.creativities(),
            vec![Creativity::Balanced, Creativity::Conservative]
        );
        assert_eq!(generator.call_count(), 2);
    }

    #[test]
    fn test_chapter_reply_parses() {
        let draft = crate::parser::parse_chapter(&chapter_reply(1, "Arrival", 5)).unwrap();
        assert_eq!(draft.number, Some(1));
        assert_eq!(draft.romance_level, Some(5));
        assert!(draft.content.contains("Aria"));
    }
}
