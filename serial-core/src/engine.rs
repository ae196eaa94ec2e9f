//! The novel engine: the orchestration façade over store, validator,
//! prompt generator, and recorder.
//!
//! One engine serves many novels. Each chapter cycle runs under the
//! novel's advisory lease: plan, generate, parse, validate, and either
//! commit or retry with tightened constraints, up to a bounded number
//! of attempts.

use crate::generator::{ChapterGenerator, Creativity, GeneratorError};
use crate::parser::{self, ParseError};
use crate::progression::{self, PacingDirection};
use crate::prompt::{ChapterPlan, PromptConstraintGenerator};
use crate::recorder::{CommitOutcome, ContinuityChapterRecorder};
use crate::rules::RuleSet;
use crate::state::{
    ChapterRecord, CharacterRecord, Dimension, NovelMetadata, NovelStatus, StoryState,
};
use crate::store::{self, NovelInfo, NovelStore, StoreError};
use crate::validator::ConstraintValidator;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not parse generated chapter: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("generation rejected after {attempts} attempts for novel '{slug}'")]
    Rejected { slug: String, attempts: u32 },

    #[error(
        "novel '{slug}' is not ready for completion: {committed} chapters committed, {required} required"
    )]
    CompletionNotReady {
        slug: String,
        committed: u32,
        required: u32,
    },

    #[error("the engine is paused and accepting no generation work")]
    Disabled,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Generation attempts per chapter cycle before giving up.
    pub max_attempts: u32,
    /// Committed chapters required before completion may be requested.
    /// Defaults to the novel's own target minus the epilogue.
    pub completion_threshold: Option<u32>,
    /// Content rating stamped into published front matter.
    pub content_rating: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            completion_threshold: None,
            content_rating: "PG-13".to_string(),
        }
    }
}

/// Everything needed to open a new novel.
#[derive(Debug, Clone, Default)]
pub struct NovelSeed {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub target_chapters: u32,
    pub setting: String,
    pub world_rules: Vec<String>,
    pub main_arc_summary: String,
    /// Initial cast, name to record.
    pub characters: Vec<(String, CharacterRecord)>,
}

/// A freshly opened novel: its slug and the plan for chapter one.
#[derive(Debug, Clone)]
pub struct StartedNovel {
    pub slug: String,
    pub plan: ChapterPlan,
}

/// A chapter produced and committed by a full generation cycle.
#[derive(Debug, Clone)]
pub struct GeneratedChapter {
    /// The record now stored in the novel state.
    pub record: ChapterRecord,
    /// The rendered content file: front matter plus prose.
    pub rendered: String,
    /// How many generation attempts the cycle used.
    pub attempts: u32,
}

/// A snapshot of engine health for operators.
#[derive(Debug, Clone)]
pub struct SystemStatus {
    /// Whether the engine accepts generation work.
    pub enabled: bool,
    /// Novels currently in Active or Completing status.
    pub active_novels: usize,
}

/// Orchestrates the chapter pipeline for every novel under one store.
pub struct NovelEngine {
    store: NovelStore,
    validator: ConstraintValidator,
    prompts: PromptConstraintGenerator,
    recorder: ContinuityChapterRecorder,
    config: EngineConfig,
    enabled: AtomicBool,
}

impl NovelEngine {
    /// Create an engine over the given storage directory with default
    /// configuration and the built-in rule set.
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        Self::with_config(store_root, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(store_root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self {
            store: NovelStore::new(store_root),
            validator: ConstraintValidator::new(),
            prompts: PromptConstraintGenerator::new(),
            recorder: ContinuityChapterRecorder::with_content_rating(&config.content_rating),
            config,
            enabled: AtomicBool::new(true),
        }
    }

    /// Replace the rule set driving validation and constraint output.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.validator = ConstraintValidator::with_rules(rules.clone());
        self.prompts = PromptConstraintGenerator::with_rules(rules);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &NovelStore {
        &self.store
    }

    /// Pause generation work. In-flight cycles finish; new ones refuse.
    pub fn pause(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        tracing::warn!("engine paused");
    }

    /// Resume generation work.
    pub fn resume(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!("engine resumed");
    }

    /// Open a new novel and return the plan for its first chapter.
    pub async fn start_new_novel(&self, seed: NovelSeed) -> Result<StartedNovel, EngineError> {
        let slug = store::sanitize_slug(&seed.title);

        match self.store.peek_metadata(&slug).await {
            Ok(_) => {
                return Err(StoreError::Conflict { slug }.into());
            }
            Err(StoreError::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        let mut state = StoryState::new(NovelMetadata {
            title: seed.title,
            author: seed.author,
            genre: seed.genre,
            status: NovelStatus::NotStarted,
            target_chapters: seed.target_chapters.max(1),
        });
        state.world.setting = seed.setting;
        state.world.rules = seed.world_rules;
        state.plot.main_arc_summary = seed.main_arc_summary;
        for (name, record) in seed.characters {
            state.upsert_character(name, record);
        }
        state
            .advance_status(NovelStatus::Active)
            .map_err(StoreError::from)?;

        self.store.save(&slug, &state).await?;
        tracing::info!(slug, "opened new novel");

        let plan = self.prompts.prepare_next_chapter(&state);
        Ok(StartedNovel { slug, plan })
    }

    /// Build the deterministic plan for a novel's next chapter.
    ///
    /// A Completing novel gets the epilogue plan; a Completed novel
    /// refuses.
    pub async fn prepare_next_chapter(&self, slug: &str) -> Result<ChapterPlan, EngineError> {
        let state = self.store.load_existing(slug).await?;
        if state.is_closed() {
            return Err(StoreError::ClosedNovel {
                slug: slug.to_string(),
            }
            .into());
        }

        let plan = if state.metadata.status == NovelStatus::Completing {
            self.prompts.prepare_completion_chapter(&state)
        } else {
            self.prompts.prepare_next_chapter(&state)
        };
        Ok(plan)
    }

    /// Validate and commit externally produced chapter text.
    ///
    /// Holds the novel's lease for the whole parse-validate-commit
    /// sequence. An invalid draft returns [`CommitOutcome::Rejected`]
    /// rather than an error, leaving state untouched.
    pub async fn commit_chapter(
        &self,
        slug: &str,
        raw_reply: &str,
    ) -> Result<CommitOutcome, EngineError> {
        let _lease = self.store.lease(slug)?;

        let draft = parser::parse_chapter(raw_reply)?;
        let state = self.store.load_existing(slug).await?;
        let report = self.validator.validate(&draft, &state);
        let outcome = self.recorder.commit(&self.store, slug, &draft, &report).await?;
        Ok(outcome)
    }

    /// Move a novel into Completing and return the epilogue plan.
    ///
    /// Refused until enough chapters have committed. Idempotent: a
    /// novel already Completing just gets its plan again.
    pub async fn request_completion(&self, slug: &str) -> Result<ChapterPlan, EngineError> {
        let _lease = self.store.lease(slug)?;

        let mut state = self.store.load_existing(slug).await?;
        if state.is_closed() {
            return Err(StoreError::ClosedNovel {
                slug: slug.to_string(),
            }
            .into());
        }

        if state.metadata.status != NovelStatus::Completing {
            let required = self
                .config
                .completion_threshold
                .unwrap_or_else(|| state.metadata.target_chapters.saturating_sub(1));
            let committed = state.chapter_count();
            if committed < required {
                return Err(EngineError::CompletionNotReady {
                    slug: slug.to_string(),
                    committed,
                    required,
                });
            }

            state.advance_status(NovelStatus::Completing).map_err(StoreError::from)?;
            self.store.save(slug, &state).await?;
            tracing::info!(slug, committed, "novel entering completion");
        }

        Ok(self.prompts.prepare_completion_chapter(&state))
    }

    /// Run one full chapter cycle: plan, generate, parse, validate,
    /// commit, retrying with tightened constraints up to the configured
    /// attempt budget.
    pub async fn run_chapter_cycle(
        &self,
        slug: &str,
        generator: &dyn ChapterGenerator,
    ) -> Result<GeneratedChapter, EngineError> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(EngineError::Disabled);
        }

        let _lease = self.store.lease(slug)?;

        let state = self.store.load_existing(slug).await?;
        if state.is_closed() {
            return Err(StoreError::ClosedNovel {
                slug: slug.to_string(),
            }
            .into());
        }
        let completing = state.metadata.status == NovelStatus::Completing;
        let mut plan = if completing {
            self.prompts.prepare_completion_chapter(&state)
        } else {
            self.prompts.prepare_next_chapter(&state)
        };

        // A novel lagging behind its pacing line gets a bolder first
        // draft; retries always pull back to conservative.
        let lagging = progression::suggest_pacing_adjustment(
            state.next_chapter_number(),
            state.metadata.target_chapters,
            Dimension::Emotional,
            state.current_romance_level(),
        )
        .direction
            == Some(PacingDirection::SpeedUp);

        for attempt in 1..=self.config.max_attempts {
            let creativity = if attempt > 1 {
                Creativity::Conservative
            } else if lagging {
                Creativity::Bold
            } else {
                Creativity::Balanced
            };

            let reply = generator.generate(&plan.prompt, creativity).await?;
            let draft = match parser::parse_chapter(&reply) {
                Ok(draft) => draft,
                Err(err) => {
                    tracing::warn!(slug, attempt, %err, "generated reply did not parse");
                    plan.prompt.push_str(&format!(
                        "\n## Previous Attempt Rejected\n\nThe reply could not be parsed: {err}. \
                         Follow the reply format exactly.\n"
                    ));
                    continue;
                }
            };

            if completing && draft.ending_type.is_none() {
                tracing::warn!(slug, attempt, "epilogue draft missing ENDING_TYPE");
                plan.prompt.push_str(
                    "\n## Previous Attempt Rejected\n\nThe reply omitted the mandatory \
                     ENDING_TYPE field. This is the final chapter; include it.\n",
                );
                continue;
            }

            let report = self.validator.validate(&draft, &state);
            if !report.valid {
                tracing::info!(
                    slug,
                    attempt,
                    violations = report.violations.len(),
                    "draft rejected, tightening constraints"
                );
                plan = plan.with_rejection_feedback(&report);
                continue;
            }

            match self.recorder.commit(&self.store, slug, &draft, &report).await? {
                CommitOutcome::Committed { record, rendered } => {
                    return Ok(GeneratedChapter {
                        record,
                        rendered,
                        attempts: attempt,
                    });
                }
                CommitOutcome::AlreadyCommitted(record) => {
                    return Ok(GeneratedChapter {
                        record,
                        rendered: String::new(),
                        attempts: attempt,
                    });
                }
                CommitOutcome::Rejected(report) => {
                    plan = plan.with_rejection_feedback(&report);
                }
            }
        }

        Err(EngineError::Rejected {
            slug: slug.to_string(),
            attempts: self.config.max_attempts,
        })
    }

    /// List every stored novel.
    pub async fn list_novels(&self) -> Result<Vec<NovelInfo>, EngineError> {
        Ok(self.store.list_novels().await?)
    }

    /// Operator-facing health snapshot.
    pub async fn system_status(&self) -> Result<SystemStatus, EngineError> {
        Ok(SystemStatus {
            enabled: self.enabled.load(Ordering::SeqCst),
            active_novels: self.store.active_novel_count().await?,
        })
    }
}
