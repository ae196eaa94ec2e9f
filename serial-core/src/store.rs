//! Durable per-novel state storage.
//!
//! One JSON document per novel slug, wrapped in a versioned envelope.
//! Saves are atomic whole-record replaces: the document is written to a
//! temp file in the same directory and renamed over the target, so a
//! crash mid-write never leaves a half-updated record. A per-slug
//! advisory lease makes the one-in-flight-commit-per-novel invariant
//! enforceable.

use crate::state::{NovelMetadata, NovelStatus, StateError, StoryState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid state: {0}")]
    Validation(#[from] StateError),

    #[error("no novel found for slug '{slug}'")]
    NotFound { slug: String },

    #[error("a chapter cycle is already in flight for slug '{slug}'")]
    Conflict { slug: String },

    #[error("novel '{slug}' is completed and accepts no further writes")]
    ClosedNovel { slug: String },

    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save document version.
const SAVE_VERSION: u32 = 1;

/// The persisted envelope around a novel's story state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedNovel {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was written.
    pub saved_at: String,

    /// Novel metadata, duplicated from the state for peek access.
    pub metadata: NovelMetadata,

    /// The complete story state.
    pub state: StoryState,
}

impl SavedNovel {
    /// Wrap a state for persistence.
    pub fn new(state: StoryState) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: timestamp_now(),
            metadata: state.metadata.clone(),
            state,
        }
    }
}

/// A held per-slug lease. Dropping it releases the slug.
#[derive(Debug)]
pub struct NovelLease {
    _guard: OwnedMutexGuard<()>,
}

/// Summary of one stored novel.
#[derive(Debug, Clone)]
pub struct NovelInfo {
    /// Slug the novel is keyed by.
    pub slug: String,
    /// Peeked metadata.
    pub metadata: NovelMetadata,
}

/// Keyed JSON-document store for novel states.
pub struct NovelStore {
    root: PathBuf,
    leases: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NovelStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            leases: StdMutex::new(HashMap::new()),
        }
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_slug(slug)))
    }

    /// Acquire the advisory lease for a slug, failing fast if another
    /// chapter cycle already holds it.
    pub fn lease(&self, slug: &str) -> Result<NovelLease, StoreError> {
        let entry = {
            let mut leases = self
                .leases
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            leases
                .entry(slug.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        entry
            .try_lock_owned()
            .map(|guard| NovelLease { _guard: guard })
            .map_err(|_| StoreError::Conflict {
                slug: slug.to_string(),
            })
    }

    /// Load a novel's state, defaulting to an empty record when no
    /// document exists for the slug yet.
    pub async fn load(&self, slug: &str) -> Result<StoryState, StoreError> {
        match self.load_existing(slug).await {
            Ok(state) => Ok(state),
            Err(StoreError::NotFound { .. }) => Ok(StoryState::default()),
            Err(err) => Err(err),
        }
    }

    /// Load a novel's state, raising `NotFound` for an unknown slug.
    pub async fn load_existing(&self, slug: &str) -> Result<StoryState, StoreError> {
        let path = self.path_for(slug);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    slug: slug.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let saved: SavedNovel = serde_json::from_str(&content)?;
        if saved.version != SAVE_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved.state)
    }

    /// Atomically replace a novel's persisted state.
    ///
    /// The state is schema-checked first so a broken record never
    /// reaches disk.
    pub async fn save(&self, slug: &str, state: &StoryState) -> Result<(), StoreError> {
        state.validate_schema()?;

        fs::create_dir_all(&self.root).await?;
        let path = self.path_for(slug);
        let tmp = path.with_extension("json.tmp");

        let saved = SavedNovel::new(state.clone());
        let content = serde_json::to_string_pretty(&saved)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(
            slug,
            chapters = state.chapter_count(),
            status = state.metadata.status.name(),
            "saved novel state"
        );
        Ok(())
    }

    /// Insert or replace a character record on an existing novel.
    pub async fn upsert_character(
        &self,
        slug: &str,
        name: &str,
        record: crate::state::CharacterRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.load_existing(slug).await?;
        state.upsert_character(name, record);
        self.save(slug, &state).await
    }

    /// Append a chapter to an existing novel, enforcing closure and
    /// contiguity, and persist the result.
    pub async fn append_chapter(
        &self,
        slug: &str,
        record: crate::state::ChapterRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.load_existing(slug).await?;
        if state.is_closed() {
            return Err(StoreError::ClosedNovel {
                slug: slug.to_string(),
            });
        }
        state.append_chapter(record)?;
        self.save(slug, &state).await
    }

    /// Read a novel's metadata without loading the full state.
    pub async fn peek_metadata(&self, slug: &str) -> Result<NovelMetadata, StoreError> {
        let path = self.path_for(slug);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    slug: slug.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: NovelMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        if partial.version != SAVE_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }

    /// List all stored novels with their metadata.
    pub async fn list_novels(&self) -> Result<Vec<NovelInfo>, StoreError> {
        let mut novels = Vec::new();

        if !self.root.exists() {
            return Ok(novels);
        }

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let slug = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                if let Ok(metadata) = self.peek_metadata(&slug).await {
                    novels.push(NovelInfo { slug, metadata });
                }
            }
        }

        novels.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(novels)
    }

    /// Count novels currently accepting chapters.
    pub async fn active_novel_count(&self) -> Result<usize, StoreError> {
        let novels = self.list_novels().await?;
        Ok(novels
            .iter()
            .filter(|n| {
                matches!(
                    n.metadata.status,
                    NovelStatus::Active | NovelStatus::Completing
                )
            })
            .count())
    }
}

/// Turn a free-form title or slug into a safe file stem.
pub fn sanitize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_dash = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Current timestamp as unix seconds. Kept as a string so the save
/// format does not depend on a date-time crate.
pub fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}
