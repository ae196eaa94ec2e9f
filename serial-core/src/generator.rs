//! The generation collaborator boundary.
//!
//! The engine never talks to an LLM directly; it hands a prompt to a
//! [`ChapterGenerator`] and parses whatever text comes back. Concrete
//! clients live outside this crate. [`crate::testing::MockGenerator`]
//! provides a scripted implementation for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the generation collaborator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generation collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("generation collaborator refused the request: {0}")]
    Refused(String),
}

/// How adventurous the collaborator should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Creativity {
    /// Stay close to the constraints; used on retries.
    Conservative,
    /// The normal setting.
    #[default]
    Balanced,
    /// Wider swings; used when pacing has fallen behind.
    Bold,
}

impl Creativity {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Creativity::Conservative => "conservative",
            Creativity::Balanced => "balanced",
            Creativity::Bold => "bold",
        }
    }
}

/// An external collaborator that turns a prompt into raw chapter text
/// in the `FIELD_NAME: value` reply format.
#[async_trait]
pub trait ChapterGenerator: Send + Sync {
    /// Generate one chapter draft for the given prompt.
    async fn generate(&self, prompt: &str, creativity: Creativity)
        -> Result<String, GeneratorError>;
}
