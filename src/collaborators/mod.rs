//! External collaborator abstractions
//!
//! The planner and recipe finder talk to replaceable collaborators through
//! these traits. The built-in implementations are deterministic keyword
//! heuristics so the pipeline runs without any external service; a real
//! deployment would swap in an LLM-backed implementation behind the same
//! traits. Mock implementations support error injection for tests.

pub mod interpreter;
pub mod recipes;

pub use interpreter::{BuiltinInterpreter, IntentInterpreter, MockInterpreter};
pub use recipes::{BuiltinRecipeBook, MockRecipeSource, RecipeSource};

use thiserror::Error;

/// Failures an external collaborator call can report.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("unparseable collaborator response: {0}")]
    InvalidResponse(String),

    #[error("no match found: {0}")]
    NotFound(String),

    #[error("collaborator call timed out")]
    Timeout,
}
