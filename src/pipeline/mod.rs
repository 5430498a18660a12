//! Pipeline step contract and the five step implementations
//!
//! Every step consumes the shared state read-only and returns either a
//! [`StepOutput`] (a delta plus an optional fallback marker) or a
//! [`StepError`]. Steps prefer substituting a safe built-in default over
//! failing hard; a hard failure is exceptional and causes the supervisor to
//! abort the run with the partial state.

pub mod finalizer;
pub mod optimizer;
pub mod planner;
pub mod products;
pub mod recipe;

pub use finalizer::FinalizerStep;
pub use optimizer::BudgetOptimizerStep;
pub use planner::PlannerStep;
pub use products::ProductMapperStep;
pub use recipe::RecipeFinderStep;

use crate::catalog::CatalogError;
use crate::collaborators::SourceError;
use crate::state::{ErrorKind, SharedState, StateDelta, StepKind};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// A hard step failure the step chose not to absorb with a fallback.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            StepError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            StepError::NotFound(_) => ErrorKind::NotFound,
            StepError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

impl From<SourceError> for StepError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(msg) => StepError::UpstreamUnavailable(msg),
            SourceError::InvalidResponse(msg) => StepError::InvalidResponse(msg),
            SourceError::NotFound(msg) => StepError::NotFound(msg),
            SourceError::Timeout => StepError::Timeout(Duration::ZERO),
        }
    }
}

impl From<CatalogError> for StepError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(msg) => StepError::UpstreamUnavailable(msg),
            CatalogError::Timeout => StepError::Timeout(Duration::ZERO),
        }
    }
}

/// Successful step result: the delta to merge plus log metadata.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub delta: StateDelta,
    /// Set when the step substituted a built-in default for a failed lookup;
    /// the supervisor logs the invocation as `FellBackToDefault`.
    pub fallback: Option<String>,
    /// Human-readable progress message for the step log
    pub message: String,
}

impl StepOutput {
    pub fn ok(delta: StateDelta, message: impl Into<String>) -> Self {
        Self {
            delta,
            fallback: None,
            message: message.into(),
        }
    }

    pub fn fell_back(
        delta: StateDelta,
        message: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            delta,
            fallback: Some(reason.into()),
            message: message.into(),
        }
    }
}

/// One pipeline stage. Implementations must not mutate anything outside the
/// returned delta and must be idempotent with respect to re-invocation on the
/// same state.
#[async_trait]
pub trait Step: Send + Sync {
    fn kind(&self) -> StepKind;

    async fn execute(&self, state: &SharedState) -> Result<StepOutput, StepError>;
}
