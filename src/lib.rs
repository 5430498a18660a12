//! # Cartful
//!
//! Turns a free-text grocery request into a priced, budget-constrained
//! shopping list by running a fixed pipeline of specialized steps over a
//! shared state record. The interesting part is the orchestration engine:
//! one [`state::SharedState`] per request, a supervisor that sequences the
//! five steps (with a conditional budget-optimization branch), and a
//! fallback-preferred failure policy that always hands back a usable result.
//!
//! ## Modules
//!
//! - `catalog` - Read-only product lookup (trait, built-in table, mock)
//! - `collaborators` - Intent and recipe collaborators behind injectable traits
//! - `config` - Engine configuration with TOML loading
//! - `engine` - Entry point: `ShoppingEngine::run(request) -> SharedState`
//! - `pipeline` - Step contract and the five step implementations
//! - `state` - The shared state model and its invariants
//! - `supervisor` - The step-sequencing state machine and event stream

pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod supervisor;

pub use engine::{CancelToken, ShoppingEngine};
pub use error::{Error, Result};
pub use state::{SharedState, ShoppingRequest};
