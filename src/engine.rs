//! Engine entry point
//!
//! [`ShoppingEngine`] wires the configured collaborators into the five steps,
//! creates one [`SharedState`] per request, and drives the supervisor to a
//! terminal state. `run` is infallible by design: the caller always gets the
//! final state back, `Done` or `Aborted`.

use crate::catalog::{InMemoryCatalog, ProductCatalog};
use crate::collaborators::{BuiltinInterpreter, BuiltinRecipeBook, IntentInterpreter, RecipeSource};
use crate::config::EngineConfig;
use crate::pipeline::{
    BudgetOptimizerStep, FinalizerStep, PlannerStep, ProductMapperStep, RecipeFinderStep,
};
use crate::state::{SharedState, ShoppingRequest};
use crate::supervisor::{PipelineObserver, StepSet, Supervisor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Cooperative cancellation handle. The supervisor checks it between steps;
/// a step already executing runs to completion.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builds and runs shopping pipelines. One engine serves any number of
/// concurrent requests; each `run` gets its own state and supervisor pass.
pub struct ShoppingEngine {
    config: EngineConfig,
    interpreter: Arc<dyn IntentInterpreter>,
    recipe_source: Arc<dyn RecipeSource>,
    catalog: Arc<dyn ProductCatalog>,
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl ShoppingEngine {
    /// Engine with the built-in deterministic collaborators.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            interpreter: Arc::new(BuiltinInterpreter::new()),
            recipe_source: Arc::new(BuiltinRecipeBook::new()),
            catalog: Arc::new(InMemoryCatalog::new()),
            observers: Vec::new(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: Arc<dyn IntentInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_recipe_source(mut self, source: Arc<dyn RecipeSource>) -> Self {
        self.recipe_source = source;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    fn build_steps(&self) -> StepSet {
        StepSet {
            planner: Arc::new(PlannerStep::new(self.interpreter.clone())),
            recipe_finder: Arc::new(RecipeFinderStep::new(
                self.recipe_source.clone(),
                self.config.default_people,
            )),
            product_mapper: Arc::new(ProductMapperStep::new(
                self.catalog.clone(),
                self.config.lookup_timeout,
                self.config.fallback_unit_price,
            )),
            budget_optimizer: Arc::new(BudgetOptimizerStep::new(
                self.catalog.clone(),
                self.config.lookup_timeout,
                self.config.min_quantity,
            )),
            finalizer: Arc::new(FinalizerStep::new()),
        }
    }

    /// Run one request to a terminal state.
    pub async fn run(&self, request: ShoppingRequest) -> SharedState {
        self.run_with_cancellation(request, CancelToken::new())
            .await
    }

    /// Run one request with an external cancellation handle.
    pub async fn run_with_cancellation(
        &self,
        request: ShoppingRequest,
        cancel: CancelToken,
    ) -> SharedState {
        let mut state = SharedState::new(request);
        info!(request_id = %state.id, "starting shopping pipeline");
        let supervisor = Supervisor::new(
            self.build_steps(),
            self.config.clone(),
            self.observers.clone(),
        );
        supervisor.run(&mut state, &cancel).await;
        info!(
            request_id = %state.id,
            outcome = ?state.outcome,
            total = state.estimated_total,
            "shopping pipeline finished"
        );
        state
    }
}
