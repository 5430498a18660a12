//! Supervisor: the pipeline state machine
//!
//! Drives the fixed step sequence `Planning → RecipeLookup → ProductMapping →
//! BudgetCheck → [Optimizing] → Finalizing` over one [`SharedState`]. The
//! budget check is a pure supervisor decision, not a step. Hard step failures
//! are exceptional (steps prefer fallbacks); when one happens the supervisor
//! records it and terminates in `Aborted` with the partial state intact, so
//! the caller always receives a usable result.

pub mod events;

pub use events::{LoggingObserver, NoOpObserver, PipelineObserver, StepEvent};

use crate::config::EngineConfig;
use crate::engine::CancelToken;
use crate::pipeline::{Step, StepError};
use crate::state::{
    BudgetStatus, ErrorKind, ErrorRecord, Outcome, SharedState, StepKind, StepLogEntry, StepStatus,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Supervisor phases. `BudgetCheck` is a decision point with no step attached;
/// `Done` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Planning,
    RecipeLookup,
    ProductMapping,
    BudgetCheck,
    Optimizing,
    Finalizing,
    Done,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Aborted)
    }

    /// Next phase after the current phase's step succeeds. The conditional
    /// `BudgetCheck` edge is resolved by [`Supervisor::budget_check`]; all
    /// other edges are fixed.
    fn on_success(self) -> Phase {
        match self {
            Phase::Start => Phase::Planning,
            Phase::Planning => Phase::RecipeLookup,
            Phase::RecipeLookup => Phase::ProductMapping,
            Phase::ProductMapping => Phase::BudgetCheck,
            Phase::BudgetCheck => Phase::Finalizing,
            Phase::Optimizing => Phase::Finalizing,
            Phase::Finalizing => Phase::Done,
            Phase::Done | Phase::Aborted => self,
        }
    }
}

/// The five step implementations, injected at construction.
pub struct StepSet {
    pub planner: Arc<dyn Step>,
    pub recipe_finder: Arc<dyn Step>,
    pub product_mapper: Arc<dyn Step>,
    pub budget_optimizer: Arc<dyn Step>,
    pub finalizer: Arc<dyn Step>,
}

pub struct Supervisor {
    steps: StepSet,
    config: EngineConfig,
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl Supervisor {
    pub fn new(
        steps: StepSet,
        config: EngineConfig,
        observers: Vec<Arc<dyn PipelineObserver>>,
    ) -> Self {
        Self {
            steps,
            config,
            observers,
        }
    }

    fn step_for(&self, phase: Phase) -> Option<&Arc<dyn Step>> {
        match phase {
            Phase::Planning => Some(&self.steps.planner),
            Phase::RecipeLookup => Some(&self.steps.recipe_finder),
            Phase::ProductMapping => Some(&self.steps.product_mapper),
            Phase::Optimizing => Some(&self.steps.budget_optimizer),
            Phase::Finalizing => Some(&self.steps.finalizer),
            _ => None,
        }
    }

    /// Drive the state machine to a terminal phase. Never fails: the worst
    /// outcome is `Aborted` with partial state.
    pub async fn run(&self, state: &mut SharedState, cancel: &CancelToken) {
        let mut phase = Phase::Start;

        while !phase.is_terminal() {
            if cancel.is_cancelled() {
                info!("run cancelled before next step");
                state.push_error(ErrorRecord {
                    step: None,
                    kind: ErrorKind::Cancelled,
                    message: "request cancelled by caller".to_string(),
                    fatal: true,
                });
                phase = Phase::Aborted;
                break;
            }

            phase = match phase {
                Phase::Start => Phase::Planning,
                Phase::BudgetCheck => self.budget_check(state),
                current => {
                    let step = self
                        .step_for(current)
                        .expect("non-terminal phase without a step")
                        .clone();
                    match self.run_step(step.as_ref(), state).await {
                        Ok(()) => current.on_success(),
                        Err(()) => Phase::Aborted,
                    }
                }
            };
        }

        state.outcome = Some(match phase {
            Phase::Done => Outcome::Done,
            _ => Outcome::Aborted,
        });
    }

    /// Pure budget decision: compares the mapped total to the requested
    /// budget and picks the next phase.
    fn budget_check(&self, state: &mut SharedState) -> Phase {
        match state.request.budget {
            None => {
                state.budget_status = BudgetStatus::NoBudgetSpecified;
                debug!("no budget specified, skipping optimization");
                Phase::Finalizing
            }
            // NaN poisons every comparison below, so an unusable budget is
            // treated as absent rather than optimized against.
            Some(budget) if !budget.is_finite() || budget < 0.0 => {
                warn!(budget, "ignoring unusable budget value");
                state.budget_status = BudgetStatus::NoBudgetSpecified;
                Phase::Finalizing
            }
            Some(budget) if state.estimated_total <= budget => {
                state.budget_status = BudgetStatus::WithinBudget;
                debug!(
                    total = state.estimated_total,
                    budget, "within budget, skipping optimization"
                );
                Phase::Finalizing
            }
            Some(budget) => {
                state.budget_status = BudgetStatus::OverBudget;
                info!(
                    total = state.estimated_total,
                    budget, "over budget, optimizing"
                );
                Phase::Optimizing
            }
        }
    }

    /// Execute one step with a timeout, merge its delta, and record the
    /// attempt in the step log. `Err(())` means the run must abort.
    async fn run_step(
        &self,
        step: &dyn Step,
        state: &mut SharedState,
    ) -> Result<(), ()> {
        let kind = step.kind();
        let started = Instant::now();
        debug!(step = %kind, "executing step");

        let result = match tokio::time::timeout(self.config.step_timeout, step.execute(state)).await
        {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout(self.config.step_timeout)),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(output) => {
                let status = if output.fallback.is_some() {
                    StepStatus::FellBackToDefault
                } else {
                    StepStatus::Ok
                };
                state.apply(output.delta);
                if let Some(reason) = &output.fallback {
                    info!(step = %kind, reason = %reason, "step fell back to default");
                }
                state.push_log(StepLogEntry::new(kind, status, &output.message));
                // Optimizer shortfall is informational, not fatal.
                if kind == StepKind::BudgetOptimizer
                    && state.budget_status == BudgetStatus::OverBudget
                {
                    state.push_error(ErrorRecord {
                        step: Some(kind),
                        kind: ErrorKind::BudgetUnreachable,
                        message: "optimizer could not reach the budget target".to_string(),
                        fatal: false,
                    });
                }
                self.emit(StepEvent {
                    step: kind,
                    status,
                    elapsed,
                    message: output.message,
                })
                .await;
                Ok(())
            }
            Err(err) => {
                error!(step = %kind, error = %err, "step failed hard, aborting run");
                let message = err.to_string();
                state.push_log(StepLogEntry::new(kind, StepStatus::Failed, &message));
                state.push_error(ErrorRecord {
                    step: Some(kind),
                    kind: err.kind(),
                    message: message.clone(),
                    fatal: true,
                });
                self.emit(StepEvent {
                    step: kind,
                    status: StepStatus::Failed,
                    elapsed,
                    message,
                })
                .await;
                Err(())
            }
        }
    }

    async fn emit(&self, event: StepEvent) {
        for observer in &self.observers {
            observer.on_event(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StepOutput;
    use crate::state::{MappedItem, ShoppingRequest, StateDelta};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Step stub returning a fixed delta, a fallback, or an error.
    struct StubStep {
        kind: StepKind,
        results: Mutex<Vec<Result<StepOutput, StepError>>>,
    }

    impl StubStep {
        fn ok(kind: StepKind, delta: StateDelta) -> Arc<Self> {
            Arc::new(Self {
                kind,
                results: Mutex::new(vec![Ok(StepOutput::ok(delta, "stub"))]),
            })
        }

        fn failing(kind: StepKind, err: StepError) -> Arc<Self> {
            Arc::new(Self {
                kind,
                results: Mutex::new(vec![Err(err)]),
            })
        }
    }

    #[async_trait]
    impl Step for StubStep {
        fn kind(&self) -> StepKind {
            self.kind
        }

        async fn execute(&self, _state: &SharedState) -> Result<StepOutput, StepError> {
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(StepError::UpstreamUnavailable("exhausted stub".into())))
        }
    }

    fn sample_item(price: f64) -> MappedItem {
        MappedItem {
            ingredient: "rice".into(),
            product_name: "rice".into(),
            quantity: 1,
            unit_price: price,
            category: crate::state::Category::Staple,
            fallback_note: None,
        }
    }

    fn full_steps(item_price: f64) -> StepSet {
        StepSet {
            planner: StubStep::ok(
                StepKind::Planner,
                StateDelta::Plan(crate::state::MealPlan {
                    summary: "stub".into(),
                    recipe_hints: vec![],
                    constraints: vec![],
                }),
            ),
            recipe_finder: StubStep::ok(
                StepKind::RecipeFinder,
                StateDelta::Recipe(crate::state::Recipe {
                    name: "stub".into(),
                    ingredients: vec![],
                    servings: 4,
                    instructions: None,
                }),
            ),
            product_mapper: StubStep::ok(
                StepKind::ProductMapper,
                StateDelta::MappedItems(vec![sample_item(item_price)]),
            ),
            budget_optimizer: StubStep::ok(
                StepKind::BudgetOptimizer,
                StateDelta::OptimizedItems {
                    items: vec![],
                    notes: vec!["removed rice".into()],
                    status: BudgetStatus::WithinBudget,
                },
            ),
            finalizer: StubStep::ok(
                StepKind::Finalizer,
                StateDelta::FinalList(crate::state::FinalList {
                    lines: vec![],
                    grand_total: 0.0,
                    budget_status: BudgetStatus::NotChecked,
                    notes: vec![],
                }),
            ),
        }
    }

    async fn run_supervisor(steps: StepSet, request: ShoppingRequest) -> SharedState {
        let supervisor = Supervisor::new(steps, EngineConfig::default(), vec![]);
        let mut state = SharedState::new(request);
        supervisor.run(&mut state, &CancelToken::new()).await;
        state
    }

    #[tokio::test]
    async fn no_budget_never_enters_optimizing() {
        let state = run_supervisor(full_steps(10.0), ShoppingRequest::new("dinner")).await;
        assert_eq!(state.outcome, Some(Outcome::Done));
        assert_eq!(state.budget_status, BudgetStatus::NoBudgetSpecified);
        assert!(state
            .step_log
            .iter()
            .all(|e| e.step != StepKind::BudgetOptimizer));
        assert_eq!(state.step_log.len(), 4);
    }

    #[tokio::test]
    async fn within_budget_skips_optimizer() {
        let state = run_supervisor(
            full_steps(10.0),
            ShoppingRequest::new("dinner").with_budget(25.0),
        )
        .await;
        assert_eq!(state.outcome, Some(Outcome::Done));
        assert_eq!(state.budget_status, BudgetStatus::WithinBudget);
        assert!(state
            .step_log
            .iter()
            .all(|e| e.step != StepKind::BudgetOptimizer));
    }

    #[tokio::test]
    async fn nan_budget_is_treated_as_absent() {
        let state = run_supervisor(
            full_steps(10.0),
            ShoppingRequest::new("dinner").with_budget(f64::NAN),
        )
        .await;
        assert_eq!(state.outcome, Some(Outcome::Done));
        assert_eq!(state.budget_status, BudgetStatus::NoBudgetSpecified);
        assert!(state
            .step_log
            .iter()
            .all(|e| e.step != StepKind::BudgetOptimizer));
    }

    #[tokio::test]
    async fn negative_budget_is_treated_as_absent() {
        let state = run_supervisor(
            full_steps(10.0),
            ShoppingRequest::new("dinner").with_budget(-5.0),
        )
        .await;
        assert_eq!(state.outcome, Some(Outcome::Done));
        assert_eq!(state.budget_status, BudgetStatus::NoBudgetSpecified);
    }

    #[tokio::test]
    async fn over_budget_runs_optimizer_then_finalizes() {
        let state = run_supervisor(
            full_steps(30.0),
            ShoppingRequest::new("dinner").with_budget(25.0),
        )
        .await;
        assert_eq!(state.outcome, Some(Outcome::Done));
        assert_eq!(state.budget_status, BudgetStatus::WithinBudget);
        let steps: Vec<StepKind> = state.step_log.iter().map(|e| e.step).collect();
        assert_eq!(
            steps,
            vec![
                StepKind::Planner,
                StepKind::RecipeFinder,
                StepKind::ProductMapper,
                StepKind::BudgetOptimizer,
                StepKind::Finalizer,
            ]
        );
    }

    #[tokio::test]
    async fn hard_failure_aborts_with_partial_state() {
        let mut steps = full_steps(10.0);
        steps.recipe_finder = StubStep::failing(
            StepKind::RecipeFinder,
            StepError::UpstreamUnavailable("recipe service down".into()),
        );
        let state = run_supervisor(steps, ShoppingRequest::new("dinner")).await;
        assert_eq!(state.outcome, Some(Outcome::Aborted));
        assert!(state.plan.is_some());
        assert!(state.recipe.is_none());
        assert_eq!(state.step_log.len(), 2);
        assert_eq!(state.step_log[1].status, StepStatus::Failed);
        assert!(state.errors.iter().any(|e| e.fatal));
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_step() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let supervisor = Supervisor::new(full_steps(10.0), EngineConfig::default(), vec![]);
        let mut state = SharedState::new(ShoppingRequest::new("dinner"));
        supervisor.run(&mut state, &cancel).await;
        assert_eq!(state.outcome, Some(Outcome::Aborted));
        assert!(state.step_log.is_empty());
        assert!(state
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn step_timeout_becomes_timeout_failure() {
        struct SlowStep;

        #[async_trait]
        impl Step for SlowStep {
            fn kind(&self) -> StepKind {
                StepKind::Planner
            }

            async fn execute(&self, _state: &SharedState) -> Result<StepOutput, StepError> {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                unreachable!("timeout should fire first")
            }
        }

        let mut steps = full_steps(10.0);
        steps.planner = Arc::new(SlowStep);
        let config = EngineConfig {
            step_timeout: std::time::Duration::from_millis(50),
            ..EngineConfig::default()
        };
        let supervisor = Supervisor::new(steps, config, vec![]);
        let mut state = SharedState::new(ShoppingRequest::new("dinner"));
        supervisor.run(&mut state, &CancelToken::new()).await;
        assert_eq!(state.outcome, Some(Outcome::Aborted));
        assert!(state
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::Timeout && e.fatal));
    }
}
