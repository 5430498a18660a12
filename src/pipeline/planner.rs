//! Planner step: raw request text to structured intent

use super::{Step, StepError, StepOutput};
use crate::collaborators::IntentInterpreter;
use crate::state::{MealPlan, SharedState, StateDelta, StepKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub struct PlannerStep {
    interpreter: Arc<dyn IntentInterpreter>,
}

impl PlannerStep {
    pub fn new(interpreter: Arc<dyn IntentInterpreter>) -> Self {
        Self { interpreter }
    }

    fn generic_plan(state: &SharedState) -> MealPlan {
        let mut constraints = Vec::new();
        if let Some(budget) = state.request.budget {
            constraints.push(format!("budget ${budget:.2}"));
        }
        MealPlan {
            summary: format!("general grocery run: {}", state.request.raw_text.trim()),
            recipe_hints: Vec::new(),
            constraints,
        }
    }
}

#[async_trait]
impl Step for PlannerStep {
    fn kind(&self) -> StepKind {
        StepKind::Planner
    }

    async fn execute(&self, state: &SharedState) -> Result<StepOutput, StepError> {
        match self.interpreter.interpret(&state.request).await {
            Ok(plan) => {
                let message = format!("plan created: {}", plan.summary);
                Ok(StepOutput::ok(StateDelta::Plan(plan), message))
            }
            Err(err) => {
                warn!(error = %err, "intent interpretation failed, using generic plan");
                let plan = Self::generic_plan(state);
                Ok(StepOutput::fell_back(
                    StateDelta::Plan(plan),
                    "generic plan substituted for failed interpretation",
                    err.to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{BuiltinInterpreter, MockInterpreter, SourceError};
    use crate::state::ShoppingRequest;

    #[tokio::test]
    async fn produces_plan_delta_on_success() {
        let step = PlannerStep::new(Arc::new(BuiltinInterpreter::new()));
        let state = SharedState::new(ShoppingRequest::new("taco night"));
        let output = step.execute(&state).await.unwrap();
        assert!(output.fallback.is_none());
        assert!(matches!(output.delta, StateDelta::Plan(_)));
    }

    #[tokio::test]
    async fn falls_back_to_generic_plan_on_interpreter_failure() {
        let mock = MockInterpreter::new();
        mock.add_response(Err(SourceError::Unavailable("service down".into())));
        let step = PlannerStep::new(Arc::new(mock));
        let state = SharedState::new(ShoppingRequest::new("taco night").with_budget(20.0));
        let output = step.execute(&state).await.unwrap();
        assert!(output.fallback.is_some());
        let StateDelta::Plan(plan) = output.delta else {
            panic!("expected plan delta");
        };
        assert!(plan.summary.contains("taco night"));
        assert!(plan.constraints.iter().any(|c| c.contains("$20.00")));
    }
}
