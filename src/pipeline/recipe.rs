//! Recipe finder step: plan to selected recipe with ingredient list

use super::{Step, StepError, StepOutput};
use crate::collaborators::{recipes, RecipeSource};
use crate::state::{SharedState, StateDelta, StepKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub struct RecipeFinderStep {
    source: Arc<dyn RecipeSource>,
    default_people: u32,
}

impl RecipeFinderStep {
    pub fn new(source: Arc<dyn RecipeSource>, default_people: u32) -> Self {
        Self {
            source,
            default_people,
        }
    }
}

#[async_trait]
impl Step for RecipeFinderStep {
    fn kind(&self) -> StepKind {
        StepKind::RecipeFinder
    }

    async fn execute(&self, state: &SharedState) -> Result<StepOutput, StepError> {
        let plan = state
            .plan
            .as_ref()
            .ok_or_else(|| StepError::InvalidResponse("no plan available".into()))?;

        match self.source.find_recipe(plan, &state.request).await {
            Ok(recipe) => {
                let message = format!(
                    "recipe found: {} with {} ingredients",
                    recipe.name,
                    recipe.ingredients.len()
                );
                Ok(StepOutput::ok(StateDelta::Recipe(recipe), message))
            }
            Err(err) => {
                warn!(error = %err, "recipe lookup failed, using generic staples");
                let servings = state.request.people.unwrap_or(self.default_people);
                let recipe = recipes::generic_staples(servings);
                let message = format!("generic recipe substituted: {}", recipe.name);
                Ok(StepOutput::fell_back(
                    StateDelta::Recipe(recipe),
                    message,
                    err.to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{BuiltinRecipeBook, MockRecipeSource, SourceError};
    use crate::state::{MealPlan, ShoppingRequest};

    fn planned_state(text: &str) -> SharedState {
        let mut state = SharedState::new(ShoppingRequest::new(text));
        state.plan = Some(MealPlan {
            summary: text.into(),
            recipe_hints: vec![],
            constraints: vec![],
        });
        state
    }

    #[tokio::test]
    async fn finds_recipe_from_book() {
        let step = RecipeFinderStep::new(Arc::new(BuiltinRecipeBook::new()), 4);
        let state = planned_state("spaghetti dinner");
        let output = step.execute(&state).await.unwrap();
        assert!(output.fallback.is_none());
        let StateDelta::Recipe(recipe) = output.delta else {
            panic!("expected recipe delta");
        };
        assert_eq!(recipe.name, "Spaghetti Bolognese");
    }

    #[tokio::test]
    async fn not_found_falls_back_to_generic_staples() {
        let mock = MockRecipeSource::new();
        mock.add_response(Err(SourceError::NotFound("no such dish".into())));
        let step = RecipeFinderStep::new(Arc::new(mock), 4);
        let state = planned_state("something exotic");
        let output = step.execute(&state).await.unwrap();
        assert!(output.fallback.is_some());
        let StateDelta::Recipe(recipe) = output.delta else {
            panic!("expected recipe delta");
        };
        assert_eq!(recipe.name, "Pantry Staples");
        assert_eq!(recipe.servings, 4);
    }

    #[tokio::test]
    async fn fallback_recipe_uses_requested_people_count() {
        let mock = MockRecipeSource::new();
        mock.add_response(Err(SourceError::Timeout));
        let step = RecipeFinderStep::new(Arc::new(mock), 4);
        let mut state = planned_state("mystery meal");
        state.request.people = Some(6);
        let output = step.execute(&state).await.unwrap();
        let StateDelta::Recipe(recipe) = output.delta else {
            panic!("expected recipe delta");
        };
        assert_eq!(recipe.servings, 6);
    }
}
