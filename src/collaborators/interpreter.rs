//! Intent interpretation collaborator

use super::SourceError;
use crate::state::{MealPlan, ShoppingRequest};
use async_trait::async_trait;
use std::sync::Mutex;

/// Extracts structured intent from the raw request text.
#[async_trait]
pub trait IntentInterpreter: Send + Sync {
    async fn interpret(&self, request: &ShoppingRequest) -> Result<MealPlan, SourceError>;
}

const DISH_KEYWORDS: &[&str] = &[
    "spaghetti",
    "bolognese",
    "pasta",
    "taco",
    "stir fry",
    "stir-fry",
    "salad",
    "curry",
    "soup",
    "pizza",
    "breakfast",
];

const CUISINE_KEYWORDS: &[&str] = &["italian", "mexican", "asian", "indian", "greek"];

/// Deterministic keyword-based interpreter.
pub struct BuiltinInterpreter;

impl BuiltinInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BuiltinInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentInterpreter for BuiltinInterpreter {
    async fn interpret(&self, request: &ShoppingRequest) -> Result<MealPlan, SourceError> {
        let text = request.raw_text.to_lowercase();

        let mut recipe_hints: Vec<String> = DISH_KEYWORDS
            .iter()
            .filter(|k| text.contains(*k))
            .map(|k| k.to_string())
            .collect();
        if let Some(cuisine) = &request.cuisine {
            recipe_hints.push(cuisine.to_lowercase());
        } else if let Some(cuisine) = CUISINE_KEYWORDS.iter().find(|k| text.contains(*k)) {
            recipe_hints.push(cuisine.to_string());
        }

        let mut constraints = Vec::new();
        for diet in ["vegetarian", "vegan", "gluten-free", "dairy-free"] {
            if text.contains(diet) {
                constraints.push(diet.to_string());
            }
        }
        if let Some(budget) = request.budget {
            constraints.push(format!("budget ${budget:.2}"));
        }
        if let Some(people) = request.people {
            constraints.push(format!("serves {people}"));
        }

        let summary = if recipe_hints.is_empty() {
            format!("general grocery run: {}", request.raw_text.trim())
        } else {
            format!("meal shopping for: {}", recipe_hints.join(", "))
        };

        Ok(MealPlan {
            summary,
            recipe_hints,
            constraints,
        })
    }
}

/// Mock interpreter returning queued results.
pub struct MockInterpreter {
    responses: Mutex<Vec<Result<MealPlan, SourceError>>>,
}

impl MockInterpreter {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
        }
    }

    pub fn add_response(&self, response: Result<MealPlan, SourceError>) {
        self.responses.lock().unwrap().push(response);
    }
}

impl Default for MockInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentInterpreter for MockInterpreter {
    async fn interpret(&self, _request: &ShoppingRequest) -> Result<MealPlan, SourceError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(SourceError::Unavailable("no mock response queued".into())))
    }
}
