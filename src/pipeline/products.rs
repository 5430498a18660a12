//! Product mapper step: ingredients to priced store products
//!
//! Each catalog lookup is bounded by a per-call timeout and falls back
//! per line: a failed or missing lookup yields an estimated-price line
//! instead of failing the step, so one bad ingredient never spoils the list.

use super::{Step, StepError, StepOutput};
use crate::catalog::ProductCatalog;
use crate::state::{Category, Ingredient, MappedItem, SharedState, StateDelta, StepKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct ProductMapperStep {
    catalog: Arc<dyn ProductCatalog>,
    lookup_timeout: Duration,
    fallback_unit_price: f64,
}

impl ProductMapperStep {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        lookup_timeout: Duration,
        fallback_unit_price: f64,
    ) -> Self {
        Self {
            catalog,
            lookup_timeout,
            fallback_unit_price,
        }
    }

    fn fallback_item(&self, ingredient: &Ingredient, reason: &str) -> MappedItem {
        MappedItem {
            ingredient: ingredient.name.clone(),
            product_name: format!("{} (estimated)", ingredient.name),
            quantity: ingredient.quantity,
            unit_price: self.fallback_unit_price,
            category: ingredient.category.unwrap_or(Category::Pantry),
            fallback_note: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl Step for ProductMapperStep {
    fn kind(&self) -> StepKind {
        StepKind::ProductMapper
    }

    async fn execute(&self, state: &SharedState) -> Result<StepOutput, StepError> {
        let recipe = state
            .recipe
            .as_ref()
            .ok_or_else(|| StepError::NotFound("no recipe to map ingredients from".into()))?;
        if recipe.ingredients.is_empty() {
            return Err(StepError::NotFound("recipe has no ingredients".into()));
        }

        let mut items = Vec::with_capacity(recipe.ingredients.len());
        let mut fallback_lines = 0usize;

        for ingredient in &recipe.ingredients {
            let lookup = tokio::time::timeout(
                self.lookup_timeout,
                self.catalog.find_product(&ingredient.name, ingredient.category),
            )
            .await;

            let item = match lookup {
                Ok(Ok(Some(product))) => MappedItem {
                    ingredient: ingredient.name.clone(),
                    product_name: product.name,
                    quantity: ingredient.quantity,
                    unit_price: product.unit_price,
                    category: product.category,
                    fallback_note: None,
                },
                Ok(Ok(None)) => {
                    fallback_lines += 1;
                    self.fallback_item(ingredient, "no catalog match, estimated price")
                }
                Ok(Err(err)) => {
                    warn!(ingredient = %ingredient.name, error = %err, "catalog lookup failed");
                    fallback_lines += 1;
                    self.fallback_item(ingredient, &format!("lookup failed ({err}), estimated price"))
                }
                Err(_) => {
                    warn!(ingredient = %ingredient.name, "catalog lookup timed out");
                    fallback_lines += 1;
                    self.fallback_item(ingredient, "lookup timed out, estimated price")
                }
            };
            items.push(item);
        }

        let message = format!("mapped {} products", items.len());
        if fallback_lines > 0 {
            let reason = format!(
                "{fallback_lines} of {} lines used estimated prices",
                items.len()
            );
            Ok(StepOutput::fell_back(
                StateDelta::MappedItems(items),
                message,
                reason,
            ))
        } else {
            Ok(StepOutput::ok(StateDelta::MappedItems(items), message))
        }
    }
}
