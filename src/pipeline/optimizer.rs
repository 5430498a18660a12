//! Budget optimizer step
//!
//! Greedy, deterministic reduction of the mapped list toward the budget.
//! Items are ranked once by removability (garnishes first, proteins and
//! staples last), ties broken by descending unit price and then original
//! position. For each ranked item the optimizer tries, in order: a cheaper
//! same-category substitute, quantity reduction toward the configured
//! minimum, and finally dropping the item. Rank-0 staples and proteins
//! anchor the meal and are never dropped. The step always
//! succeeds; an unreachable budget is reported as a shortfall note with the
//! status left `OverBudget`.

use super::{Step, StepError, StepOutput};
use crate::catalog::{Product, ProductCatalog};
use crate::state::{
    round_cents, BudgetStatus, MappedItem, SharedState, StateDelta, StepKind,
};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct BudgetOptimizerStep {
    catalog: Arc<dyn ProductCatalog>,
    lookup_timeout: Duration,
    min_quantity: u32,
}

impl BudgetOptimizerStep {
    pub fn new(catalog: Arc<dyn ProductCatalog>, lookup_timeout: Duration, min_quantity: u32) -> Self {
        Self {
            catalog,
            lookup_timeout,
            min_quantity,
        }
    }

    async fn find_substitute(&self, item: &MappedItem) -> Option<Product> {
        let product = Product {
            name: item.product_name.clone(),
            unit_price: item.unit_price,
            category: item.category,
        };
        match tokio::time::timeout(self.lookup_timeout, self.catalog.cheaper_alternative(&product))
            .await
        {
            Ok(Ok(Some(alt))) if alt.unit_price < item.unit_price => Some(alt),
            // A failed alternative lookup just means no substitution is
            // available; the optimizer must not fail over it.
            _ => None,
        }
    }
}

fn list_total(items: &[MappedItem], removed: &[bool]) -> f64 {
    let total: f64 = items
        .iter()
        .zip(removed)
        .filter(|(_, gone)| !**gone)
        .map(|(item, _)| item.line_total())
        .sum();
    round_cents(total)
}

/// Removability-first ranking over item indices; stable and deterministic.
fn removal_order(items: &[MappedItem]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        let (ia, ib) = (&items[a], &items[b]);
        ib.category
            .removability()
            .cmp(&ia.category.removability())
            .then(
                ib.unit_price
                    .partial_cmp(&ia.unit_price)
                    .unwrap_or(Ordering::Equal),
            )
            .then(a.cmp(&b))
    });
    order
}

#[async_trait]
impl Step for BudgetOptimizerStep {
    fn kind(&self) -> StepKind {
        StepKind::BudgetOptimizer
    }

    async fn execute(&self, state: &SharedState) -> Result<StepOutput, StepError> {
        let mut items = state.active_items().to_vec();
        let Some(budget) = state.request.budget else {
            // The supervisor only routes here when a budget exists; treat a
            // missing one as a no-op rather than a failure.
            debug_assert!(false, "optimizer invoked without a budget");
            return Ok(StepOutput::ok(
                StateDelta::OptimizedItems {
                    items,
                    notes: Vec::new(),
                    status: state.budget_status,
                },
                "no budget to optimize against",
            ));
        };

        let mut removed = vec![false; items.len()];
        let original_total = list_total(&items, &removed);
        let mut current = original_total;
        let mut notes = Vec::new();

        if current <= budget {
            // Already under budget: re-running the optimizer is a no-op.
            return Ok(StepOutput::ok(
                StateDelta::OptimizedItems {
                    items,
                    notes,
                    status: BudgetStatus::WithinBudget,
                },
                format!("list already within budget (${current:.2} <= ${budget:.2})"),
            ));
        }

        for idx in removal_order(&items) {
            if current <= budget {
                break;
            }

            // (a) cheaper same-category substitute
            if let Some(alt) = self.find_substitute(&items[idx]).await {
                let savings = round_cents(
                    (items[idx].unit_price - alt.unit_price) * f64::from(items[idx].quantity),
                );
                notes.push(format!(
                    "substituted {} for {} (saves ${savings:.2})",
                    alt.name, items[idx].product_name
                ));
                items[idx].product_name = alt.name;
                items[idx].unit_price = alt.unit_price;
                current = list_total(&items, &removed);
                if current <= budget {
                    break;
                }
            }

            // (b) reduce quantity toward the minimum
            let before = items[idx].quantity;
            while current > budget && items[idx].quantity > self.min_quantity {
                items[idx].quantity -= 1;
                current = list_total(&items, &removed);
            }
            if items[idx].quantity < before {
                notes.push(format!(
                    "reduced {} from {before} to {}",
                    items[idx].product_name, items[idx].quantity
                ));
            }

            // (c) drop the item, unless it anchors the meal
            if current > budget && items[idx].category.removability() > 0 {
                notes.push(format!(
                    "removed {} (${:.2}) for budget",
                    items[idx].product_name,
                    items[idx].line_total()
                ));
                removed[idx] = true;
                current = list_total(&items, &removed);
            }
        }

        let status = if current <= budget {
            BudgetStatus::WithinBudget
        } else {
            let shortfall = round_cents(current - budget);
            notes.push(format!(
                "still ${shortfall:.2} over budget; no further reductions available"
            ));
            BudgetStatus::OverBudget
        };

        let kept: Vec<MappedItem> = items
            .into_iter()
            .zip(removed)
            .filter(|(_, gone)| !*gone)
            .map(|(item, _)| item)
            .collect();

        debug!(
            original = original_total,
            optimized = current,
            removed = notes.len(),
            "budget optimization complete"
        );

        Ok(StepOutput::ok(
            StateDelta::OptimizedItems {
                items: kept,
                notes,
                status,
            },
            format!("optimized list: ${current:.2} (was ${original_total:.2})"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockCatalog;
    use crate::state::{Category, MealPlan, Recipe, ShoppingRequest};

    fn item(name: &str, qty: u32, price: f64, category: Category) -> MappedItem {
        MappedItem {
            ingredient: name.to_string(),
            product_name: name.to_string(),
            quantity: qty,
            unit_price: price,
            category,
            fallback_note: None,
        }
    }

    fn state_with_items(items: Vec<MappedItem>, budget: f64) -> SharedState {
        let mut state = SharedState::new(ShoppingRequest::new("dinner").with_budget(budget));
        state.plan = Some(MealPlan {
            summary: "dinner".into(),
            recipe_hints: vec![],
            constraints: vec![],
        });
        state.recipe = Some(Recipe {
            name: "Test".into(),
            ingredients: vec![],
            servings: 4,
            instructions: None,
        });
        state.mapped_items = items;
        state.recompute_total();
        state
    }

    fn optimizer() -> BudgetOptimizerStep {
        BudgetOptimizerStep::new(Arc::new(MockCatalog::new()), Duration::from_secs(1), 1)
    }

    async fn run(step: &BudgetOptimizerStep, state: &SharedState) -> (Vec<MappedItem>, Vec<String>, BudgetStatus) {
        let output = step.execute(state).await.unwrap();
        let StateDelta::OptimizedItems {
            items,
            notes,
            status,
        } = output.delta
        else {
            panic!("expected optimized items delta");
        };
        (items, notes, status)
    }

    #[tokio::test]
    async fn garnish_is_removed_before_protein() {
        let step = optimizer();
        let state = state_with_items(
            vec![
                item("chicken", 1, 12.00, Category::Protein),
                item("rice", 1, 8.00, Category::Staple),
                item("truffle garnish", 1, 10.00, Category::Garnish),
            ],
            25.0,
        );
        let (items, notes, status) = run(&step, &state).await;
        assert_eq!(status, BudgetStatus::WithinBudget);
        assert!(items.iter().all(|i| i.product_name != "truffle garnish"));
        assert!(items.iter().any(|i| i.product_name == "chicken"));
        assert!(notes[0].contains("removed truffle garnish"));
    }

    #[tokio::test]
    async fn reduces_quantity_before_dropping() {
        let step = optimizer();
        let state = state_with_items(
            vec![
                item("chicken", 1, 10.00, Category::Protein),
                item("cheese", 3, 4.00, Category::Dairy),
            ],
            18.0,
        );
        let (items, notes, status) = run(&step, &state).await;
        assert_eq!(status, BudgetStatus::WithinBudget);
        let cheese = items.iter().find(|i| i.product_name == "cheese").unwrap();
        assert_eq!(cheese.quantity, 2);
        assert!(notes.iter().any(|n| n.contains("reduced cheese from 3 to 2")));
    }

    #[tokio::test]
    async fn substitutes_cheaper_alternative_first() {
        let catalog = MockCatalog::new();
        catalog.set_alternative(
            "ribeye",
            Product::new("chuck roast", 6.00, Category::Protein),
        );
        let step = BudgetOptimizerStep::new(Arc::new(catalog), Duration::from_secs(1), 1);
        let state = state_with_items(
            vec![
                item("ribeye", 1, 15.00, Category::Protein),
                item("rice", 1, 4.00, Category::Staple),
            ],
            12.0,
        );
        let (items, notes, status) = run(&step, &state).await;
        assert_eq!(status, BudgetStatus::WithinBudget);
        assert!(items.iter().any(|i| i.product_name == "chuck roast"));
        assert!(notes[0].contains("substituted chuck roast for ribeye"));
    }

    #[tokio::test]
    async fn staples_are_never_dropped() {
        let step = optimizer();
        let state = state_with_items(
            vec![
                item("chicken", 1, 20.00, Category::Protein),
                item("rice", 1, 10.00, Category::Staple),
            ],
            5.0,
        );
        let (items, notes, status) = run(&step, &state).await;
        assert_eq!(status, BudgetStatus::OverBudget);
        assert_eq!(items.len(), 2);
        assert!(notes.last().unwrap().contains("over budget"));
    }

    #[tokio::test]
    async fn unreachable_budget_reports_shortfall_without_failing() {
        let step = optimizer();
        let state = state_with_items(
            vec![item("chicken", 1, 30.00, Category::Protein)],
            10.0,
        );
        let (items, notes, status) = run(&step, &state).await;
        assert_eq!(status, BudgetStatus::OverBudget);
        assert_eq!(items.len(), 1);
        assert!(notes
            .iter()
            .any(|n| n.contains("still $20.00 over budget")));
    }

    #[tokio::test]
    async fn already_optimized_list_is_a_no_op() {
        let step = optimizer();
        let state = state_with_items(
            vec![
                item("chicken", 1, 8.00, Category::Protein),
                item("rice", 1, 4.00, Category::Staple),
            ],
            20.0,
        );
        let (items, notes, status) = run(&step, &state).await;
        assert_eq!(status, BudgetStatus::WithinBudget);
        assert_eq!(items.len(), 2);
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn identical_input_yields_identical_output() {
        let step = optimizer();
        let state = state_with_items(
            vec![
                item("chicken", 2, 7.50, Category::Protein),
                item("basil", 1, 3.00, Category::Garnish),
                item("parsley", 1, 3.00, Category::Garnish),
                item("cheese", 2, 4.25, Category::Dairy),
            ],
            12.0,
        );
        let (items_a, notes_a, status_a) = run(&step, &state).await;
        let (items_b, notes_b, status_b) = run(&step, &state).await;
        assert_eq!(items_a, items_b);
        assert_eq!(notes_a, notes_b);
        assert_eq!(status_a, status_b);
    }

    #[tokio::test]
    async fn equal_prices_break_ties_by_original_position() {
        let step = optimizer();
        let state = state_with_items(
            vec![
                item("rice", 1, 5.00, Category::Staple),
                item("basil", 1, 3.00, Category::Garnish),
                item("parsley", 1, 3.00, Category::Garnish),
            ],
            8.0,
        );
        let (_, notes, _) = run(&step, &state).await;
        // basil comes before parsley in the input, so it goes first
        assert!(notes[0].contains("basil"));
    }
}
