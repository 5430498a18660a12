//! Finalizer step: active item list to the rendered shopping list
//!
//! Pure transformation with no external calls. The only failure mode is
//! missing input, which falls back to an empty list with an explanatory note.

use super::{Step, StepError, StepOutput};
use crate::state::{
    round_cents, FinalList, LineItem, SharedState, StateDelta, StepKind,
};
use async_trait::async_trait;

pub struct FinalizerStep;

impl FinalizerStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FinalizerStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for FinalizerStep {
    fn kind(&self) -> StepKind {
        StepKind::Finalizer
    }

    async fn execute(&self, state: &SharedState) -> Result<StepOutput, StepError> {
        let items = state.active_items();

        if items.is_empty() {
            let list = FinalList {
                lines: Vec::new(),
                grand_total: 0.0,
                budget_status: state.budget_status,
                notes: vec!["no items could be mapped; shopping list is empty".to_string()],
            };
            return Ok(StepOutput::fell_back(
                StateDelta::FinalList(list),
                "rendered empty shopping list",
                "no mapped items available",
            ));
        }

        let lines: Vec<LineItem> = items
            .iter()
            .map(|item| LineItem {
                display_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
                category: item.category,
                note: item.fallback_note.clone(),
            })
            .collect();

        let grand_total = round_cents(lines.iter().map(|l| l.line_total).sum());
        let mut notes = state.removal_notes.clone();
        let estimated = lines.iter().filter(|l| l.note.is_some()).count();
        if estimated > 0 {
            notes.push(format!(
                "{estimated} line(s) use estimated fallback prices"
            ));
        }

        let list = FinalList {
            lines,
            grand_total,
            budget_status: state.budget_status,
            notes,
        };
        let message = format!(
            "final list ready: {} items, ${:.2} ({})",
            list.lines.len(),
            list.grand_total,
            list.budget_status
        );
        Ok(StepOutput::ok(StateDelta::FinalList(list), message))
    }
}
