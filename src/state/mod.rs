//! Shared pipeline state
//!
//! One [`SharedState`] value is created per shopping request and owned by the
//! supervisor for the lifetime of that request. Steps never mutate it directly:
//! they return a [`StateDelta`] covering only the fields they own, and the
//! supervisor merges it through [`SharedState::apply`]. Writing a delta out of
//! pipeline order is a programming error and trips a debug assertion rather
//! than surfacing as a recoverable failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Round a dollar amount to whole cents.
///
/// All totals in the pipeline are kept cent-rounded so that repeated
/// recomputation and the optimizer's arithmetic stay deterministic.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Immutable user input, created once at the entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingRequest {
    /// Raw natural-language request text
    pub raw_text: String,
    /// Spending limit in dollars, if the user gave one
    pub budget: Option<f64>,
    /// Number of people to shop for
    pub people: Option<u32>,
    /// Cuisine hint (e.g. "italian")
    pub cuisine: Option<String>,
}

impl ShoppingRequest {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            budget: None,
            people: None,
            cuisine: None,
        }
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_people(mut self, people: u32) -> Self {
        self.people = Some(people);
        self
    }

    pub fn with_cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisine = Some(cuisine.into());
        self
    }
}

/// Structured intent extracted from the raw request by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlan {
    /// One-line description of what the user wants
    pub summary: String,
    /// Dish or recipe keywords to feed the recipe lookup
    pub recipe_hints: Vec<String>,
    /// Constraints such as dietary needs or the budget cap
    pub constraints: Vec<String>,
}

/// Store section a product belongs to.
///
/// The ordering of the removability ranking below drives the budget
/// optimizer: higher rank means the optimizer cuts the item earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Protein,
    Staple,
    Produce,
    Dairy,
    Pantry,
    Frozen,
    Bakery,
    Condiment,
    Garnish,
    Extra,
}

impl Category {
    /// How willing the optimizer is to cut items of this category.
    ///
    /// 0 means the item anchors the meal (never dropped, only substituted or
    /// reduced); 4 means cut first.
    pub fn removability(&self) -> u8 {
        match self {
            Category::Protein | Category::Staple => 0,
            Category::Produce | Category::Dairy => 1,
            Category::Pantry | Category::Frozen | Category::Bakery => 2,
            Category::Condiment => 3,
            Category::Garnish | Category::Extra => 4,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Protein => "protein",
            Category::Staple => "staple",
            Category::Produce => "produce",
            Category::Dairy => "dairy",
            Category::Pantry => "pantry",
            Category::Frozen => "frozen",
            Category::Bakery => "bakery",
            Category::Condiment => "condiment",
            Category::Garnish => "garnish",
            Category::Extra => "extra",
        };
        write!(f, "{name}")
    }
}

/// Single recipe ingredient with quantity scaled to the serving count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: u32,
    pub category: Option<Category>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: u32, category: Option<Category>) -> Self {
        Self {
            name: name.into(),
            quantity,
            category,
        }
    }
}

/// Selected recipe plus its raw ingredient list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    pub servings: u32,
    pub instructions: Option<String>,
}

/// One ingredient matched to a store product with a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedItem {
    /// Ingredient name from the recipe
    pub ingredient: String,
    /// Product name as sold in the store (or an estimate marker)
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub category: Category,
    /// Set when this line used an estimated fallback price
    pub fallback_note: Option<String>,
}

impl MappedItem {
    pub fn line_total(&self) -> f64 {
        round_cents(self.unit_price * f64::from(self.quantity))
    }
}

/// Outcome of the supervisor's budget comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    NotChecked,
    NoBudgetSpecified,
    WithinBudget,
    OverBudget,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BudgetStatus::NotChecked => "not checked",
            BudgetStatus::NoBudgetSpecified => "no budget specified",
            BudgetStatus::WithinBudget => "within budget",
            BudgetStatus::OverBudget => "over budget",
        };
        write!(f, "{name}")
    }
}

/// One rendered line of the final shopping list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub display_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub line_total: f64,
    pub category: Category,
    /// Marks lines built from fallback data
    pub note: Option<String>,
}

/// The rendered shopping list handed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalList {
    pub lines: Vec<LineItem>,
    pub grand_total: f64,
    pub budget_status: BudgetStatus,
    /// Removal notes from the optimizer plus any fallback explanations
    pub notes: Vec<String>,
}

impl fmt::Display for FinalList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            let marker = if line.note.is_some() { " (est.)" } else { "" };
            writeln!(
                f,
                "{:>2} x {} @ ${:.2} = ${:.2}{}",
                line.quantity, line.display_name, line.unit_price, line.line_total, marker
            )?;
        }
        writeln!(f, "total: ${:.2} ({})", self.grand_total, self.budget_status)?;
        for note in &self.notes {
            writeln!(f, "note: {note}")?;
        }
        Ok(())
    }
}

/// Identifies one of the five pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Planner,
    RecipeFinder,
    ProductMapper,
    BudgetOptimizer,
    Finalizer,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Planner => "planner",
            StepKind::RecipeFinder => "recipe_finder",
            StepKind::ProductMapper => "product_mapper",
            StepKind::BudgetOptimizer => "budget_optimizer",
            StepKind::Finalizer => "finalizer",
        };
        write!(f, "{name}")
    }
}

/// Result of one step invocation as recorded in the step log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    FellBackToDefault,
    Failed,
}

/// Append-only record of one step invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLogEntry {
    pub step: StepKind,
    pub status: StepStatus,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl StepLogEntry {
    pub fn new(step: StepKind, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step,
            status,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Error classification shared by the step log and the error set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UpstreamUnavailable,
    InvalidResponse,
    NotFound,
    Timeout,
    BudgetUnreachable,
    Cancelled,
}

/// One fatal or non-fatal error collected during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub step: Option<StepKind>,
    pub kind: ErrorKind,
    pub message: String,
    pub fatal: bool,
}

/// Terminal result of a supervisor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Aborted,
}

/// Field updates produced by a single step, merged by the supervisor.
///
/// One variant per step, covering exactly the fields that step owns.
#[derive(Debug, Clone)]
pub enum StateDelta {
    Plan(MealPlan),
    Recipe(Recipe),
    MappedItems(Vec<MappedItem>),
    OptimizedItems {
        items: Vec<MappedItem>,
        notes: Vec<String>,
        status: BudgetStatus,
    },
    FinalList(FinalList),
}

/// The single mutable record threaded through every step of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedState {
    pub id: Uuid,
    pub request: ShoppingRequest,
    pub plan: Option<MealPlan>,
    pub recipe: Option<Recipe>,
    pub mapped_items: Vec<MappedItem>,
    pub estimated_total: f64,
    pub budget_status: BudgetStatus,
    pub optimized_items: Option<Vec<MappedItem>>,
    pub removal_notes: Vec<String>,
    pub final_list: Option<FinalList>,
    pub step_log: Vec<StepLogEntry>,
    pub errors: Vec<ErrorRecord>,
    pub outcome: Option<Outcome>,
}

impl SharedState {
    pub fn new(request: ShoppingRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            plan: None,
            recipe: None,
            mapped_items: Vec::new(),
            estimated_total: 0.0,
            budget_status: BudgetStatus::NotChecked,
            optimized_items: None,
            removal_notes: Vec::new(),
            final_list: None,
            step_log: Vec::new(),
            errors: Vec::new(),
            outcome: None,
        }
    }

    /// The item list currently in effect: the optimized list if the optimizer
    /// ran, otherwise the mapped list.
    pub fn active_items(&self) -> &[MappedItem] {
        match &self.optimized_items {
            Some(items) => items,
            None => &self.mapped_items,
        }
    }

    /// Recompute `estimated_total` from the active item list.
    pub fn recompute_total(&mut self) {
        let total: f64 = self.active_items().iter().map(MappedItem::line_total).sum();
        self.estimated_total = round_cents(total);
    }

    /// Whether `estimated_total` matches the active item list.
    pub fn total_consistent(&self) -> bool {
        let expected: f64 = self.active_items().iter().map(MappedItem::line_total).sum();
        (self.estimated_total - round_cents(expected)).abs() < 1e-9
    }

    /// Merge a step's delta into the state.
    ///
    /// Fields fill strictly in pipeline order; the debug assertions reject a
    /// delta whose upstream inputs were never produced.
    pub fn apply(&mut self, delta: StateDelta) {
        match delta {
            StateDelta::Plan(plan) => {
                self.plan = Some(plan);
            }
            StateDelta::Recipe(recipe) => {
                debug_assert!(self.plan.is_some(), "recipe delta before plan");
                self.recipe = Some(recipe);
            }
            StateDelta::MappedItems(items) => {
                debug_assert!(self.recipe.is_some(), "mapped items delta before recipe");
                self.mapped_items = items;
                self.recompute_total();
            }
            StateDelta::OptimizedItems {
                items,
                notes,
                status,
            } => {
                debug_assert!(
                    !self.mapped_items.is_empty(),
                    "optimizer delta before product mapping"
                );
                self.optimized_items = Some(items);
                self.removal_notes = notes;
                self.budget_status = status;
                self.recompute_total();
            }
            StateDelta::FinalList(list) => {
                self.final_list = Some(list);
            }
        }
        debug_assert!(self.total_consistent(), "estimated_total out of sync");
    }

    pub fn push_log(&mut self, entry: StepLogEntry) {
        self.step_log.push(entry);
    }

    pub fn push_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }
}
