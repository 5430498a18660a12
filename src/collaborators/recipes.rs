//! Recipe lookup collaborator

use super::SourceError;
use crate::state::{Category, Ingredient, MealPlan, Recipe, ShoppingRequest};
use async_trait::async_trait;
use std::sync::Mutex;

/// Finds a recipe matching the plan and request.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn find_recipe(
        &self,
        plan: &MealPlan,
        request: &ShoppingRequest,
    ) -> Result<Recipe, SourceError>;
}

struct BookEntry {
    tags: &'static [&'static str],
    recipe: fn() -> Recipe,
}

const BASE_SERVINGS: u32 = 4;

fn ing(name: &str, quantity: u32, category: Category) -> Ingredient {
    Ingredient::new(name, quantity, Some(category))
}

fn spaghetti_bolognese() -> Recipe {
    Recipe {
        name: "Spaghetti Bolognese".into(),
        ingredients: vec![
            ing("spaghetti", 1, Category::Staple),
            ing("ground beef", 1, Category::Protein),
            ing("crushed tomatoes", 2, Category::Pantry),
            ing("onion", 1, Category::Produce),
            ing("garlic", 1, Category::Produce),
            ing("olive oil", 1, Category::Pantry),
            ing("parmesan", 1, Category::Dairy),
            ing("basil", 1, Category::Garnish),
        ],
        servings: BASE_SERVINGS,
        instructions: Some(
            "Brown the beef, soften onion and garlic, simmer with tomatoes, toss with pasta."
                .into(),
        ),
    }
}

fn chicken_tacos() -> Recipe {
    Recipe {
        name: "Chicken Tacos".into(),
        ingredients: vec![
            ing("tortillas", 1, Category::Staple),
            ing("chicken breast", 1, Category::Protein),
            ing("cheddar cheese", 1, Category::Dairy),
            ing("lettuce", 1, Category::Produce),
            ing("tomato", 1, Category::Produce),
            ing("salsa", 1, Category::Condiment),
            ing("sour cream", 1, Category::Extra),
            ing("cilantro", 1, Category::Garnish),
        ],
        servings: BASE_SERVINGS,
        instructions: Some("Cook and shred the chicken, warm tortillas, assemble with toppings.".into()),
    }
}

fn vegetable_stir_fry() -> Recipe {
    Recipe {
        name: "Vegetable Stir Fry".into(),
        ingredients: vec![
            ing("rice", 1, Category::Staple),
            ing("broccoli", 1, Category::Produce),
            ing("bell pepper", 1, Category::Produce),
            ing("carrots", 1, Category::Produce),
            ing("soy sauce", 1, Category::Condiment),
            ing("garlic", 1, Category::Produce),
            ing("ginger", 1, Category::Garnish),
            ing("sesame seeds", 1, Category::Extra),
        ],
        servings: BASE_SERVINGS,
        instructions: Some("Stir-fry vegetables over high heat, season, serve over rice.".into()),
    }
}

fn garden_salad() -> Recipe {
    Recipe {
        name: "Garden Salad".into(),
        ingredients: vec![
            ing("lettuce", 1, Category::Produce),
            ing("tomato", 1, Category::Produce),
            ing("cucumber", 1, Category::Produce),
            ing("onion", 1, Category::Produce),
            ing("feta", 1, Category::Dairy),
            ing("olive oil", 1, Category::Pantry),
            ing("croutons", 1, Category::Extra),
        ],
        servings: BASE_SERVINGS,
        instructions: Some("Chop everything, toss with oil, top with feta and croutons.".into()),
    }
}

/// Generic fallback recipe used when no lookup succeeds: pantry staples that
/// make a usable list for almost any request.
pub fn generic_staples(servings: u32) -> Recipe {
    let mut recipe = Recipe {
        name: "Pantry Staples".into(),
        ingredients: vec![
            ing("eggs", 1, Category::Protein),
            ing("bread", 1, Category::Bakery),
            ing("milk", 1, Category::Dairy),
            ing("rice", 1, Category::Staple),
            ing("mixed vegetables", 1, Category::Frozen),
        ],
        servings: BASE_SERVINGS,
        instructions: None,
    };
    scale_servings(&mut recipe, servings);
    recipe
}

/// Scale ingredient quantities from [`BASE_SERVINGS`] to the requested count,
/// rounding up so nobody goes hungry. The multiplication runs in u64 and the
/// result saturates at `u32::MAX` so an extreme serving count cannot overflow.
fn scale_servings(recipe: &mut Recipe, servings: u32) {
    if servings == recipe.servings || servings == 0 {
        return;
    }
    for ingredient in &mut recipe.ingredients {
        let scaled = (u64::from(ingredient.quantity) * u64::from(servings))
            .div_ceil(u64::from(recipe.servings));
        ingredient.quantity = u32::try_from(scaled).unwrap_or(u32::MAX).max(1);
    }
    recipe.servings = servings;
}

/// Built-in recipe book matched by plan hints and request text.
pub struct BuiltinRecipeBook {
    entries: Vec<BookEntry>,
}

impl BuiltinRecipeBook {
    pub fn new() -> Self {
        Self {
            entries: vec![
                BookEntry {
                    tags: &["spaghetti", "bolognese", "pasta", "italian"],
                    recipe: spaghetti_bolognese,
                },
                BookEntry {
                    tags: &["taco", "mexican"],
                    recipe: chicken_tacos,
                },
                BookEntry {
                    tags: &["stir fry", "stir-fry", "asian", "vegetarian"],
                    recipe: vegetable_stir_fry,
                },
                BookEntry {
                    tags: &["salad", "greek"],
                    recipe: garden_salad,
                },
            ],
        }
    }
}

impl Default for BuiltinRecipeBook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecipeSource for BuiltinRecipeBook {
    async fn find_recipe(
        &self,
        plan: &MealPlan,
        request: &ShoppingRequest,
    ) -> Result<Recipe, SourceError> {
        let text = request.raw_text.to_lowercase();
        let matched = self.entries.iter().find(|entry| {
            entry.tags.iter().any(|tag| {
                plan.recipe_hints.iter().any(|hint| hint.contains(tag)) || text.contains(tag)
            })
        });

        match matched {
            Some(entry) => {
                let mut recipe = (entry.recipe)();
                if let Some(people) = request.people {
                    scale_servings(&mut recipe, people);
                }
                Ok(recipe)
            }
            None => Err(SourceError::NotFound(format!(
                "no recipe matching \"{}\"",
                request.raw_text.trim()
            ))),
        }
    }
}

/// Mock recipe source returning queued results.
pub struct MockRecipeSource {
    responses: Mutex<Vec<Result<Recipe, SourceError>>>,
}

impl MockRecipeSource {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
        }
    }

    pub fn add_response(&self, response: Result<Recipe, SourceError>) {
        self.responses.lock().unwrap().push(response);
    }
}

impl Default for MockRecipeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecipeSource for MockRecipeSource {
    async fn find_recipe(
        &self,
        _plan: &MealPlan,
        _request: &ShoppingRequest,
    ) -> Result<Recipe, SourceError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(SourceError::Unavailable("no mock response queued".into())))
    }
}
