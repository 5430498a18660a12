//! Product catalog abstraction
//!
//! The catalog is the only external lookup the core depends on: the product
//! mapper and the budget optimizer both consume the read-only
//! [`ProductCatalog`] trait. The built-in [`InMemoryCatalog`] is immutable for
//! the process lifetime, so concurrent requests can share one instance without
//! locks. [`MockCatalog`] supports per-ingredient error injection for tests.

use crate::state::Category;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// A store product with a unit price.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    pub unit_price: f64,
    pub category: Category,
}

impl Product {
    pub fn new(name: impl Into<String>, unit_price: f64, category: Category) -> Self {
        Self {
            name: name.into(),
            unit_price,
            category,
        }
    }
}

/// Failures a catalog lookup can report.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("catalog lookup timed out")]
    Timeout,
}

/// Read-only product lookup consumed by the product mapper and optimizer.
///
/// `Ok(None)` means no match (the caller decides whether that is a fallback
/// or an error); `Err` means the lookup itself failed.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Find the product matching an ingredient name, optionally constrained
    /// to a category.
    async fn find_product(
        &self,
        ingredient: &str,
        category: Option<Category>,
    ) -> Result<Option<Product>, CatalogError>;

    /// Find a strictly cheaper product in the same category, if one exists.
    /// Must be deterministic: equal inputs return the same alternative.
    async fn cheaper_alternative(&self, product: &Product)
        -> Result<Option<Product>, CatalogError>;
}

struct CatalogEntry {
    keywords: &'static [&'static str],
    product: Product,
}

/// Built-in catalog backed by a fixed table of common grocery products.
pub struct InMemoryCatalog {
    entries: Vec<CatalogEntry>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        let mut entries = Vec::new();
        let mut add = |keywords: &'static [&'static str], name: &str, price: f64, cat: Category| {
            entries.push(CatalogEntry {
                keywords,
                product: Product::new(name, price, cat),
            });
        };

        add(&["chicken"], "Chicken Breast (1 lb)", 5.99, Category::Protein);
        add(&["beef", "ground beef"], "Ground Beef (1 lb)", 7.49, Category::Protein);
        add(&["salmon", "fish"], "Salmon Fillet (1 lb)", 11.99, Category::Protein);
        add(&["tofu"], "Firm Tofu (14 oz)", 2.79, Category::Protein);
        add(&["egg"], "Large Eggs (dozen)", 3.29, Category::Protein);

        add(&["spaghetti", "pasta"], "Spaghetti (1 lb box)", 1.89, Category::Staple);
        add(&["rice"], "Long Grain Rice (2 lb)", 3.49, Category::Staple);
        add(&["tortilla"], "Flour Tortillas (10 ct)", 3.19, Category::Staple);
        add(&["bread"], "Sandwich Bread (loaf)", 2.99, Category::Bakery);
        add(&["flour"], "All-Purpose Flour (5 lb)", 3.99, Category::Pantry);

        add(&["tomato"], "Roma Tomatoes (1 lb)", 2.49, Category::Produce);
        add(&["onion"], "Yellow Onion", 0.89, Category::Produce);
        add(&["garlic"], "Garlic Bulb", 0.69, Category::Produce);
        add(&["lettuce"], "Romaine Lettuce", 2.29, Category::Produce);
        add(&["broccoli"], "Broccoli Crown", 1.99, Category::Produce);
        add(&["carrot"], "Carrots (1 lb)", 1.29, Category::Produce);
        add(&["bell pepper", "pepper"], "Bell Pepper", 1.49, Category::Produce);
        add(&["cucumber"], "Cucumber", 0.99, Category::Produce);

        add(&["milk"], "Whole Milk (gallon)", 3.79, Category::Dairy);
        add(&["parmesan"], "Grated Parmesan (8 oz)", 4.99, Category::Dairy);
        add(&["cheddar", "cheese"], "Cheddar Block (8 oz)", 3.99, Category::Dairy);
        add(&["feta"], "Feta Crumbles (6 oz)", 4.49, Category::Dairy);
        add(&["butter"], "Salted Butter (1 lb)", 4.79, Category::Dairy);
        add(&["sour cream"], "Sour Cream (16 oz)", 2.49, Category::Dairy);

        add(&["canned tomato", "crushed tomato"], "Crushed Tomatoes (28 oz)", 2.19, Category::Pantry);
        add(&["olive oil"], "Olive Oil (500 ml)", 7.99, Category::Pantry);
        add(&["vegetable oil", "oil"], "Vegetable Oil (48 oz)", 4.29, Category::Pantry);
        add(&["mixed vegetable"], "Frozen Mixed Vegetables (16 oz)", 1.99, Category::Frozen);

        add(&["soy sauce"], "Soy Sauce (15 oz)", 3.29, Category::Condiment);
        add(&["salsa"], "Salsa (16 oz)", 3.49, Category::Condiment);
        add(&["salt"], "Table Salt (26 oz)", 1.19, Category::Condiment);

        add(&["basil"], "Fresh Basil (bunch)", 2.99, Category::Garnish);
        add(&["cilantro"], "Cilantro (bunch)", 1.29, Category::Garnish);
        add(&["parsley"], "Parsley (bunch)", 1.49, Category::Garnish);
        add(&["ginger"], "Ginger Root", 1.19, Category::Garnish);

        add(&["crouton"], "Garlic Croutons (5 oz)", 2.79, Category::Extra);
        add(&["sesame"], "Sesame Seeds (4 oz)", 2.99, Category::Extra);

        Self { entries }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn find_product(
        &self,
        ingredient: &str,
        category: Option<Category>,
    ) -> Result<Option<Product>, CatalogError> {
        let needle = ingredient.to_lowercase();
        // Longest keyword wins so "ground beef" beats "beef"; ties fall back
        // to table order for determinism.
        let mut best: Option<(usize, &Product)> = None;
        for entry in &self.entries {
            if let Some(cat) = category {
                if entry.product.category != cat {
                    continue;
                }
            }
            for keyword in entry.keywords {
                if needle.contains(keyword) {
                    let score = keyword.len();
                    if best.map_or(true, |(s, _)| score > s) {
                        best = Some((score, &entry.product));
                    }
                }
            }
        }
        Ok(best.map(|(_, p)| p.clone()))
    }

    async fn cheaper_alternative(
        &self,
        product: &Product,
    ) -> Result<Option<Product>, CatalogError> {
        let mut cheapest: Option<&Product> = None;
        for entry in &self.entries {
            let candidate = &entry.product;
            if candidate.category != product.category
                || candidate.name == product.name
                || candidate.unit_price >= product.unit_price
            {
                continue;
            }
            if cheapest.map_or(true, |c| candidate.unit_price < c.unit_price) {
                cheapest = Some(candidate);
            }
        }
        Ok(cheapest.cloned())
    }
}

/// Mock catalog for tests, with per-ingredient result injection.
pub struct MockCatalog {
    products: Mutex<HashMap<String, Result<Option<Product>, CatalogError>>>,
    alternatives: Mutex<HashMap<String, Product>>,
    calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            products: Mutex::new(HashMap::new()),
            alternatives: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Configure the result of `find_product` for an ingredient. Unconfigured
    /// ingredients return `Ok(None)`.
    pub fn set_product(&self, ingredient: &str, result: Result<Option<Product>, CatalogError>) {
        self.products
            .lock()
            .unwrap()
            .insert(ingredient.to_lowercase(), result);
    }

    /// Configure the cheaper alternative returned for a product name.
    pub fn set_alternative(&self, product_name: &str, alternative: Product) {
        self.alternatives
            .lock()
            .unwrap()
            .insert(product_name.to_string(), alternative);
    }

    pub fn lookups(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCatalog for MockCatalog {
    async fn find_product(
        &self,
        ingredient: &str,
        _category: Option<Category>,
    ) -> Result<Option<Product>, CatalogError> {
        self.calls.lock().unwrap().push(ingredient.to_string());
        self.products
            .lock()
            .unwrap()
            .get(&ingredient.to_lowercase())
            .cloned()
            .unwrap_or(Ok(None))
    }

    async fn cheaper_alternative(
        &self,
        product: &Product,
    ) -> Result<Option<Product>, CatalogError> {
        Ok(self.alternatives.lock().unwrap().get(&product.name).cloned())
    }
}
