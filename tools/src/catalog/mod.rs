//! Read-only view of the shop catalog.
//!
//! The assistant never writes through this layer: [`CatalogStore`] exposes
//! lookups only, so no registered tool can mutate the catalog.

mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sqlite::SqliteCatalog;

#[cfg(test)]
pub(crate) use sqlite::tests::demo_catalog;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("catalog migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt catalog record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Area {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub kind: String,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Ingredient,
    Kit,
}

impl ProductKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductKind::Ingredient => "ingredient",
            ProductKind::Kit => "kit",
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ingredient" => Ok(ProductKind::Ingredient),
            "kit" => Ok(ProductKind::Kit),
            other => Err(CatalogError::Corrupt(format!("unknown product type '{other}'"))),
        }
    }
}

/// A shop product: either a single ingredient or a whole meal kit.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub stock: i64,
    pub kind: ProductKind,
    pub image: Option<String>,
    pub meal_id: Option<String>,
    pub ingredient_id: Option<String>,
}

/// Enough of a meal to list it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MealHeader {
    pub id: String,
    pub name: String,
    pub thumbnail: Option<String>,
}

/// One recipe line. `name` and `image` are absent when the referenced
/// ingredient no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct MealIngredientLine {
    pub ingredient_id: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub measure: Option<String>,
}

/// A meal with its references resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Meal {
    pub id: String,
    pub name: String,
    pub thumbnail: Option<String>,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub youtube: Option<String>,
    pub source: Option<String>,
    pub category: Option<Category>,
    pub area: Option<Area>,
    pub ingredients: Vec<MealIngredientLine>,
    pub kit: Option<Product>,
}

/// A product with whatever it links to.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub product: Product,
    pub meal: Option<MealHeader>,
    pub ingredient: Option<Ingredient>,
}

/// Equality and substring filters for meals. Empty strings are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealFilter {
    pub category_id: Option<String>,
    pub area_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IngredientFilter {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Read access to the catalog. Results reflect the store at call time;
/// nothing is cached.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn meal(&self, id: &str) -> Result<Option<Meal>>;

    /// Meals matching `filter`, in storage order.
    async fn meals(&self, filter: &MealFilter) -> Result<Vec<MealHeader>>;

    /// Meals using at least one of `ingredient_ids`, in storage order.
    async fn meals_using_any(&self, ingredient_ids: &[String]) -> Result<Vec<Meal>>;

    async fn ingredient(&self, id: &str) -> Result<Option<Ingredient>>;

    async fn ingredients(&self, filter: &IngredientFilter) -> Result<Vec<Ingredient>>;

    async fn categories(&self) -> Result<Vec<Category>>;

    async fn areas(&self) -> Result<Vec<Area>>;

    async fn product(&self, id: &str) -> Result<Option<ProductRecord>>;

    async fn products(&self, kind: Option<ProductKind>) -> Result<Vec<ProductRecord>>;

    /// The shop product selling a given ingredient, if any.
    async fn ingredient_product(&self, ingredient_id: &str) -> Result<Option<Product>>;
}

/// Treats blank filter values as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
