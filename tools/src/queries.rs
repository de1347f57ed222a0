//! Typed catalog reads behind each tool, shaped the way the assistant
//! presents them.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::catalog::{
    CatalogStore, Ingredient, IngredientFilter, MealFilter, MealHeader, ProductKind,
    ProductRecord, Result,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealDetails {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kit_product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredient {
    pub ingredient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSummary {
    pub meal_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl From<MealHeader> for MealSummary {
    fn from(meal: MealHeader) -> Self {
        Self {
            meal_id: meal.id,
            name: meal.name,
            thumbnail: meal.thumbnail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealMatch {
    pub meal_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub match_percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientDetails {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientListing {
    pub ingredient_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaSummary {
    pub area_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub stock: i64,
    #[serde(rename = "type")]
    pub kind: ProductKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal: Option<MealSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient: Option<LinkedIngredient>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedIngredient {
    pub ingredient_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<Ingredient> for LinkedIngredient {
    fn from(ingredient: Ingredient) -> Self {
        Self {
            ingredient_id: ingredient.id,
            name: ingredient.name,
            image: ingredient.image,
            kind: ingredient.kind,
        }
    }
}

impl From<ProductRecord> for ProductListing {
    fn from(record: ProductRecord) -> Self {
        let product = record.product;
        Self {
            product_id: product.id,
            name: product.name,
            price: product.price,
            stock: product.stock,
            kind: product.kind,
            image: product.image,
            meal: record.meal.map(MealSummary::from),
            ingredient: record.ingredient.map(LinkedIngredient::from),
        }
    }
}

pub async fn meal_details(store: &dyn CatalogStore, meal_id: &str) -> Result<Option<MealDetails>> {
    let Some(meal) = store.meal(meal_id).await? else {
        return Ok(None);
    };

    Ok(Some(MealDetails {
        name: meal.name,
        thumbnail: meal.thumbnail,
        category: meal.category.map(|c| c.name),
        area: meal.area.map(|a| a.name),
        instructions: meal.instructions,
        tags: meal.tags,
        youtube: meal.youtube,
        source: meal.source,
        ingredients: meal
            .ingredients
            .into_iter()
            .map(|line| RecipeIngredient {
                ingredient_id: line.ingredient_id,
                name: line.name,
                measure: line.measure,
                image: line.image,
            })
            .collect(),
        price: meal.kit.as_ref().map(|kit| kit.price),
        kit_product_id: meal.kit.map(|kit| kit.id),
    }))
}

pub async fn list_meals(store: &dyn CatalogStore, filter: &MealFilter) -> Result<Vec<MealSummary>> {
    Ok(store
        .meals(filter)
        .await?
        .into_iter()
        .map(MealSummary::from)
        .collect())
}

/// Meals sharing at least one ingredient with `ingredient_ids`, best match
/// first. Meals with equal scores keep their storage order.
pub async fn find_meals_by_ingredients(
    store: &dyn CatalogStore,
    ingredient_ids: &[String],
) -> Result<Vec<MealMatch>> {
    let owned: HashSet<&str> = ingredient_ids.iter().map(String::as_str).collect();

    let mut matches: Vec<MealMatch> = store
        .meals_using_any(ingredient_ids)
        .await?
        .into_iter()
        .map(|meal| {
            let matched = meal
                .ingredients
                .iter()
                .filter(|line| owned.contains(line.ingredient_id.as_str()))
                .count();
            MealMatch {
                match_percentage: match_percentage(matched, meal.ingredients.len()),
                meal_id: meal.id,
                name: meal.name,
                thumbnail: meal.thumbnail,
            }
        })
        .collect();

    // sort_by is stable, which keeps ties in retrieval order
    matches.sort_by(|a, b| b.match_percentage.cmp(&a.match_percentage));
    Ok(matches)
}

/// `round(100 * matched / total)`, with an empty recipe scoring zero.
pub fn match_percentage(matched: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (matched as f64 * 100.0 / total as f64).round() as u32
}

pub async fn ingredient_details(
    store: &dyn CatalogStore,
    ingredient_id: &str,
) -> Result<Option<IngredientDetails>> {
    let Some(ingredient) = store.ingredient(ingredient_id).await? else {
        return Ok(None);
    };
    let product = store.ingredient_product(ingredient_id).await?;

    Ok(Some(IngredientDetails {
        name: ingredient.name,
        description: ingredient.description,
        image: ingredient.image,
        kind: ingredient.kind,
        price: product.as_ref().map(|p| p.price),
        stock: product.map(|p| p.stock),
    }))
}

pub async fn list_ingredients(
    store: &dyn CatalogStore,
    filter: &IngredientFilter,
) -> Result<Vec<IngredientListing>> {
    let ingredients = store.ingredients(filter).await?;
    let mut listings: HashMap<String, (f64, i64)> = HashMap::new();
    for record in store.products(Some(ProductKind::Ingredient)).await? {
        if let Some(ingredient_id) = record.product.ingredient_id {
            listings
                .entry(ingredient_id)
                .or_insert((record.product.price, record.product.stock));
        }
    }

    Ok(ingredients
        .into_iter()
        .map(|ingredient| {
            let listing = listings.get(&ingredient.id);
            IngredientListing {
                price: listing.map(|&(price, _)| price),
                stock: listing.map(|&(_, stock)| stock),
                ingredient_id: ingredient.id,
                name: ingredient.name,
                image: ingredient.image,
            }
        })
        .collect())
}

pub async fn categories(store: &dyn CatalogStore) -> Result<Vec<CategorySummary>> {
    Ok(store
        .categories()
        .await?
        .into_iter()
        .map(|c| CategorySummary {
            category_id: c.id,
            name: c.name,
            thumbnail: c.thumbnail,
        })
        .collect())
}

pub async fn areas(store: &dyn CatalogStore) -> Result<Vec<AreaSummary>> {
    Ok(store
        .areas()
        .await?
        .into_iter()
        .map(|a| AreaSummary {
            area_id: a.id,
            name: a.name,
        })
        .collect())
}

pub async fn all_products(store: &dyn CatalogStore) -> Result<Vec<ProductListing>> {
    Ok(store
        .products(None)
        .await?
        .into_iter()
        .map(ProductListing::from)
        .collect())
}

/// Products of one kind. Only the link matching the kind is reported: kits
/// carry their meal, ingredient products their ingredient.
pub async fn products_by_type(
    store: &dyn CatalogStore,
    kind: ProductKind,
) -> Result<Vec<ProductListing>> {
    Ok(store
        .products(Some(kind))
        .await?
        .into_iter()
        .map(|mut record| {
            match kind {
                ProductKind::Kit => record.ingredient = None,
                ProductKind::Ingredient => record.meal = None,
            }
            ProductListing::from(record)
        })
        .collect())
}
