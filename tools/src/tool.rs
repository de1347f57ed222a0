//! The closed set of catalog tools the assistant may call.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chef_core::{ParamSchema, ParamType, RegistryError, ToolExecutor, ToolRegistry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{CatalogStore, IngredientFilter, MealFilter, ProductKind};
use crate::format::{self, CardStyle};
use crate::queries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogTool {
    GetMealDetails,
    ListMeals,
    FindMealsByIngredients,
    GetIngredientDetails,
    ListIngredients,
    GetCategories,
    GetAreas,
    GetAllProducts,
    GetProductsByType,
    GetMealDetailsFormatted,
    GetIngredientDetailsFormatted,
    GetKitDetailsFormatted,
}

impl CatalogTool {
    /// Every tool, in the order it is offered to the model.
    pub const ALL: [CatalogTool; 12] = [
        CatalogTool::GetMealDetails,
        CatalogTool::ListMeals,
        CatalogTool::FindMealsByIngredients,
        CatalogTool::GetIngredientDetails,
        CatalogTool::ListIngredients,
        CatalogTool::GetCategories,
        CatalogTool::GetAreas,
        CatalogTool::GetAllProducts,
        CatalogTool::GetProductsByType,
        CatalogTool::GetMealDetailsFormatted,
        CatalogTool::GetIngredientDetailsFormatted,
        CatalogTool::GetKitDetailsFormatted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CatalogTool::GetMealDetails => "getMealDetails",
            CatalogTool::ListMeals => "listMeals",
            CatalogTool::FindMealsByIngredients => "findMealsByIngredients",
            CatalogTool::GetIngredientDetails => "getIngredientDetails",
            CatalogTool::ListIngredients => "listIngredients",
            CatalogTool::GetCategories => "getCategories",
            CatalogTool::GetAreas => "getAreas",
            CatalogTool::GetAllProducts => "getAllProducts",
            CatalogTool::GetProductsByType => "getProductsByType",
            CatalogTool::GetMealDetailsFormatted => "getMealDetailsFormatted",
            CatalogTool::GetIngredientDetailsFormatted => "getIngredientDetailsFormatted",
            CatalogTool::GetKitDetailsFormatted => "getKitDetailsFormatted",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CatalogTool::GetMealDetails => {
                "Fetch full information about a meal: recipe steps, ingredients with measures, \
                 and the linked meal kit with its price when one exists."
            }
            CatalogTool::ListMeals => {
                "List meals, optionally filtered by category ID, area (cuisine) ID, or a \
                 case-insensitive search string matched against the meal name."
            }
            CatalogTool::FindMealsByIngredients => {
                "Suggest meals from a list of ingredient IDs the user has. Meals are ranked by \
                 the percentage of their ingredients that are covered."
            }
            CatalogTool::GetIngredientDetails => {
                "Fetch an ingredient's name, description, image and type, plus the price and \
                 stock of the shop product selling it."
            }
            CatalogTool::ListIngredients => {
                "List ingredients, optionally filtered by a name search or by type (for \
                 example 'Spice' or 'Vegetable'), with shop price and stock."
            }
            CatalogTool::GetCategories => "Get every meal category with its name and thumbnail.",
            CatalogTool::GetAreas => {
                "Get every cuisine area (for example Italian, Egyptian or Japanese)."
            }
            CatalogTool::GetAllProducts => {
                "Get every shop product, meal kits and single ingredients, with price and stock."
            }
            CatalogTool::GetProductsByType => {
                "Get shop products of one type, 'kit' for meal kits or 'ingredient' for single \
                 ingredients, with price and stock."
            }
            CatalogTool::GetMealDetailsFormatted => {
                "Get a ready-to-display Markdown card for a meal."
            }
            CatalogTool::GetIngredientDetailsFormatted => {
                "Get a ready-to-display Markdown card for an ingredient."
            }
            CatalogTool::GetKitDetailsFormatted => {
                "Get a ready-to-display Markdown card for a meal kit product."
            }
        }
    }

    pub fn schema(self) -> ParamSchema {
        const MEAL_ID: &str = "The ID of the meal.";
        const INGREDIENT_ID: &str = "The ID of the ingredient.";

        match self {
            CatalogTool::GetMealDetails | CatalogTool::GetMealDetailsFormatted => {
                ParamSchema::empty().required("mealId", ParamType::String, MEAL_ID)
            }
            CatalogTool::ListMeals => ParamSchema::empty()
                .optional("categoryId", ParamType::String, "Filter by category ID.")
                .optional("areaId", ParamType::String, "Filter by cuisine area ID.")
                .optional("search", ParamType::String, "Text to match in meal names."),
            CatalogTool::FindMealsByIngredients => ParamSchema::empty().required(
                "ingredientIds",
                ParamType::StringArray,
                "IDs of the ingredients the user has.",
            ),
            CatalogTool::GetIngredientDetails | CatalogTool::GetIngredientDetailsFormatted => {
                ParamSchema::empty().required("ingredientId", ParamType::String, INGREDIENT_ID)
            }
            CatalogTool::ListIngredients => ParamSchema::empty()
                .optional("search", ParamType::String, "Text to match in ingredient names.")
                .optional("type", ParamType::String, "Ingredient type to filter by."),
            CatalogTool::GetCategories | CatalogTool::GetAreas | CatalogTool::GetAllProducts => {
                ParamSchema::empty()
            }
            CatalogTool::GetProductsByType => ParamSchema::empty().required(
                "type",
                ParamType::Enum(&["kit", "ingredient"]),
                "Product type.",
            ),
            CatalogTool::GetKitDetailsFormatted => ParamSchema::empty().required(
                "productId",
                ParamType::String,
                "The ID of the meal kit product.",
            ),
        }
    }
}

impl fmt::Display for CatalogTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MealArgs {
    meal_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngredientArgs {
    ingredient_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductArgs {
    product_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngredientListArgs {
    ingredient_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ProductTypeArgs {
    #[serde(rename = "type")]
    kind: ProductKind,
}

/// Runs one [`CatalogTool`] against a store. Not-found lookups produce
/// `null`, never an error.
pub struct CatalogToolExecutor {
    tool: CatalogTool,
    store: Arc<dyn CatalogStore>,
    cards: Arc<CardStyle>,
}

impl CatalogToolExecutor {
    pub fn new(tool: CatalogTool, store: Arc<dyn CatalogStore>, cards: Arc<CardStyle>) -> Self {
        Self { tool, store, cards }
    }
}

fn parse<T: DeserializeOwned>(tool: CatalogTool, arguments: Value) -> anyhow::Result<T> {
    serde_json::from_value(arguments).with_context(|| format!("malformed arguments for {tool}"))
}

fn to_json<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl ToolExecutor for CatalogToolExecutor {
    async fn execute(&self, arguments: Value) -> anyhow::Result<Value> {
        let store = self.store.as_ref();

        match self.tool {
            CatalogTool::GetMealDetails => {
                let args: MealArgs = parse(self.tool, arguments)?;
                to_json(queries::meal_details(store, &args.meal_id).await?)
            }
            CatalogTool::ListMeals => {
                let filter: MealFilter = parse(self.tool, arguments)?;
                to_json(queries::list_meals(store, &filter).await?)
            }
            CatalogTool::FindMealsByIngredients => {
                let args: IngredientListArgs = parse(self.tool, arguments)?;
                to_json(queries::find_meals_by_ingredients(store, &args.ingredient_ids).await?)
            }
            CatalogTool::GetIngredientDetails => {
                let args: IngredientArgs = parse(self.tool, arguments)?;
                to_json(queries::ingredient_details(store, &args.ingredient_id).await?)
            }
            CatalogTool::ListIngredients => {
                let filter: IngredientFilter = parse(self.tool, arguments)?;
                to_json(queries::list_ingredients(store, &filter).await?)
            }
            CatalogTool::GetCategories => to_json(queries::categories(store).await?),
            CatalogTool::GetAreas => to_json(queries::areas(store).await?),
            CatalogTool::GetAllProducts => to_json(queries::all_products(store).await?),
            CatalogTool::GetProductsByType => {
                let args: ProductTypeArgs = parse(self.tool, arguments)?;
                to_json(queries::products_by_type(store, args.kind).await?)
            }
            CatalogTool::GetMealDetailsFormatted => {
                let args: MealArgs = parse(self.tool, arguments)?;
                let meal = store.meal(&args.meal_id).await?;
                to_json(meal.map(|meal| format::meal_card(&meal, &self.cards)))
            }
            CatalogTool::GetIngredientDetailsFormatted => {
                let args: IngredientArgs = parse(self.tool, arguments)?;
                let ingredient = store.ingredient(&args.ingredient_id).await?;
                to_json(ingredient.map(|i| format::ingredient_card(&i, &self.cards)))
            }
            CatalogTool::GetKitDetailsFormatted => {
                let args: ProductArgs = parse(self.tool, arguments)?;
                let product = store.product(&args.product_id).await?;
                to_json(product.map(|p| format::kit_card(&p, &self.cards)))
            }
        }
    }
}

/// Registers every [`CatalogTool`] against `store`.
pub fn catalog_registry(
    store: Arc<dyn CatalogStore>,
    cards: CardStyle,
) -> Result<ToolRegistry, RegistryError> {
    let cards = Arc::new(cards);
    let mut registry = ToolRegistry::new();
    for tool in CatalogTool::ALL {
        let executor = CatalogToolExecutor::new(tool, Arc::clone(&store), Arc::clone(&cards));
        registry.register(
            tool.as_str(),
            tool.description(),
            tool.schema(),
            Arc::new(executor),
        )?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::catalog::demo_catalog;
    use chef_core::ToolError;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn registry() -> ToolRegistry {
        let store: Arc<dyn CatalogStore> = Arc::new(demo_catalog().await);
        catalog_registry(store, CardStyle::default()).unwrap()
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = CatalogTool::ALL.iter().map(|tool| tool.as_str()).collect();
        assert_eq!(names.len(), CatalogTool::ALL.len());
    }

    #[tokio::test]
    async fn registers_all_tools_in_order() {
        let registry = registry().await;

        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "getMealDetails");
        assert_eq!(names[8], "getProductsByType");
        assert_eq!(names[11], "getKitDetailsFormatted");
    }

    #[tokio::test]
    async fn list_meals_searches_names() {
        let registry = registry().await;

        let result = registry
            .invoke("listMeals", json!({ "search": "soup" }), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(
            result,
            json!([{
                "mealId": "meal-tomato-soup",
                "name": "Tomato Soup",
                "thumbnail": "https://img.example/meals/tomato-soup.png",
            }])
        );
    }

    #[tokio::test]
    async fn unknown_ids_are_null_not_errors() {
        let registry = registry().await;

        for (tool, args) in [
            ("getMealDetails", json!({ "mealId": "missing" })),
            ("getIngredientDetails", json!({ "ingredientId": "missing" })),
            ("getMealDetailsFormatted", json!({ "mealId": "missing" })),
            ("getIngredientDetailsFormatted", json!({ "ingredientId": "missing" })),
            ("getKitDetailsFormatted", json!({ "productId": "missing" })),
        ] {
            let result = registry.invoke(tool, args, TIMEOUT).await.unwrap();
            assert_eq!(result, Value::Null, "{tool}");
        }
    }

    #[tokio::test]
    async fn product_type_outside_the_enum_is_rejected() {
        let registry = registry().await;

        let err = registry
            .invoke("getProductsByType", json!({ "type": "gift-card" }), TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected() {
        let registry = registry().await;

        let err = registry
            .invoke("findMealsByIngredients", json!({}), TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn meal_card_links_to_the_client() {
        let registry = registry().await;

        let card = registry
            .invoke("getMealDetailsFormatted", json!({ "mealId": "meal-garlic-bread" }), TIMEOUT)
            .await
            .unwrap();

        let card = card.as_str().unwrap();
        assert!(card.contains("**Category**: N/A"));
        assert!(card.contains("https://extrameal.netlify.app/meals/meal-garlic-bread"));
    }

    #[tokio::test]
    async fn kit_card_reports_price_and_stock() {
        let registry = registry().await;

        let card = registry
            .invoke(
                "getKitDetailsFormatted",
                json!({ "productId": "prod-kit-grilled-cheese" }),
                TIMEOUT,
            )
            .await
            .unwrap();

        let card = card.as_str().unwrap();
        assert!(card.contains("Meal Kit: Grilled Cheese"));
        assert!(card.contains("$9.00"));
        assert!(card.contains("**Stock**: 0"));
    }

    #[tokio::test]
    async fn ranking_comes_back_through_the_registry() {
        let registry = registry().await;

        let result = registry
            .invoke(
                "findMealsByIngredients",
                json!({ "ingredientIds": ["ing-tomato", "ing-onion"] }),
                TIMEOUT,
            )
            .await
            .unwrap();

        assert_eq!(result[0]["mealId"], "meal-shakshuka");
        assert_eq!(result[0]["matchPercentage"], 67);
        assert_eq!(result[1]["matchPercentage"], 50);
    }
}
