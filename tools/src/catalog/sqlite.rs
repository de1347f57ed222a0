use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;

use super::{
    non_blank, Area, CatalogError, CatalogStore, Category, Ingredient, IngredientFilter, Meal,
    MealFilter, MealHeader, MealIngredientLine, Product, ProductKind, ProductRecord, Result,
};

const MEAL_SELECT: &str = "\
    SELECT m.id, m.name, m.thumbnail, m.instructions, m.tags, m.youtube, m.source, \
           c.id AS category_id, c.name AS category_name, c.thumbnail AS category_thumbnail, \
           a.id AS area_id, a.name AS area_name, \
           p.id AS kit_id, p.name AS kit_name, p.price AS kit_price, p.stock AS kit_stock, \
           p.type AS kit_kind, p.image AS kit_image, p.meal_id AS kit_meal_id, \
           p.ingredient_id AS kit_ingredient_id \
    FROM meals m \
    LEFT JOIN categories c ON c.id = m.category_id \
    LEFT JOIN areas a ON a.id = m.area_id \
    LEFT JOIN products p ON p.id = m.kit_product_id";

const PRODUCT_SELECT: &str = "\
    SELECT p.id, p.name, p.price, p.stock, p.type AS kind, p.image, p.meal_id, p.ingredient_id, \
           m.name AS meal_name, m.thumbnail AS meal_thumbnail, \
           i.name AS ingredient_name, i.description AS ingredient_description, \
           i.image AS ingredient_image, i.type AS ingredient_kind, \
           i.availability AS ingredient_available \
    FROM products p \
    LEFT JOIN meals m ON m.id = p.meal_id \
    LEFT JOIN ingredients i ON i.id = p.ingredient_id";

const INGREDIENT_COLUMNS: &str =
    "id, name, description, image, type AS kind, availability AS available";

/// Catalog backed by SQLite.
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Opens the database at `url`. In-memory databases are pinned to a
    /// single connection that never recycles, otherwise each pooled
    /// connection would see its own empty database.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?;
        let pool_options = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = pool_options.connect_with(options).await?;

        info!("Catalog store opened at {url}");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Executes a batch of SQL statements, typically demo data.
    pub async fn seed(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    /// True when neither meals nor products have been loaded yet.
    pub async fn is_empty(&self) -> Result<bool> {
        let empty: i64 = sqlx::query_scalar(
            "SELECT NOT EXISTS (SELECT 1 FROM meals) AND NOT EXISTS (SELECT 1 FROM products)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(empty != 0)
    }

    async fn meal_lines(&self, meal_id: &str) -> Result<Vec<MealIngredientLine>> {
        let rows: Vec<LineRow> = sqlx::query_as(
            "SELECT mi.ingredient_id, mi.measure, i.name, i.image \
             FROM meal_ingredients mi \
             LEFT JOIN ingredients i ON i.id = mi.ingredient_id \
             WHERE mi.meal_id = ? \
             ORDER BY mi.position",
        )
        .bind(meal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MealIngredientLine::from).collect())
    }

    async fn hydrate(&self, row: MealRow) -> Result<Meal> {
        let ingredients = self.meal_lines(&row.id).await?;
        row.into_meal(ingredients)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn meal(&self, id: &str) -> Result<Option<Meal>> {
        let row: Option<MealRow> = sqlx::query_as(&format!("{MEAL_SELECT} WHERE m.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn meals(&self, filter: &MealFilter) -> Result<Vec<MealHeader>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT id, name, thumbnail FROM meals WHERE 1 = 1");
        if let Some(category_id) = non_blank(&filter.category_id) {
            query.push(" AND category_id = ").push_bind(category_id.to_string());
        }
        if let Some(area_id) = non_blank(&filter.area_id) {
            query.push(" AND area_id = ").push_bind(area_id.to_string());
        }
        query.push(" ORDER BY rowid");

        let mut meals: Vec<MealHeader> = query.build_query_as().fetch_all(&self.pool).await?;
        if let Some(search) = non_blank(&filter.search) {
            let needle = search.to_lowercase();
            meals.retain(|meal| name_contains(&meal.name, &needle));
        }
        Ok(meals)
    }

    async fn meals_using_any(&self, ingredient_ids: &[String]) -> Result<Vec<Meal>> {
        if ingredient_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(MEAL_SELECT);
        query.push(
            " WHERE m.id IN (SELECT meal_id FROM meal_ingredients WHERE ingredient_id IN (",
        );
        {
            let mut ids = query.separated(", ");
            for id in ingredient_ids {
                ids.push_bind(id.clone());
            }
        }
        query.push(")) ORDER BY m.rowid");

        let rows: Vec<MealRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let mut meals = Vec::with_capacity(rows.len());
        for row in rows {
            meals.push(self.hydrate(row).await?);
        }
        Ok(meals)
    }

    async fn ingredient(&self, id: &str) -> Result<Option<Ingredient>> {
        Ok(
            sqlx::query_as(&format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn ingredients(&self, filter: &IngredientFilter) -> Result<Vec<Ingredient>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE 1 = 1"
        ));
        if let Some(kind) = non_blank(&filter.kind) {
            query.push(" AND type = ").push_bind(kind.to_string());
        }
        query.push(" ORDER BY rowid");

        let mut ingredients: Vec<Ingredient> =
            query.build_query_as().fetch_all(&self.pool).await?;
        if let Some(search) = non_blank(&filter.search) {
            let needle = search.to_lowercase();
            ingredients.retain(|ingredient| name_contains(&ingredient.name, &needle));
        }
        Ok(ingredients)
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(
            sqlx::query_as("SELECT id, name, thumbnail FROM categories ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn areas(&self) -> Result<Vec<Area>> {
        Ok(sqlx::query_as("SELECT id, name FROM areas ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn product(&self, id: &str) -> Result<Option<ProductRecord>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProductRecord::try_from).transpose()
    }

    async fn products(&self, kind: Option<ProductKind>) -> Result<Vec<ProductRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new(PRODUCT_SELECT);
        if let Some(kind) = kind {
            query.push(" WHERE p.type = ").push_bind(kind.as_str());
        }
        query.push(" ORDER BY p.rowid");

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ProductRecord::try_from).collect()
    }

    async fn ingredient_product(&self, ingredient_id: &str) -> Result<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} WHERE p.ingredient_id = ? ORDER BY p.rowid LIMIT 1"
        ))
        .bind(ingredient_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| ProductRecord::try_from(row).map(|record| record.product))
            .transpose()
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    ingredient_id: String,
    measure: Option<String>,
    name: Option<String>,
    image: Option<String>,
}

impl From<LineRow> for MealIngredientLine {
    fn from(row: LineRow) -> Self {
        Self {
            ingredient_id: row.ingredient_id,
            name: row.name,
            image: row.image,
            measure: row.measure,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MealRow {
    id: String,
    name: String,
    thumbnail: Option<String>,
    instructions: Option<String>,
    tags: String,
    youtube: Option<String>,
    source: Option<String>,
    category_id: Option<String>,
    category_name: Option<String>,
    category_thumbnail: Option<String>,
    area_id: Option<String>,
    area_name: Option<String>,
    kit_id: Option<String>,
    kit_name: Option<String>,
    kit_price: Option<f64>,
    kit_stock: Option<i64>,
    kit_kind: Option<String>,
    kit_image: Option<String>,
    kit_meal_id: Option<String>,
    kit_ingredient_id: Option<String>,
}

impl MealRow {
    fn into_meal(self, ingredients: Vec<MealIngredientLine>) -> Result<Meal> {
        let category = match (self.category_id, self.category_name) {
            (Some(id), Some(name)) => Some(Category {
                id,
                name,
                thumbnail: self.category_thumbnail,
            }),
            _ => None,
        };
        let area = match (self.area_id, self.area_name) {
            (Some(id), Some(name)) => Some(Area { id, name }),
            _ => None,
        };
        let kit = match (self.kit_id, self.kit_name, self.kit_price, self.kit_kind) {
            (Some(id), Some(name), Some(price), Some(kind)) => Some(Product {
                id,
                name,
                price,
                stock: self.kit_stock.unwrap_or_default(),
                kind: kind.parse()?,
                image: self.kit_image,
                meal_id: self.kit_meal_id,
                ingredient_id: self.kit_ingredient_id,
            }),
            _ => None,
        };

        Ok(Meal {
            id: self.id,
            name: self.name,
            thumbnail: self.thumbnail,
            instructions: self.instructions,
            tags: split_tags(&self.tags),
            youtube: self.youtube,
            source: self.source,
            category,
            area,
            ingredients,
            kit,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price: f64,
    stock: i64,
    kind: String,
    image: Option<String>,
    meal_id: Option<String>,
    ingredient_id: Option<String>,
    meal_name: Option<String>,
    meal_thumbnail: Option<String>,
    ingredient_name: Option<String>,
    ingredient_description: Option<String>,
    ingredient_image: Option<String>,
    ingredient_kind: Option<String>,
    ingredient_available: Option<bool>,
}

impl TryFrom<ProductRow> for ProductRecord {
    type Error = CatalogError;

    fn try_from(row: ProductRow) -> Result<Self> {
        let meal = match (&row.meal_id, row.meal_name) {
            (Some(id), Some(name)) => Some(MealHeader {
                id: id.clone(),
                name,
                thumbnail: row.meal_thumbnail,
            }),
            _ => None,
        };
        let ingredient = match (&row.ingredient_id, row.ingredient_name) {
            (Some(id), Some(name)) => Some(Ingredient {
                id: id.clone(),
                name,
                description: row.ingredient_description,
                image: row.ingredient_image,
                kind: row.ingredient_kind.unwrap_or_else(|| "Other".to_string()),
                available: row.ingredient_available.unwrap_or(true),
            }),
            _ => None,
        };

        Ok(ProductRecord {
            product: Product {
                id: row.id,
                name: row.name,
                price: row.price,
                stock: row.stock,
                kind: row.kind.parse()?,
                image: row.image,
                meal_id: row.meal_id,
                ingredient_id: row.ingredient_id,
            },
            meal,
            ingredient,
        })
    }
}

/// Case-insensitive substring match with full Unicode lowercasing.
fn name_contains(name: &str, lowered_needle: &str) -> bool {
    name.to_lowercase().contains(lowered_needle)
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
