//! Markdown cards for the "formatted" tools.
//!
//! Rendering never fails: absent optional fields fall back to a placeholder.

use std::fmt::Write;

use crate::catalog::{Ingredient, Meal, ProductRecord};

pub const DEFAULT_CLIENT_URL: &str = "https://extrameal.netlify.app";
pub const DEFAULT_MEAL_INSTRUCTIONS_CHARS: usize = 150;
pub const DEFAULT_INGREDIENT_DESCRIPTION_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Where card links point and how much free text each card shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStyle {
    pub client_url: String,
    pub meal_instructions_chars: usize,
    pub ingredient_description_chars: usize,
}

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            client_url: DEFAULT_CLIENT_URL.to_string(),
            meal_instructions_chars: DEFAULT_MEAL_INSTRUCTIONS_CHARS,
            ingredient_description_chars: DEFAULT_INGREDIENT_DESCRIPTION_CHARS,
        }
    }
}

impl CardStyle {
    fn link(&self, section: &str, id: &str) -> String {
        format!("{}/{section}/{id}", self.client_url.trim_end_matches('/'))
    }
}

/// First `budget` characters of `text`, with an ellipsis if anything was cut.
pub fn preview(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn meal_card(meal: &Meal, style: &CardStyle) -> String {
    let category = meal.category.as_ref().map_or("N/A", |c| c.name.as_str());
    let area = meal.area.as_ref().map_or("N/A", |a| a.name.as_str());
    let instructions = match meal.instructions.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => preview(text, style.meal_instructions_chars),
        None => "No instructions available.".to_string(),
    };

    let mut card = format!("### 🍽️ {}\n\n", meal.name);
    if let Some(thumbnail) = &meal.thumbnail {
        let _ = writeln!(card, "![{}]({thumbnail})\n", meal.name);
    }
    let _ = writeln!(card, "**Category**: {category}  ");
    let _ = writeln!(card, "**Area**: {area}\n");
    let _ = writeln!(card, "📝 {instructions}\n");
    let _ = writeln!(
        card,
        "🔗 [View Full Recipe]({})",
        style.link("meals", &meal.id)
    );
    card
}

pub fn ingredient_card(ingredient: &Ingredient, style: &CardStyle) -> String {
    let description = match ingredient.description.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => preview(text, style.ingredient_description_chars),
        None => "No description available.".to_string(),
    };

    let mut card = format!("### 🧂 {}\n\n", ingredient.name);
    if let Some(image) = &ingredient.image {
        let _ = writeln!(card, "![{}]({image})\n", ingredient.name);
    }
    let _ = writeln!(card, "📖 {description}  ");
    let _ = writeln!(
        card,
        "🔗 [View Ingredient]({})",
        style.link("ingredients", &ingredient.id)
    );
    card
}

pub fn kit_card(record: &ProductRecord, style: &CardStyle) -> String {
    let product = &record.product;
    let meal = record.meal.as_ref().map_or("Unknown", |m| m.name.as_str());

    let mut card = format!("### 🛒 Meal Kit: {meal}\n\n");
    if let Some(image) = &product.image {
        let _ = writeln!(card, "![Meal Kit Image]({image})\n");
    }
    let _ = writeln!(card, "💰 **Price**: ${:.2}  ", product.price);
    let _ = writeln!(card, "📦 **Stock**: {}  \n", product.stock);
    let _ = writeln!(card, "🔗 [Buy Kit]({})", style.link("products", &product.id));
    card
}
