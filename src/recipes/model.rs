//! Recipe data types

use crate::error::{RecipeError, RecipeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Image shown for recipes that have none of their own
pub const PLACEHOLDER_IMAGE_URL: &str = "/api/placeholder/300/200";

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_COOK_TIME_LEN: usize = 50;
pub const MAX_DIFFICULTY_LEN: usize = 20;

/// A stored recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    /// Minutes
    pub prep_time: Option<u32>,
    /// Free text, e.g. "20 minutes"
    pub cook_time: String,
    pub cook_time_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub difficulty: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List view of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub cook_time: String,
    pub difficulty: String,
    pub image_url: String,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            cook_time: recipe.cook_time.clone(),
            difficulty: recipe.difficulty.clone(),
            image_url: recipe.image_url.clone(),
        }
    }
}

/// Payload for creating a recipe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<u32>,
    pub cook_time: String,
    pub cook_time_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub difficulty: String,
    pub image_url: Option<String>,
}

impl NewRecipe {
    /// Check required fields and column lengths
    pub fn validate(&self) -> RecipeResult<()> {
        if self.title.trim().is_empty() {
            return Err(RecipeError::required("title"));
        }
        check_len("title", &self.title, MAX_TITLE_LEN)?;
        check_len("description", &self.description, MAX_DESCRIPTION_LEN)?;
        check_len("cookTime", &self.cook_time, MAX_COOK_TIME_LEN)?;
        check_len("difficulty", &self.difficulty, MAX_DIFFICULTY_LEN)?;
        Ok(())
    }

    /// Turn a validated payload into a stored recipe
    pub(crate) fn into_recipe(self, id: i64, now: DateTime<Utc>) -> Recipe {
        Recipe {
            id,
            title: self.title.trim().to_string(),
            description: self.description,
            ingredients: self.ingredients,
            instructions: self.instructions,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            cook_time_minutes: self.cook_time_minutes,
            servings: self.servings,
            difficulty: self.difficulty,
            image_url: self
                .image_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> RecipeResult<()> {
    if value.chars().count() > max {
        Err(RecipeError::too_long(field, max))
    } else {
        Ok(())
    }
}

/// Recipe read from a photo by the vision model
///
/// Field names are matched in camelCase or PascalCase, and `null` lists are
/// read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecipe {
    #[serde(default, alias = "Title", deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(default, alias = "Ingredients", deserialize_with = "null_as_default")]
    pub ingredients: Vec<String>,
    #[serde(default, alias = "Instructions", deserialize_with = "null_as_default")]
    pub instructions: Vec<String>,
    /// Minutes
    #[serde(default, alias = "PrepTime")]
    pub prep_time: Option<u32>,
    /// Minutes
    #[serde(default, alias = "CookTime")]
    pub cook_time: Option<u32>,
    #[serde(default, alias = "Servings")]
    pub servings: Option<u32>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<ExtractedRecipe> for NewRecipe {
    fn from(extracted: ExtractedRecipe) -> Self {
        Self {
            title: extracted.title,
            description: extracted.description.unwrap_or_default(),
            ingredients: extracted.ingredients,
            instructions: extracted.instructions,
            prep_time: extracted.prep_time,
            cook_time: extracted
                .cook_time
                .map(|m| format!("{} minutes", m))
                .unwrap_or_default(),
            cook_time_minutes: extracted.cook_time,
            servings: extracted.servings,
            difficulty: String::new(),
            image_url: None,
        }
    }
}
