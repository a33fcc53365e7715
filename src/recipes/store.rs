//! Recipe storage

use crate::error::{RecipeError, RecipeResult};
use crate::recipes::model::{NewRecipe, PLACEHOLDER_IMAGE_URL, Recipe};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::info;

/// Recipe persistence
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// All recipes ordered by id
    async fn list(&self) -> RecipeResult<Vec<Recipe>>;

    async fn get(&self, id: i64) -> RecipeResult<Recipe>;

    /// Validate and store a recipe, assigning its id
    async fn create(&self, recipe: NewRecipe) -> RecipeResult<Recipe>;

    async fn delete(&self, id: i64) -> RecipeResult<()>;
}

#[derive(Debug, Default)]
struct Catalog {
    recipes: BTreeMap<i64, Recipe>,
    next_id: i64,
}

/// Process-local recipe store
#[derive(Debug, Default)]
pub struct InMemoryRecipeStore {
    catalog: RwLock<Catalog>,
}

impl InMemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the demo recipes
    pub fn with_seed_data() -> Self {
        let now = Utc::now();
        let seeds = [
            (
                "Classic Spaghetti Carbonara",
                "A traditional Italian pasta dish with eggs, cheese, and pancetta",
                "20 minutes",
                "Medium",
            ),
            (
                "Chicken Tikka Masala",
                "Creamy and flavorful Indian curry with tender chicken pieces",
                "45 minutes",
                "Medium",
            ),
            (
                "Chocolate Chip Cookies",
                "Soft and chewy homemade cookies with chocolate chips",
                "25 minutes",
                "Easy",
            ),
            (
                "Caesar Salad",
                "Fresh romaine lettuce with homemade caesar dressing and croutons",
                "15 minutes",
                "Easy",
            ),
        ];

        let mut catalog = Catalog::default();
        for (title, description, cook_time, difficulty) in seeds {
            catalog.next_id += 1;
            let recipe = NewRecipe {
                title: title.into(),
                description: description.into(),
                cook_time: cook_time.into(),
                difficulty: difficulty.into(),
                image_url: Some(PLACEHOLDER_IMAGE_URL.into()),
                ..Default::default()
            }
            .into_recipe(catalog.next_id, now);
            catalog.recipes.insert(recipe.id, recipe);
        }

        Self {
            catalog: RwLock::new(catalog),
        }
    }
}

#[async_trait]
impl RecipeStore for InMemoryRecipeStore {
    async fn list(&self) -> RecipeResult<Vec<Recipe>> {
        Ok(self.catalog.read().await.recipes.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> RecipeResult<Recipe> {
        self.catalog
            .read()
            .await
            .recipes
            .get(&id)
            .cloned()
            .ok_or(RecipeError::NotFound { id })
    }

    async fn create(&self, recipe: NewRecipe) -> RecipeResult<Recipe> {
        recipe.validate()?;

        let mut catalog = self.catalog.write().await;
        catalog.next_id += 1;
        let recipe = recipe.into_recipe(catalog.next_id, Utc::now());
        catalog.recipes.insert(recipe.id, recipe.clone());

        info!(id = recipe.id, title = %recipe.title, "Recipe created");
        Ok(recipe)
    }

    async fn delete(&self, id: i64) -> RecipeResult<()> {
        match self.catalog.write().await.recipes.remove(&id) {
            Some(_) => {
                info!(id, "Recipe deleted");
                Ok(())
            }
            None => Err(RecipeError::NotFound { id }),
        }
    }
}
