//! Recipe catalog
//!
//! The application behind the access gate: a small recipe store plus
//! extraction of recipes from photos.

pub mod extraction;
pub mod model;
pub mod store;

pub use extraction::{
    ALLOWED_CONTENT_TYPES, ExtractionResult, ImageUpload, MAX_IMAGE_BYTES, RecipeImageProcessor,
    parse_extracted_recipe,
};
pub use model::{ExtractedRecipe, NewRecipe, PLACEHOLDER_IMAGE_URL, Recipe, RecipeSummary};
pub use store::{InMemoryRecipeStore, RecipeStore};
