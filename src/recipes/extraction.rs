//! Recipe extraction from photos
//!
//! Sends the image to an Azure OpenAI vision deployment and parses the JSON
//! recipe it answers with.

use crate::config::OpenAiConfig;
use crate::error::ExtractionError;
use crate::recipes::model::ExtractedRecipe;
use crate::util::SecretString;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Largest accepted upload
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Accepted upload content types
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

const SYSTEM_PROMPT: &str = r#"You are a recipe extraction expert. Analyze the provided recipe image and extract all information into a structured JSON format.

Extract the following fields:
- title: The recipe name
- description: A brief description or subtitle if available
- ingredients: Array of ingredient strings (e.g., "2 cups flour", "1 tsp salt")
- instructions: Array of instruction steps as separate strings
- prepTime: Preparation time in minutes (extract from text like "Prep: 15 min")
- cookTime: Cooking time in minutes (extract from text like "Cook: 30 min")
- servings: Number of servings (extract from text like "Serves 4")

If any field is not clearly visible or mentioned in the image, use null for that field.

Respond with ONLY valid JSON in this exact format:
{
  "title": "Recipe Name",
  "description": "Brief description",
  "ingredients": ["ingredient 1", "ingredient 2"],
  "instructions": ["step 1", "step 2"],
  "prepTime": 15,
  "cookTime": 30,
  "servings": 4
}"#;

const USER_PROMPT: &str = "Please extract the recipe information from this image:";

/// An uploaded image
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reject empty, oversized, or non-image uploads
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.bytes.is_empty() {
            return Err(ExtractionError::NoImage);
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(ExtractionError::TooLarge {
                max_mb: MAX_IMAGE_BYTES / 1024 / 1024,
            });
        }
        let content_type = self.content_type.to_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ExtractionError::UnsupportedType {
                allowed: ALLOWED_CONTENT_TYPES.join(", "),
            });
        }
        Ok(())
    }

    fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type.to_lowercase(),
            STANDARD.encode(&self.bytes)
        )
    }
}

/// Response body of `POST /api/recipes/from-image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_recipe: Option<ExtractedRecipe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExtractionResult {
    pub fn success(recipe: ExtractedRecipe) -> Self {
        Self {
            success: true,
            extracted_recipe: Some(recipe),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            extracted_recipe: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Azure OpenAI vision client
pub struct RecipeImageProcessor {
    http: Client,
    url: String,
    api_key: SecretString,
}

impl RecipeImageProcessor {
    /// Create a processor; `NotConfigured` unless endpoint, key and deployment are set
    pub fn new(config: &OpenAiConfig) -> Result<Self, ExtractionError> {
        let (Some(url), Some(api_key)) = (config.completions_url(), config.api_key.clone()) else {
            return Err(ExtractionError::NotConfigured);
        };
        if api_key.is_empty() {
            return Err(ExtractionError::NotConfigured);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("recipe-api/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, url, api_key })
    }

    /// Extract a recipe from an uploaded photo
    #[instrument(skip(self, image), fields(content_type = %image.content_type, size = image.bytes.len()))]
    pub async fn extract(&self, image: &ImageUpload) -> Result<ExtractedRecipe, ExtractionError> {
        image.validate()?;

        info!("Extracting recipe from image");

        let body = json!({
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_PROMPT },
                        { "type": "image_url", "image_url": { "url": image.data_url() } }
                    ]
                }
            ],
            "temperature": 0.2,
            "max_tokens": 2000
        });

        let response = self
            .http
            .post(&self.url)
            .header("api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Vision API request failed");
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                message: if message.is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    message
                },
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractionError::InvalidResponse("no choices in response".into()))?;

        debug!(response = %content, "Received vision API response");
        parse_extracted_recipe(&content)
    }
}

/// Parse the model's reply, tolerating a surrounding Markdown code fence
pub fn parse_extracted_recipe(content: &str) -> Result<ExtractedRecipe, ExtractionError> {
    let json = strip_code_fence(content);
    let recipe: ExtractedRecipe =
        serde_json::from_str(json).map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

    if recipe.title.trim().is_empty() {
        return Err(ExtractionError::NoRecipe);
    }
    Ok(recipe)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
