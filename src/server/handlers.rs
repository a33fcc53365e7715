//! Route handlers

use crate::access_control::Identity;
use crate::auth::{ClientPrincipal, IssuedToken};
use crate::error::ExtractionError;
use crate::recipes::{
    ExtractedRecipe, ExtractionResult, ImageUpload, NewRecipe, Recipe, RecipeSummary,
};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{Value, json};
use tracing::{error, info, warn};

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /api/auth/token`
///
/// Exchanges the platform principal header for a bearer token.
pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IssuedToken>, ApiError> {
    let raw = headers
        .get(&state.principal_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let Some(raw) = raw else {
        warn!("No principal header found in token request");
        return Err(ApiError::Unauthorized("Authentication required".into()));
    };

    let principal = ClientPrincipal::from_header(raw).map_err(|e| {
        warn!(error = %e, "Failed to decode principal header");
        ApiError::BadRequest("Invalid authentication header format".into())
    })?;

    let Some(email) = principal.email() else {
        warn!("Could not extract email from principal header");
        return Err(ApiError::BadRequest(
            "Could not extract email from authentication principal".into(),
        ));
    };

    let issued = state.tokens.issue(email.trim())?;
    info!(email = %issued.email, "Issued bearer token");
    Ok(Json(issued))
}

/// `GET /api/recipes`
pub async fn list_recipes(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    let recipes = state.recipes.list().await?;
    Ok(Json(recipes.iter().map(RecipeSummary::from).collect()))
}

/// `GET /api/recipes/{id}`
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.recipes.get(id).await?))
}

/// `POST /api/recipes`
pub async fn create_recipe(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Json(recipe): Json<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let recipe = state.recipes.create(recipe).await?;
    if let Some(Extension(identity)) = identity {
        info!(id = recipe.id, created_by = %identity, "Recipe added");
    }
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// `DELETE /api/recipes/{id}`
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.recipes.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/recipes/from-image`
///
/// Reads the multipart field `image` and asks the vision model for a recipe.
/// Nothing is stored; the client reviews the result and saves it separately.
pub async fn extract_from_image(State(state): State<AppState>, multipart: Multipart) -> Response {
    let Some(extractor) = state.extractor.as_ref() else {
        return extraction_failure(StatusCode::SERVICE_UNAVAILABLE, &ExtractionError::NotConfigured);
    };

    let image = match read_image_field(multipart).await {
        Ok(Some(image)) => image,
        Ok(None) => return extraction_failure(StatusCode::BAD_REQUEST, &ExtractionError::NoImage),
        Err(message) => {
            warn!(error = %message, "Failed to read multipart upload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ExtractionResult::failure(message)),
            )
                .into_response();
        }
    };

    match extractor.extract(&image).await {
        Ok(recipe) => {
            info!(title = %recipe.title, "Recipe extracted from image");
            Json(ExtractionResult::success(recipe)).into_response()
        }
        Err(e) if e.is_client_error() => extraction_failure(StatusCode::BAD_REQUEST, &e),
        Err(ExtractionError::NoRecipe) => {
            extraction_failure(StatusCode::UNPROCESSABLE_ENTITY, &ExtractionError::NoRecipe)
        }
        Err(e) => {
            error!(error = %e, "Error extracting recipe from image");
            (
                StatusCode::BAD_GATEWAY,
                Json(ExtractionResult::failure(format!("Error processing image: {}", e))),
            )
                .into_response()
        }
    }
}

async fn read_image_field(mut multipart: Multipart) -> Result<Option<ImageUpload>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| e.body_text())?;
        return Ok(Some(ImageUpload::new(content_type, bytes.to_vec())));
    }
    Ok(None)
}

fn extraction_failure(status: StatusCode, error: &ExtractionError) -> Response {
    (status, Json(ExtractionResult::failure(error.to_string()))).into_response()
}

/// `POST /api/recipes/save-extracted`
pub async fn save_extracted(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Json(extracted): Json<ExtractedRecipe>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let recipe = state.recipes.create(NewRecipe::from(extracted)).await?;
    if let Some(Extension(identity)) = identity {
        info!(id = recipe.id, created_by = %identity, "Extracted recipe saved");
    }
    Ok((StatusCode::CREATED, Json(recipe)))
}
