/**
 * Category Routes
 * Rental and gallery categories
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::db::categories as store;
use crate::db::models::{Category, CategoryKind};
use crate::error::{parse_id, ApiError, ApiJson, ApiResult};
use crate::routes::{enum_param, MessageResponse};
use crate::AppState;

lazy_static! {
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").unwrap();
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn validate_slug(slug: &str) -> ApiResult<String> {
    let slug = slug.trim();
    if !SLUG_RE.is_match(slug) {
        return Err(ApiError::invalid(
            "Invalid slug: use lowercase letters and digits separated by '-' or '_'",
        ));
    }
    Ok(slug.to_string())
}

fn parse_kind(raw: &str) -> ApiResult<CategoryKind> {
    raw.parse().map_err(|e| ApiError::invalid(format!("Invalid {}", e)))
}

/// GET /api/{public,admin}/categories?type=rental|gallery
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<Json<Vec<Category>>> {
    let kind = enum_param::<CategoryKind>(&query.kind)?;
    Ok(Json(store::list(state.store.pool(), kind).await?))
}

/// POST /api/admin/categories
pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid("Name is required"));
    }
    let slug = validate_slug(&req.slug)?;
    let kind = parse_kind(
        req.kind
            .as_deref()
            .ok_or_else(|| ApiError::invalid("Type is required"))?,
    )?;

    let category = store::insert(state.store.pool(), name, &slug, req.description.trim(), kind).await?;
    tracing::info!(category_id = category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/admin/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    let id = parse_id(&id, "category")?;
    let mut category = store::get(state.store.pool(), id).await?;

    if let Some(name) = req.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::invalid("Name cannot be empty"));
        }
        category.name = name.to_string();
    }
    if let Some(slug) = req.slug {
        category.slug = validate_slug(&slug)?;
    }
    if let Some(description) = req.description {
        category.description = description.trim().to_string();
    }
    if let Some(kind) = req.kind {
        category.kind = parse_kind(&kind)?;
    }

    Ok(Json(store::update(state.store.pool(), &category).await?))
}

/// DELETE /api/admin/categories/{id}
///
/// Rental items keep their `category_id`; they are listed without a
/// category reference until reassigned.
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "category")?;
    store::delete(state.store.pool(), id).await?;
    Ok(Json(MessageResponse::new("Category deleted successfully")))
}
