/**
 * Site Content Routes
 * Editable text blocks of the public site, per section and language
 */
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::db::content as store;
use crate::db::models::SiteContent;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::routes::non_empty;
use crate::AppState;

const DEFAULT_LANGUAGE: &str = "fr";

#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    pub section: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentUpdate {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub language: Option<String>,
    #[serde(default)]
    pub section: String,
}

/// GET /api/{public,admin}/content?section=&language=
pub async fn get_content(
    State(state): State<AppState>,
    Query(query): Query<ContentQuery>,
) -> ApiResult<Json<Vec<SiteContent>>> {
    let language = non_empty(&query.language).unwrap_or(DEFAULT_LANGUAGE);
    let content = store::list(state.store.pool(), non_empty(&query.section), language).await?;
    Ok(Json(content))
}

/// PUT /api/admin/content
///
/// Upserts on `(key, language)`; an empty section keeps the stored one.
pub async fn update_content(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<ContentUpdate>,
) -> ApiResult<Json<SiteContent>> {
    let key = update.key.trim();
    if key.is_empty() {
        return Err(ApiError::invalid("Key is required"));
    }
    let language = non_empty(&update.language).unwrap_or(DEFAULT_LANGUAGE);

    let row = store::upsert(
        state.store.pool(),
        key,
        &update.value,
        language,
        update.section.trim(),
    )
    .await?;
    tracing::info!(key = %row.key, language = %row.language, "site content updated");
    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_then_read_by_language() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let put = |body| app.send_json(Method::PUT, "/api/admin/content", body, Some(&token));

        let (status, first) = put(json!({"key": "hero_title", "value": "Bienvenue", "section": "hero"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["language"], "fr");

        put(json!({"key": "hero_title", "value": "Welcome", "language": "en", "section": "hero"})).await;
        let (_, second) = put(json!({"key": "hero_title", "value": "Bienvenue chez nous"})).await;
        assert_eq!(second["id"], first["id"]);
        assert_eq!(second["section"], "hero");

        let (_, fr) = app.get("/api/public/content?section=hero", None).await;
        assert_eq!(fr.as_array().unwrap().len(), 1);
        assert_eq!(fr[0]["value"], "Bienvenue chez nous");

        let (_, en) = app.get("/api/public/content?language=en", None).await;
        assert_eq!(en[0]["value"], "Welcome");

        let (_, other) = app.get("/api/public/content?section=footer", None).await;
        assert!(other.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_is_required() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let (status, _) = app
            .send_json(Method::PUT, "/api/admin/content", json!({"value": "x"}), Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
