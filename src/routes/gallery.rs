/**
 * Gallery Routes
 * Public gallery listing, admin uploads, edits and storage imports
 */
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::db::gallery::{self as store, CategoryCount, GalleryFilter};
use crate::db::models::{EventType, GalleryCategory, GalleryImage, NewGalleryImage};
use crate::error::{parse_id, ApiError, ApiJson, ApiResult};
use crate::routes::upload::{self, MultipartForm, UploadKind};
use crate::routes::{bool_param, enum_param, non_empty, MessageResponse};
use crate::services::scanner::{self, ScanReport};
use crate::AppState;

const DEFAULT_RANDOM_LIMIT: i64 = 3;
const MAX_RANDOM_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    pub category: Option<String>,
    pub event_type: Option<String>,
    pub featured: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RandomQuery {
    pub category: Option<String>,
    pub limit: Option<String>,
    pub exclude: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GalleryImageUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub sort_order: Option<i64>,
}

fn parse_category(raw: &str) -> ApiResult<GalleryCategory> {
    raw.parse().map_err(|e| ApiError::invalid(format!("Invalid {}", e)))
}

fn parse_limit(raw: &Option<String>) -> ApiResult<i64> {
    match non_empty(raw) {
        None => Ok(DEFAULT_RANDOM_LIMIT),
        Some(s) => s
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_RANDOM_LIMIT))
            .ok_or_else(|| ApiError::invalid("Invalid limit")),
    }
}

/// `1,2, 3` -> `[1, 2, 3]`; blank items are ignored.
fn parse_exclude(raw: &Option<String>) -> ApiResult<Vec<i64>> {
    let Some(list) = non_empty(raw) else {
        return Ok(Vec::new());
    };
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| ApiError::invalid("Invalid exclude list")))
        .collect()
}

/// GET /api/{public,admin}/gallery?category=&event_type=&featured=
///
/// `event_type` selects the gallery section showing that kind of event; an
/// explicit `category` takes precedence.
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<Json<Vec<GalleryImage>>> {
    let mut category = enum_param::<GalleryCategory>(&query.category)?;
    if category.is_none() {
        if let Some(event_type) = enum_param::<EventType>(&query.event_type)? {
            match GalleryCategory::for_event_type(event_type) {
                Some(mapped) => category = Some(mapped),
                None => return Ok(Json(Vec::new())),
            }
        }
    }

    let filter = GalleryFilter {
        category,
        featured: bool_param(&query.featured, "featured")?,
    };
    Ok(Json(store::list(state.store.pool(), &filter).await?))
}

/// GET /api/public/gallery/random?category=&limit=&exclude=
pub async fn random_images(
    State(state): State<AppState>,
    Query(query): Query<RandomQuery>,
) -> ApiResult<Json<Vec<GalleryImage>>> {
    let category = match non_empty(&query.category) {
        None | Some("all") => None,
        Some(raw) => Some(parse_category(raw)?),
    };
    let limit = parse_limit(&query.limit)?;
    let exclude = parse_exclude(&query.exclude)?;

    Ok(Json(store::random(state.store.pool(), category, limit, &exclude).await?))
}

/// POST /api/admin/gallery (multipart: image, title, description, category, featured)
pub async fn create_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = MultipartForm::read(multipart).await?;
    let image = form
        .image
        .as_ref()
        .ok_or_else(|| ApiError::invalid("Image file is required"))?;
    let category = parse_category(
        form.text("category")
            .ok_or_else(|| ApiError::invalid("Category is required"))?,
    )?;
    let featured = form.bool("featured")?.unwrap_or(false);
    let sort_order = form.number::<i64>("sort_order")?.unwrap_or(0);

    let saved = upload::save_image(&state.config.storage.upload_dir, UploadKind::Gallery, image).await?;
    let new = NewGalleryImage {
        title: form
            .text("title")
            .unwrap_or(image.original_name.as_str())
            .to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        image_url: saved.url.clone(),
        category,
        file_name: saved.file_name.clone(),
        is_from_storage: false,
        featured,
        sort_order,
    };

    match store::insert(state.store.pool(), &new).await {
        Ok(created) => {
            tracing::info!(image_id = created.id, category = %created.category, "gallery image created");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(e) => {
            saved.discard().await;
            Err(e.into())
        }
    }
}

/// PUT /api/admin/gallery/{id}
pub async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<GalleryImageUpdate>,
) -> ApiResult<Json<GalleryImage>> {
    let id = parse_id(&id, "image")?;
    let mut image = store::get(state.store.pool(), id).await?;

    if let Some(title) = req.title {
        image.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        image.description = description;
    }
    if let Some(category) = non_empty(&req.category) {
        image.category = parse_category(category)?;
    }
    if let Some(featured) = req.featured {
        image.featured = featured;
    }
    if let Some(sort_order) = req.sort_order {
        image.sort_order = sort_order;
    }

    Ok(Json(store::update(state.store.pool(), &image).await?))
}

/// DELETE /api/admin/gallery/{id}
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "image")?;
    store::delete(state.store.pool(), id).await?;
    Ok(Json(MessageResponse::new("Image deleted successfully")))
}

/// POST /api/admin/gallery/scan
pub async fn scan_storage(State(state): State<AppState>) -> ApiResult<Json<ScanReport>> {
    let report = scanner::scan(&state.store, &state.scanner).await.map_err(|e| {
        tracing::error!(error = %e, "storage scan failed");
        ApiError::internal("Failed to scan storage folder")
    })?;
    Ok(Json(report))
}

/// GET /api/admin/gallery/categories
pub async fn category_stats(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryCount>>> {
    Ok(Json(store::category_counts(state.store.pool()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::upload::PNG_BYTES;
    use crate::test_support::TestApp;
    use axum::http::Method;
    use serde_json::json;

    async fn upload(app: &TestApp, token: &str, category: &str, featured: &str) -> serde_json::Value {
        let (status, body) = app
            .send_multipart(
                Method::POST,
                "/api/admin/gallery",
                &[("title", "Salle"), ("category", category), ("featured", featured)],
                Some(("salle.png", PNG_BYTES)),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    #[test]
    fn test_limit_and_exclude_parsing() {
        assert_eq!(parse_limit(&None).unwrap(), 3);
        assert_eq!(parse_limit(&Some("500".into())).unwrap(), 50);
        assert!(parse_limit(&Some("0".into())).is_err());
        assert!(parse_limit(&Some("many".into())).is_err());

        assert_eq!(parse_exclude(&Some("1, 2,,3".into())).unwrap(), vec![1, 2, 3]);
        assert!(parse_exclude(&Some("1,x".into())).is_err());
        assert!(parse_exclude(&None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_row() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let body = upload(&app, &token, "wedding", "true").await;

        assert_eq!(body["category"], "wedding");
        assert_eq!(body["featured"], true);
        assert_eq!(body["is_from_storage"], false);
        let url = body["image_url"].as_str().unwrap();
        assert!(url.starts_with("/uploads/gallery/"));
        assert_eq!(body["thumbnail_url"], url);

        let file = app
            .state
            .config
            .storage
            .upload_dir
            .join("gallery")
            .join(body["file_name"].as_str().unwrap());
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;

        let (status, _) = app
            .send_multipart(Method::POST, "/api/admin/gallery", &[("category", "wedding")], None, Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send_multipart(
                Method::POST,
                "/api/admin/gallery",
                &[("category", "wedding")],
                Some(("notes.txt", &b"hello"[..])),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send_multipart(
                Method::POST,
                "/api/admin/gallery",
                &[("category", "party")],
                Some(("a.png", PNG_BYTES)),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Nothing was written for the rejected requests.
        let dir = app.state.config.storage.upload_dir.join("gallery");
        let written = std::fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_public_filters() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        upload(&app, &token, "wedding", "true").await;
        upload(&app, &token, "marryme", "false").await;
        upload(&app, &token, "birthday", "false").await;

        let (_, all) = app.get("/api/public/gallery", None).await;
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, featured) = app.get("/api/public/gallery?featured=true", None).await;
        assert_eq!(featured.as_array().unwrap().len(), 1);

        let (_, proposals) = app.get("/api/public/gallery?event_type=proposal", None).await;
        assert_eq!(proposals.as_array().unwrap().len(), 1);
        assert_eq!(proposals[0]["category"], "marryme");

        let (_, corporate) = app.get("/api/public/gallery?event_type=corporate", None).await;
        assert!(corporate.as_array().unwrap().is_empty());

        let (status, _) = app.get("/api/public/gallery?category=party", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_random_respects_limit_and_exclude() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let first = upload(&app, &token, "wedding", "false").await;
        for _ in 0..4 {
            upload(&app, &token, "wedding", "false").await;
        }
        upload(&app, &token, "birthday", "false").await;

        let (_, three) = app.get("/api/public/gallery/random?category=wedding", None).await;
        assert_eq!(three.as_array().unwrap().len(), 3);

        let (_, rest) = app
            .get(
                &format!("/api/public/gallery/random?category=wedding&limit=10&exclude={}", first["id"]),
                None,
            )
            .await;
        let rest = rest.as_array().unwrap();
        assert_eq!(rest.len(), 4);
        assert!(rest.iter().all(|img| img["id"] != first["id"]));

        let (_, all) = app.get("/api/public/gallery/random?category=all&limit=10", None).await;
        assert_eq!(all.as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let created = upload(&app, &token, "wedding", "false").await;
        let uri = format!("/api/admin/gallery/{}", created["id"]);

        let (status, body) = app
            .send_json(
                Method::PUT,
                &uri,
                json!({"category": "loveroom", "sort_order": 2, "featured": true}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "loveroom");
        assert_eq!(body["sort_order"], 2);
        assert_eq!(body["title"], "Salle");

        let (status, _) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_imports_storage_once() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let root = &app.state.config.storage.storage_dir;
        std::fs::create_dir_all(root.join("Weeding")).unwrap();
        std::fs::create_dir_all(root.join("location")).unwrap();
        std::fs::create_dir_all(root.join("misc")).unwrap();
        std::fs::write(root.join("Weeding").join("salle 1.jpg"), PNG_BYTES).unwrap();
        std::fs::write(root.join("location").join("arche_florale.jpg"), PNG_BYTES).unwrap();

        let (status, report) = app
            .send_json(Method::POST, "/api/admin/gallery/scan", json!({}), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["gallery"]["imported"], 1);
        assert_eq!(report["rentals"]["imported"], 1);
        assert_eq!(report["skipped_directories"], json!(["misc"]));

        let (_, images) = app.get("/api/public/gallery?category=wedding", None).await;
        assert_eq!(images[0]["image_url"], "/storage/Weeding/salle%201.jpg");
        assert_eq!(images[0]["is_from_storage"], true);

        let (_, again) = app
            .send_json(Method::POST, "/api/admin/gallery/scan", json!({}), Some(&token))
            .await;
        assert_eq!(again["gallery"]["imported"], 0);
        assert_eq!(again["gallery"]["skipped"], 1);
        assert_eq!(again["rentals"]["skipped"], 1);
    }

    #[tokio::test]
    async fn test_category_stats_list_every_category() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        upload(&app, &token, "congrats", "false").await;

        let (status, stats) = app.get("/api/admin/gallery/categories", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let stats = stats.as_array().unwrap();
        assert_eq!(stats.len(), GalleryCategory::ALL.len());
        let congrats = stats.iter().find(|s| s["category"] == "congrats").unwrap();
        assert_eq!(congrats["count"], 1);
    }
}
