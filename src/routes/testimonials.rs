/**
 * Testimonial Routes
 * Public submissions awaiting approval, admin moderation
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::db::models::{EventType, NewTestimonial, Testimonial};
use crate::db::testimonials::{self as store, TestimonialFilter};
use crate::error::{parse_id, ApiError, ApiJson, ApiResult};
use crate::routes::{bool_param, MessageResponse};
use crate::AppState;

const DEFAULT_RATING: i64 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct TestimonialListQuery {
    pub approved: Option<String>,
    pub featured: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestimonialRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub rating: Option<i64>,
    pub event_type: Option<String>,
    pub client_id: Option<i64>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestimonialUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub rating: Option<i64>,
    pub event_type: Option<String>,
    pub approved: Option<bool>,
    pub featured: Option<bool>,
}

fn check_rating(rating: i64) -> ApiResult<i64> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::invalid("Rating must be between 1 and 5"));
    }
    Ok(rating)
}

fn parse_event_type(raw: Option<&str>) -> ApiResult<Option<EventType>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EventType>().map_err(|e| ApiError::invalid(format!("Invalid {}", e))))
        .transpose()
}

fn validate(req: &TestimonialRequest) -> ApiResult<NewTestimonial> {
    let name = req.name.trim();
    let content = req.content.trim();
    if name.is_empty() || content.is_empty() {
        return Err(ApiError::invalid("Name and content are required"));
    }

    Ok(NewTestimonial {
        client_id: req.client_id,
        name: name.to_string(),
        content: content.to_string(),
        rating: check_rating(req.rating.unwrap_or(DEFAULT_RATING))?,
        event_type: parse_event_type(req.event_type.as_deref())?,
        approved: req.approved,
        featured: req.featured,
    })
}

// ============================================================================
// Public
// ============================================================================

/// GET /api/public/testimonials
pub async fn list_public(State(state): State<AppState>) -> ApiResult<Json<Vec<Testimonial>>> {
    let filter = TestimonialFilter {
        approved: Some(true),
        featured: None,
    };
    Ok(Json(store::list(state.store.pool(), &filter).await?))
}

/// POST /api/public/testimonials
///
/// Submissions are held for moderation regardless of what the body says.
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TestimonialRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut new = validate(&req)?;
    new.approved = false;
    new.featured = false;

    let testimonial = store::insert(state.store.pool(), &new).await?;
    tracing::info!(testimonial_id = testimonial.id, "testimonial submitted");
    Ok((StatusCode::CREATED, Json(testimonial)))
}

// ============================================================================
// Admin
// ============================================================================

/// GET /api/admin/testimonials?approved=&featured=
pub async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<TestimonialListQuery>,
) -> ApiResult<Json<Vec<Testimonial>>> {
    let filter = TestimonialFilter {
        approved: bool_param(&query.approved, "approved")?,
        featured: bool_param(&query.featured, "featured")?,
    };
    Ok(Json(store::list(state.store.pool(), &filter).await?))
}

/// POST /api/admin/testimonials
pub async fn create(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TestimonialRequest>,
) -> ApiResult<impl IntoResponse> {
    let new = validate(&req)?;
    let testimonial = store::insert(state.store.pool(), &new).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

/// PUT /api/admin/testimonials/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<TestimonialUpdate>,
) -> ApiResult<Json<Testimonial>> {
    let id = parse_id(&id, "testimonial")?;
    let mut testimonial = store::get(state.store.pool(), id).await?;

    if let Some(name) = req.name {
        testimonial.name = name.trim().to_string();
    }
    if let Some(content) = req.content {
        testimonial.content = content.trim().to_string();
    }
    if testimonial.name.is_empty() || testimonial.content.is_empty() {
        return Err(ApiError::invalid("Name and content cannot be empty"));
    }
    if let Some(rating) = req.rating {
        testimonial.rating = check_rating(rating)?;
    }
    if req.event_type.is_some() {
        testimonial.event_type = parse_event_type(req.event_type.as_deref())?;
    }
    if let Some(approved) = req.approved {
        testimonial.approved = approved;
    }
    if let Some(featured) = req.featured {
        testimonial.featured = featured;
    }

    Ok(Json(store::update(state.store.pool(), &testimonial).await?))
}

/// DELETE /api/admin/testimonials/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "testimonial")?;
    store::delete(state.store.pool(), id).await?;
    Ok(Json(MessageResponse::new("Testimonial deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_public_submission_is_unapproved() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send_json(
                Method::POST,
                "/api/public/testimonials",
                json!({"name": "Alice", "content": "Parfait !", "approved": true, "featured": true}),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["approved"], false);
        assert_eq!(body["featured"], false);
        assert_eq!(body["rating"], 5);

        let (_, public) = app.get("/api/public/testimonials", None).await;
        assert!(public.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rating_bounds() {
        let app = TestApp::new().await;
        for rating in [0, 6] {
            let (status, _) = app
                .send_json(
                    Method::POST,
                    "/api/public/testimonials",
                    json!({"name": "Alice", "content": "ok", "rating": rating}),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_approval_publishes() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let (_, created) = app
            .send_json(
                Method::POST,
                "/api/public/testimonials",
                json!({"name": "Alice", "content": "Magnifique", "rating": 4, "event_type": "wedding"}),
                None,
            )
            .await;

        let (_, pending) = app.get("/api/admin/testimonials?approved=false", Some(&token)).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (status, body) = app
            .send_json(
                Method::PUT,
                &format!("/api/admin/testimonials/{}", created["id"]),
                json!({"approved": true}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approved"], true);
        assert_eq!(body["event_type"], "wedding");

        let (_, public) = app.get("/api/public/testimonials", None).await;
        assert_eq!(public.as_array().unwrap().len(), 1);
        assert_eq!(public[0]["rating"], 4);
    }

    #[tokio::test]
    async fn test_admin_create_filter_and_delete() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let (status, created) = app
            .send_json(
                Method::POST,
                "/api/admin/testimonials",
                json!({"name": "Bob", "content": "Super", "approved": true, "featured": true}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, featured) = app.get("/api/admin/testimonials?featured=true", Some(&token)).await;
        assert_eq!(featured.as_array().unwrap().len(), 1);

        let (status, _) = app.get("/api/admin/testimonials?featured=maybe", Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/testimonials/{}", created["id"]);
        let (status, _) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
