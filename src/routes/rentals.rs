/**
 * Rental Routes
 * Public catalogue and admin management of rental items with image uploads
 */
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::categories;
use crate::db::models::{NewRentalItem, RentalItem};
use crate::db::rentals::{self as store, RentalFilter};
use crate::db::StoreError;
use crate::error::{parse_id, ApiError, ApiResult};
use crate::routes::upload::{self, MultipartForm, UploadKind};
use crate::routes::{bool_param, non_empty, MessageResponse};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RentalQuery {
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub featured: Option<String>,
    pub available: Option<String>,
}

/// Category named by the form, as `category_id` or as a `category` slug.
async fn form_category(pool: &SqlitePool, form: &MultipartForm) -> ApiResult<Option<i64>> {
    if let Some(id) = form.number::<i64>("category_id")? {
        return match categories::get(pool, id).await {
            Ok(category) => Ok(Some(category.id)),
            Err(StoreError::NotFound { .. }) => Err(ApiError::invalid("Unknown category")),
            Err(e) => Err(e.into()),
        };
    }
    match form.text("category") {
        Some(slug) => categories::find_by_slug(pool, slug)
            .await?
            .map(|c| Some(c.id))
            .ok_or_else(|| ApiError::invalid("Unknown category")),
        None => Ok(None),
    }
}

fn form_price(form: &MultipartForm) -> ApiResult<Option<f64>> {
    match form.number::<f64>("price")? {
        Some(price) if !price.is_finite() || price < 0.0 => {
            Err(ApiError::invalid("Price must be a positive amount"))
        }
        price => Ok(price),
    }
}

/// GET /api/{public,admin}/rentals?category=&category_id=&featured=&available=
pub async fn list_rentals(
    State(state): State<AppState>,
    Query(query): Query<RentalQuery>,
) -> ApiResult<Json<Vec<RentalItem>>> {
    let category_id = non_empty(&query.category_id)
        .map(|raw| parse_id(raw, "category"))
        .transpose()?;
    let filter = RentalFilter {
        category_slug: non_empty(&query.category).map(str::to_string),
        category_id,
        featured: bool_param(&query.featured, "featured")?,
        available: bool_param(&query.available, "available")?,
    };
    Ok(Json(store::list(state.store.pool(), &filter).await?))
}

/// GET /api/admin/rentals/{id}
pub async fn get_rental(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RentalItem>> {
    let id = parse_id(&id, "item")?;
    Ok(Json(store::get(state.store.pool(), id).await?))
}

/// POST /api/admin/rentals (multipart: image, title, description, price, category_id, featured)
pub async fn create_rental(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = MultipartForm::read(multipart).await?;
    let image = form
        .image
        .as_ref()
        .ok_or_else(|| ApiError::invalid("Image file is required"))?;
    let title = form
        .text("title")
        .ok_or_else(|| ApiError::invalid("Title is required"))?;

    let pool = state.store.pool();
    let category_id = form_category(pool, &form).await?;
    let price = form_price(&form)?.unwrap_or(0.0);
    let featured = form.bool("featured")?.unwrap_or(false);
    let available = form.bool("available")?.unwrap_or(true);

    let saved = upload::save_image(&state.config.storage.upload_dir, UploadKind::Rentals, image).await?;
    let new = NewRentalItem {
        title: title.to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        price,
        category_id,
        image_url: saved.url.clone(),
        featured,
        available,
    };

    let created = match store::insert(pool, &new).await {
        Ok(id) => store::get(pool, id).await?,
        Err(e) => {
            saved.discard().await;
            return Err(e.into());
        }
    };

    tracing::info!(item_id = created.id, "rental item created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/rentals/{id} (multipart, every field optional)
pub async fn update_rental(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<RentalItem>> {
    let id = parse_id(&id, "item")?;
    let form = MultipartForm::read(multipart).await?;
    let pool = state.store.pool();
    let mut item = store::get(pool, id).await?;

    if let Some(title) = form.text("title") {
        item.title = title.to_string();
    }
    if let Some(description) = form.text("description") {
        item.description = description.to_string();
    }
    if let Some(category_id) = form_category(pool, &form).await? {
        item.category_id = Some(category_id);
    }
    if let Some(price) = form_price(&form)? {
        item.price = price;
    }
    if let Some(featured) = form.bool("featured")? {
        item.featured = featured;
    }
    if let Some(available) = form.bool("available")? {
        item.available = available;
    }

    let saved = match &form.image {
        Some(image) => {
            let saved = upload::save_image(&state.config.storage.upload_dir, UploadKind::Rentals, image).await?;
            item.image_url = saved.url.clone();
            Some(saved)
        }
        None => None,
    };

    if let Err(e) = store::update(pool, &item).await {
        if let Some(saved) = saved {
            saved.discard().await;
        }
        return Err(e.into());
    }

    Ok(Json(store::get(pool, id).await?))
}

/// DELETE /api/admin/rentals/{id}
pub async fn delete_rental(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "item")?;
    store::delete(state.store.pool(), id).await?;
    Ok(Json(MessageResponse::new("Item deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::upload::PNG_BYTES;
    use crate::test_support::TestApp;
    use axum::http::Method;

    async fn category_id(app: &TestApp, slug: &str) -> i64 {
        categories::find_by_slug(app.state.store.pool(), slug)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    async fn create(app: &TestApp, token: &str, fields: &[(&str, &str)]) -> (StatusCode, serde_json::Value) {
        app.send_multipart(
            Method::POST,
            "/api/admin/rentals",
            fields,
            Some(("vase.png", PNG_BYTES)),
            Some(token),
        )
        .await
    }

    #[tokio::test]
    async fn test_create_embeds_category() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let flower = category_id(&app, "flower").await.to_string();

        let (status, body) = create(
            &app,
            &token,
            &[("title", "Bouquet"), ("price", "25.5"), ("category_id", flower.as_str()), ("featured", "true")],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["price"], 25.5);
        assert_eq!(body["available"], true);
        assert_eq!(body["category"]["slug"], "flower");
        assert!(body["image_url"].as_str().unwrap().starts_with("/uploads/rentals/"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;

        let (status, _) = app
            .send_multipart(Method::POST, "/api/admin/rentals", &[("title", "Vase")], None, Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = create(&app, &token, &[("title", "Vase"), ("category_id", "9999")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = create(&app, &token, &[("title", "Vase"), ("price", "-3")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = create(&app, &token, &[("price", "3")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_public_filters() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        create(&app, &token, &[("title", "Bouquet"), ("category", "flower"), ("featured", "true")]).await;
        create(&app, &token, &[("title", "Arche"), ("category", "backdrop"), ("available", "false")]).await;

        let (_, all) = app.get("/api/public/rentals", None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        assert_eq!(all[0]["title"], "Arche");

        let (_, flowers) = app.get("/api/public/rentals?category=flower", None).await;
        assert_eq!(flowers.as_array().unwrap().len(), 1);
        assert_eq!(flowers[0]["title"], "Bouquet");

        let backdrop = category_id(&app, "backdrop").await;
        let (_, by_id) = app
            .get(&format!("/api/public/rentals?category_id={}", backdrop), None)
            .await;
        assert_eq!(by_id[0]["title"], "Arche");

        let (_, available) = app.get("/api/public/rentals?available=true", None).await;
        assert_eq!(available.as_array().unwrap().len(), 1);
        let (_, featured) = app.get("/api/public/rentals?featured=true", None).await;
        assert_eq!(featured.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_with_and_without_image() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let (_, created) = create(&app, &token, &[("title", "Vase"), ("price", "10")]).await;
        let uri = format!("/api/admin/rentals/{}", created["id"]);

        let (status, body) = app
            .send_multipart(
                Method::PUT,
                &uri,
                &[("price", "12"), ("available", "false"), ("category", "centerpiece")],
                None,
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["price"], 12.0);
        assert_eq!(body["available"], false);
        assert_eq!(body["title"], "Vase");
        assert_eq!(body["image_url"], created["image_url"]);
        assert_eq!(body["category"]["slug"], "centerpiece");

        let (status, body) = app
            .send_multipart(Method::PUT, &uri, &[], Some(("new.png", PNG_BYTES)), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["image_url"], created["image_url"]);

        let (_, fetched) = app.get(&uri, Some(&token)).await;
        assert_eq!(fetched["image_url"], body["image_url"]);
    }

    #[tokio::test]
    async fn test_update_missing_item_leaves_no_file() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let (status, _) = app
            .send_multipart(
                Method::PUT,
                "/api/admin/rentals/4242",
                &[],
                Some(("new.png", PNG_BYTES)),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let dir = app.state.config.storage.upload_dir.join("rentals");
        let written = std::fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_delete_rental() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let (_, created) = create(&app, &token, &[("title", "Vase")]).await;
        let uri = format!("/api/admin/rentals/{}", created["id"]);

        let (status, _) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.get(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, list) = app.get("/api/public/rentals", None).await;
        assert!(list.as_array().unwrap().is_empty());
    }
}
