use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use chipin_core::ListId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/lists/:list_id/items", post(add_item))
        .route("/lists/:list_id/claims", post(claim))
        .route("/lists/:list_id/consolidated", get(get_consolidated))
        .route("/lists/:list_id/progress", get(get_progress))
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(list_id): Path<String>,
    Json(body): Json<dto::AddItemRequest>,
) -> axum::response::Response {
    let list_id: ListId = match list_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid list id"),
    };

    let row = match services
        .add_row(
            list_id,
            body.name,
            body.quantity.unwrap_or(1),
            body.display_order.unwrap_or(0),
        )
        .await
    {
        Ok(row) => row,
        Err(e) => return errors::reservation_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::row_to_json(&row))).into_response()
}

pub async fn claim(
    Extension(services): Extension<Arc<AppServices>>,
    Path(list_id): Path<String>,
    Json(body): Json<dto::ClaimRequest>,
) -> axum::response::Response {
    let list_id: ListId = match list_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid list id"),
    };

    let settled = match services
        .claim(list_id, body.item, body.claimant, body.quantity)
        .await
    {
        Ok(settled) => settled,
        Err(e) => return errors::reservation_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "claimed_quantity": settled.iter().map(|r| r.quantity).sum::<u32>(),
            "rows": settled.iter().map(dto::row_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub async fn get_consolidated(
    Extension(services): Extension<Arc<AppServices>>,
    Path(list_id): Path<String>,
) -> axum::response::Response {
    let list_id: ListId = match list_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid list id"),
    };

    let items = match services.consolidated_view(list_id).await {
        Ok(items) => items,
        Err(e) => return errors::reservation_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "items": items.iter().map(dto::consolidated_item_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub async fn get_progress(
    Extension(services): Extension<Arc<AppServices>>,
    Path(list_id): Path<String>,
) -> axum::response::Response {
    let list_id: ListId = match list_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid list id"),
    };

    let progress = match services.progress(list_id).await {
        Ok(progress) => progress,
        Err(e) => return errors::reservation_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::progress_to_json(&progress))).into_response()
}
