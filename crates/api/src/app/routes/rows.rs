use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use chipin_core::RowId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/rows/:row_id", get(get_row))
        .route("/rows/:row_id/unclaim", post(unclaim_row))
}

pub async fn get_row(
    Extension(services): Extension<Arc<AppServices>>,
    Path(row_id): Path<String>,
) -> axum::response::Response {
    let row_id: RowId = match row_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid row id"),
    };

    match services.find_row(row_id).await {
        Ok(row) => (StatusCode::OK, Json(dto::row_to_json(&row))).into_response(),
        Err(e) => errors::reservation_error_to_response(e),
    }
}

pub async fn unclaim_row(
    Extension(services): Extension<Arc<AppServices>>,
    Path(row_id): Path<String>,
) -> axum::response::Response {
    let row_id: RowId = match row_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid row id"),
    };

    match services.unclaim(row_id).await {
        Ok(row) => (StatusCode::OK, Json(dto::row_to_json(&row))).into_response(),
        Err(e) => errors::reservation_error_to_response(e),
    }
}
