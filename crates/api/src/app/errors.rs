use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use chipin_infra::ReservationError;

pub fn reservation_error_to_response(err: ReservationError) -> axum::response::Response {
    match err {
        ReservationError::InvalidQuantity(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", msg)
        }
        ReservationError::EmptyClaimantName => json_error(
            StatusCode::BAD_REQUEST,
            "empty_claimant_name",
            "claimant name must not be empty",
        ),
        ReservationError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ReservationError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        ReservationError::InsufficientQuantity {
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_quantity",
                "message": format!("requested {requested}, only {available} available"),
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        ReservationError::ConcurrentModification(msg) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        ReservationError::NotClaimed => json_error(
            StatusCode::CONFLICT,
            "not_claimed",
            "row is not claimed",
        ),
        ReservationError::RowNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "row not found")
        }
        ReservationError::Store(e) => {
            // Store failures carry backend detail that does not belong in a
            // client-visible body; log it and answer generically.
            tracing::error!(error = %e, "store failure while serving request");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage failure",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipin_infra::RowStoreError;

    #[tokio::test]
    async fn store_failures_answer_generically() {
        let err = ReservationError::Store(RowStoreError::Storage(
            "connection refused to db at 10.0.0.17:5432".to_string(),
        ));
        let response = reservation_error_to_response(err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "store_error");
        let message = body["message"].as_str().unwrap();
        assert!(!message.contains("10.0.0.17"));
        assert!(!message.contains("connection refused"));
    }
}
