use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use orderflow_infra::CheckoutError;

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    match err {
        CheckoutError::EmptyCart => {
            json_error(StatusCode::BAD_REQUEST, "empty_cart", err.to_string())
        }
        CheckoutError::ProductNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "product_not_found", err.to_string())
        }
        CheckoutError::InsufficientStock {
            product_id,
            available,
            requested,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": err.to_string(),
                "product_id": product_id,
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        CheckoutError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        CheckoutError::Constraint(msg) => {
            json_error(StatusCode::BAD_REQUEST, "constraint_violation", msg)
        }
        CheckoutError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        // Detail is logged by the service; the client gets a generic message.
        CheckoutError::Persistence(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "the request could not be completed; nothing was saved",
        ),
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
