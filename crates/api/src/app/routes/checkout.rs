use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/preview", post(preview))
        .route("/finalize", post(finalize))
}

pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let body = match checkout_body(&headers, &body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    match services
        .preview_checkout(session.session_id(), body.coupon_code())
        .await
    {
        Ok(preview) => Json(preview).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn finalize(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let body = match checkout_body(&headers, &body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    match services
        .finalize_order(session.session_id(), body.coupon_code())
        .await
    {
        Ok(finalized) => (StatusCode::CREATED, Json(finalized)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

fn checkout_body(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<dto::CheckoutRequest, axum::response::Response> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    dto::CheckoutRequest::from_body(content_type, body)
        .map_err(|msg| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg))
}
