use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use orderflow_core::OrderId;

use crate::app::errors;
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:id", get(get_order).delete(delete_order))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.order(order_id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.delete_order(order_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
