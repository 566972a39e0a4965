use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use orderflow_core::{LocationId, ProductId};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:product_id", get(stock_levels))
        .route(
            "/:product_id/locations/:location_id/adjust",
            post(adjust_stock),
        )
}

pub async fn stock_levels(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&product_id, "product") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.stock_levels(product_id).await {
        Ok(levels) => Json(levels).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, location_id)): Path<(String, String)>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&product_id, "product") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let location_id: LocationId = match parse_id(&location_id, "location") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .adjust_stock(product_id, location_id, body.quantity, body.direction)
        .await
    {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
