use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post, put},
    Json, Router,
};

use orderflow_catalog::CreateProduct;
use orderflow_core::{CouponId, Money, ProductId};
use orderflow_coupons::{CouponDiscount, CreateCoupon};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", delete(delete_product))
        .route("/products/:id/price", put(update_product_price))
        .route("/locations", post(create_location))
        .route("/coupons", post(create_coupon))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let cmd = CreateProduct {
        product_id: ProductId::new(),
        sku: body.sku,
        name: body.name,
        price: Money::from_cents(body.price_cents),
    };

    match services.register_product(cmd).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&id, "product") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.delete_product(product_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn update_product_price(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProductPriceRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&id, "product") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .update_product_price(product_id, Money::from_cents(body.price_cents))
        .await
    {
        Ok(product) => Json(product).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateLocationRequest>,
) -> axum::response::Response {
    match services.create_location(&body.name).await {
        Ok(location) => (StatusCode::CREATED, Json(location)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn create_coupon(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateCouponRequest>,
) -> axum::response::Response {
    let discount = match CouponDiscount::from_raw(body.kind, body.value) {
        Ok(d) => d,
        Err(e) => return errors::checkout_error_to_response(e.into()),
    };

    let cmd = CreateCoupon {
        coupon_id: CouponId::new(),
        code: body.code,
        discount,
        expiry_date: body.expiry_date,
        active: body.active,
    };

    match services.register_coupon(cmd).await {
        Ok(coupon) => (StatusCode::CREATED, Json(coupon)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
