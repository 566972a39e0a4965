use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use orderflow_core::ProductId;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(view_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_line).delete(remove_line))
}

pub async fn view_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    cart_response(&services, session, StatusCode::OK).await
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    if let Err(e) = services
        .add_to_cart(session.session_id(), body.product_id, body.quantity)
        .await
    {
        return errors::checkout_error_to_response(e);
    }
    cart_response(&services, session, StatusCode::OK).await
}

pub async fn update_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(product_id): Path<String>,
    Json(body): Json<dto::UpdateCartLineRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&product_id, "product") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    if let Err(e) = services
        .update_cart_line(session.session_id(), product_id, body.quantity)
        .await
    {
        return errors::checkout_error_to_response(e);
    }
    cart_response(&services, session, StatusCode::OK).await
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&product_id, "product") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    if services
        .remove_from_cart(session.session_id(), product_id)
        .await
    {
        StatusCode::NO_CONTENT.into_response()
    } else {
        errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("product {product_id} is not in the cart"),
        )
    }
}

async fn cart_response(
    services: &AppServices,
    session: SessionContext,
    status: StatusCode,
) -> axum::response::Response {
    match services.view_cart(session.session_id()).await {
        Ok(view) => (status, Json(view)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
