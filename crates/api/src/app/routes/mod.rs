use axum::Router;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod common;
pub mod inventory;
pub mod orders;
pub mod system;

/// Router for endpoints that act on the caller's session cart.
pub fn session_router() -> Router {
    Router::new()
        .nest("/cart", cart::router())
        .nest("/checkout", checkout::router())
}

/// Router for order, stock and catalog maintenance endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/orders", orders::router())
        .nest("/inventory", inventory::router())
        .merge(catalog::router())
}
