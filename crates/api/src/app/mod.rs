//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store backend selection and service delegation
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Session-scoped routes: require the session header.
    let session_scoped = routes::session_router()
        .layer(axum::middleware::from_fn(middleware::session_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(session_scoped)
        .merge(routes::router())
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}
