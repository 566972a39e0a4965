use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use orderflow_core::SessionId;

use crate::app::errors::json_error;
use crate::context::SessionContext;

/// Header carrying the client's session id (a UUID).
pub const SESSION_HEADER: &str = "x-session-id";

pub async fn session_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let session_id = extract_session(req.headers())?;
    req.extensions_mut().insert(SessionContext::new(session_id));
    Ok(next.run(req).await)
}

fn extract_session(headers: &HeaderMap) -> Result<SessionId, Response> {
    let header = headers.get(SESSION_HEADER).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "missing_session",
            format!("{SESSION_HEADER} header is required"),
        )
    })?;

    header
        .to_str()
        .ok()
        .map(str::trim)
        .and_then(|raw| raw.parse::<SessionId>().ok())
        .ok_or_else(|| {
            json_error(
                StatusCode::BAD_REQUEST,
                "invalid_session",
                format!("{SESSION_HEADER} must be a UUID"),
            )
        })
}
