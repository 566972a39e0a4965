use core::str::FromStr;

use axum::http::StatusCode;

use crate::app::errors;

/// Parse a path segment into a typed id, or a 400 response naming the field.
pub fn parse_id<T: FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id: {raw}"),
        )
    })
}
