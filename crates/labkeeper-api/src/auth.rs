//! Bearer-token authentication for the protected endpoints.
//!
//! One shared token guards the API. It lives in a file inside the data
//! directory and is generated on first start.

use std::path::Path;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use crate::error::ErrorBody;
use crate::state::AppState;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Read the token from `path`, or generate one and write it there.
///
/// A token that cannot be saved is still returned, so the server starts;
/// it just won't survive a restart.
pub fn load_or_generate_token(path: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(path) {
        let token = contents.trim();
        if !token.is_empty() {
            tracing::info!("API token loaded from {}", path.display());
            return token.to_string();
        }
    }

    let token = generate_token();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(path, &token) {
        Ok(()) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
            }
            tracing::info!("API token saved to {}", path.display());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to save API token to {}", path.display());
        }
    }
    token
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;
    let value = value
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;
    value.strip_prefix("Bearer ").ok_or("Invalid bearer token")
}

fn unauthorized(message: &str) -> Response {
    let body = ErrorBody {
        error: "unauthorized".to_string(),
        message: message.to_string(),
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Middleware rejecting requests without the configured bearer token.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match bearer_token(req.headers()) {
        Ok(token) if token == state.api_token.as_str() => next.run(req).await,
        Ok(_) => unauthorized("Invalid bearer token"),
        Err(message) => unauthorized(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_generated_tokens_are_hex_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_file_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("api_token");
        let first = load_or_generate_token(&path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
        assert_eq!(load_or_generate_token(&path), first);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err("Missing Authorization header"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), Err("Invalid bearer token"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Ok("abc"));
    }
}
