use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::response::AppError;
use crate::types::UserRole;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Caller identity as resolved by the gateway in front of this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub role: UserRole,
}

pub fn identity_from_headers(headers: &HeaderMap) -> Option<AuthUser> {
    let id = headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|v| !v.is_empty())?
        .to_string();

    // A missing role means an ordinary student account.
    let role = match headers.get(USER_ROLE_HEADER) {
        Some(value) => UserRole::parse(value.to_str().ok()?)?,
        None => UserRole::Student,
    };

    Some(AuthUser { id, role })
}

pub async fn require_identity(mut req: Request<Body>, next: Next) -> Response {
    match identity_from_headers(req.headers()) {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => AppError::unauthorized("missing or invalid caller identity").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_identity_defaults_to_student() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        let user = identity_from_headers(&headers).unwrap();
        assert_eq!(user.role, UserRole::Student);
    }

    #[test]
    fn test_identity_rejects_blank_or_unknown_role() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(identity_from_headers(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("superuser"));
        assert!(identity_from_headers(&headers).is_none());
    }
}
