//! Acting-user extraction.
//!
//! Authentication happens in the gateway in front of this server, which
//! forwards the authenticated user id in the `x-user-id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

const MAX_USER_ID_LEN: usize = 256;

/// The user a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser(pub String);

impl ActingUser {
    /// The user id as a string slice.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_USER_ID_LEN)
            .map(|id| Self(id.to_string()))
            .ok_or_else(|| {
                ApiError::unauthorized(
                    "unauthenticated",
                    format!("Missing or invalid {USER_HEADER} header"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<ActingUser, ApiError> {
        let (mut parts, ()) = request.into_parts();
        ActingUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_header_present() {
        let request = Request::builder()
            .header(USER_HEADER, " user-1 ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap().id(), "user-1");
    }

    #[tokio::test]
    async fn test_header_missing_or_blank() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(missing).await,
            Err(ApiError::Unauthorized { .. })
        ));

        let blank = Request::builder().header(USER_HEADER, "  ").body(()).unwrap();
        assert!(extract(blank).await.is_err());
    }
}
