use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::response::ApiError;

/// Verified caller identity, supplied by the authentication layer in
/// front of this service (e.g. an auth proxy terminating the JWT). This
/// core trusts the forwarded identity without re-validating it.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, ApiError> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::auth("Missing or invalid credential"))?
            .to_string();

        let email = parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(Identity { user_id, email })
    }
}
