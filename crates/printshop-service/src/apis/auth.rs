//! Acting-user extraction.
//!
//! Authentication happens upstream. The gateway forwards the authenticated
//! username in the `x-auth-user` header, which this service trusts.

use axum::{extract::FromRequestParts, http::request::Parts};
use printshop_types::APIError;

/// Header carrying the authenticated username.
pub const AUTH_USER_HEADER: &str = "x-auth-user";

/// The user on whose behalf the request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let user = parts
			.headers
			.get(AUTH_USER_HEADER)
			.and_then(|value| value.to_str().ok())
			.map(str::trim)
			.filter(|value| !value.is_empty());

		match user {
			Some(user) => Ok(AuthUser(user.to_string())),
			None => Err(APIError::Unauthorized {
				message: format!("missing {} header", AUTH_USER_HEADER),
			}),
		}
	}
}
