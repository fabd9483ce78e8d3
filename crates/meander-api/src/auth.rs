//! Caller identity extraction.
//!
//! The engine sits behind a gateway that authenticates users and forwards the
//! authenticated id in the `x-user-id` header. The header value is trusted;
//! this module only validates that it is present and a well-formed UUID.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, extracted from the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let value = parts
      .headers
      .get(USER_ID_HEADER)
      .ok_or_else(|| {
        ApiError::BadRequest(format!("missing {USER_ID_HEADER} header"))
      })?
      .to_str()
      .map_err(|_| {
        ApiError::BadRequest(format!("invalid {USER_ID_HEADER} header"))
      })?;

    let user_id = Uuid::parse_str(value).map_err(|_| {
      ApiError::BadRequest(format!("{USER_ID_HEADER} is not a valid uuid"))
    })?;

    Ok(CallerId(user_id))
  }
}
