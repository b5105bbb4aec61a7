//! Caller identity from gateway headers.
//!
//! The upstream gateway authenticates requests and forwards the result as
//! `x-user-id` and `x-user-role`. Nothing here verifies credentials.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{Actor, Role, UserId};
use fulfillment::CoreError;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn actor_from(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?
        .parse::<UserId>()
        .map_err(|e| ApiError::Unauthorized(format!("invalid {USER_ID_HEADER}: {e}")))?;
    let role = header(headers, USER_ROLE_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ROLE_HEADER} header")))?
        .parse::<Role>()
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
    Ok(Actor::new(user_id, role))
}

/// An authenticated caller. Rejects with 401 when the headers are absent.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Actor);

impl Identity {
    /// Returns the actor if it has `role`, otherwise `AccessDenied`.
    pub fn require(self, role: Role, reason: &'static str) -> Result<Actor, ApiError> {
        if self.0.role == role {
            Ok(self.0)
        } else {
            Err(CoreError::AccessDenied(reason).into())
        }
    }

    /// Returns the actor if it is a driver or an admin.
    pub fn require_staff(self) -> Result<Actor, ApiError> {
        match self.0.role {
            Role::Driver | Role::Admin => Ok(self.0),
            Role::Customer => Err(CoreError::AccessDenied("staff only").into()),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from(&parts.headers).map(Identity)
    }
}

/// A caller that may be anonymous. Malformed headers count as anonymous.
#[derive(Debug, Clone, Copy)]
pub struct MaybeIdentity(pub Option<Actor>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(actor_from(&parts.headers).ok()))
    }
}
