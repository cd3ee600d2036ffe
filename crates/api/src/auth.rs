//! Resolution of the acting user from request headers.

use axum::http::HeaderMap;
use common::{Customer, UserId};
use domain::{Actor, DomainError};

use crate::error::ApiError;
use crate::state::{AppState, Backend};

/// Header carrying the id of the acting user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// A resolved, registered user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Customer);

impl CurrentUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.0.id,
            is_admin: self.0.is_admin(),
        }
    }
}

/// Resolves the acting user, if the request names one.
///
/// A malformed or unknown id is an error rather than an anonymous request.
pub async fn optional_user<B: Backend>(
    state: &AppState<B>,
    headers: &HeaderMap,
) -> Result<Option<CurrentUser>, ApiError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let id: UserId = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Malformed {USER_ID_HEADER} header")))?;

    match state.customers.get_customer(id).await {
        Ok(customer) => Ok(Some(CurrentUser(customer))),
        Err(DomainError::CustomerNotFound(_)) => {
            Err(ApiError::Unauthorized(format!("Unknown user {id}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves the acting user, failing with 401 when there is none.
pub async fn require_user<B: Backend>(
    state: &AppState<B>,
    headers: &HeaderMap,
) -> Result<CurrentUser, ApiError> {
    optional_user(state, headers)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))
}

/// Resolves the acting user and checks that they are an admin.
pub async fn require_admin<B: Backend>(
    state: &AppState<B>,
    headers: &HeaderMap,
) -> Result<CurrentUser, ApiError> {
    let user = require_user(state, headers).await?;
    if !user.is_admin() {
        return Err(ApiError::Forbidden("Admin role required".to_string()));
    }
    Ok(user)
}
