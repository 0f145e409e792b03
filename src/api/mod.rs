//! API handlers for Shelfmark REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod categories;
pub mod health;
pub mod openapi;
pub mod publishers;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Page content
    pub items: Vec<T>,
    /// Total number of matching entries
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Entries per page
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        let (page, per_page, _) = crate::models::pagination(page, per_page);
        Self {
            items,
            total,
            page,
            per_page,
        }
    }
}

fn decode_bearer(token: &str, state: &AppState) -> Result<UserClaims, AppError> {
    UserClaims::from_token(token, &state.config.users.jwt_secret)
        .map_err(|e| AppError::Authentication(e.to_string()))
}

async fn bearer_header(
    parts: &mut Parts,
    state: &AppState,
) -> Result<Option<String>, AppError> {
    match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await {
        Ok(TypedHeader(Authorization(bearer))) => Ok(Some(bearer.token().to_string())),
        Err(rejection) => missing_or_invalid(rejection),
    }
}

fn missing_or_invalid(rejection: TypedHeaderRejection) -> Result<Option<String>, AppError> {
    if rejection.is_missing() {
        Ok(None)
    } else {
        Err(AppError::Authentication(
            "Invalid authorization header format".to_string(),
        ))
    }
}

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_header(parts, state)
            .await?
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        Ok(AuthenticatedUser(decode_bearer(&token, state)?))
    }
}

/// Extractor for endpoints open to anonymous viewers. A present but invalid
/// token is still rejected.
pub struct MaybeUser(pub Option<UserClaims>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<i32> {
        self.0.as_ref().map(|claims| claims.user_id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_header(parts, state).await? {
            Some(token) => Ok(MaybeUser(Some(decode_bearer(&token, state)?))),
            None => Ok(MaybeUser(None)),
        }
    }
}

/// Extractor for admin endpoints. The token must carry the staff role and the
/// account must still be staff in the database.
pub struct StaffUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        claims.require_staff()?;

        if !state.services.users.is_staff(claims.user_id).await? {
            tracing::warn!(user_id = claims.user_id, "Staff token used after staff access was revoked");
            return Err(AppError::Authorization("Admin privileges required".to_string()));
        }

        Ok(StaffUser(claims))
    }
}
