//! User management endpoints (admin)

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::user::{UpdateStaff, User, UserQuery, UserShort},
};

use super::{PaginatedResponse, StaffUser};

/// List users with their outstanding loan counts
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "List of users", body = PaginatedResponse<UserShort>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<PaginatedResponse<UserShort>>> {
    let (users, total) = state.services.users.search_users(&query).await?;

    Ok(Json(PaginatedResponse::new(users, total, query.page, query.per_page)))
}

/// Grant or revoke the staff tier
#[utoipa::path(
    put,
    path = "/users/{id}/staff",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body = UpdateStaff,
    responses(
        (status = 200, description = "Staff access updated", body = User),
        (status = 400, description = "Cannot revoke own staff access"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_staff(
    State(state): State<crate::AppState>,
    StaffUser(claims): StaffUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateStaff>,
) -> AppResult<Json<User>> {
    let user = state
        .services
        .users
        .set_staff(claims.user_id, id, request.is_staff)
        .await?;
    Ok(Json(user))
}
