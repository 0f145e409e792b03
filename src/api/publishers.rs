//! Publisher endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        publisher::{Publisher, PublisherRequest},
        NameQuery,
    },
};

use super::StaffUser;

/// List publishers ordered by name
#[utoipa::path(
    get,
    path = "/publishers",
    tag = "publishers",
    params(NameQuery),
    responses(
        (status = 200, description = "List of publishers", body = Vec<Publisher>)
    )
)]
pub async fn list_publishers(
    State(state): State<crate::AppState>,
    Query(query): Query<NameQuery>,
) -> AppResult<Json<Vec<Publisher>>> {
    let publishers = state
        .services
        .catalog
        .list_publishers(query.search.as_deref())
        .await?;
    Ok(Json(publishers))
}

/// Get publisher by ID
#[utoipa::path(
    get,
    path = "/publishers/{id}",
    tag = "publishers",
    params(
        ("id" = i32, Path, description = "Publisher ID")
    ),
    responses(
        (status = 200, description = "Publisher details", body = Publisher),
        (status = 404, description = "Publisher not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_publisher(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Publisher>> {
    let publisher = state.services.catalog.get_publisher(id).await?;
    Ok(Json(publisher))
}

/// Create a publisher
#[utoipa::path(
    post,
    path = "/publishers",
    tag = "publishers",
    security(("bearer_auth" = [])),
    request_body = PublisherRequest,
    responses(
        (status = 201, description = "Publisher created", body = Publisher),
        (status = 409, description = "Publisher already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_publisher(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Json(publisher): Json<PublisherRequest>,
) -> AppResult<(StatusCode, Json<Publisher>)> {
    let created = state.services.catalog.create_publisher(publisher).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a publisher
#[utoipa::path(
    put,
    path = "/publishers/{id}",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publisher ID")
    ),
    request_body = PublisherRequest,
    responses(
        (status = 200, description = "Publisher updated", body = Publisher),
        (status = 404, description = "Publisher not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Publisher already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_publisher(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Path(id): Path<i32>,
    Json(publisher): Json<PublisherRequest>,
) -> AppResult<Json<Publisher>> {
    let updated = state.services.catalog.update_publisher(id, publisher).await?;
    Ok(Json(updated))
}

/// Delete a publisher together with its books
#[utoipa::path(
    delete,
    path = "/publishers/{id}",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publisher ID")
    ),
    responses(
        (status = 204, description = "Publisher deleted"),
        (status = 404, description = "Publisher not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Publisher has books on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_publisher(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_publisher(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
