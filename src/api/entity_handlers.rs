use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::database::models::EntityFilter;
use crate::database::{EntityRepository, RepositoryError};

use super::errors::ApiError;
use super::responses::*;

/// Shared state for entity API handlers
#[derive(Clone)]
pub struct EntityState {
    pub repository: Arc<dyn EntityRepository>,
    /// Deadline after which a request's database work is cancelled
    pub request_timeout: Duration,
}

impl EntityState {
    pub fn new(repository: Arc<dyn EntityRepository>, request_timeout: Duration) -> Self {
        Self {
            repository,
            request_timeout,
        }
    }
}

/// Cancellation token for one request
///
/// The token fires when the deadline passes or when the returned guard
/// drops, which also happens if the client disconnects mid-request.
fn request_token(deadline: Duration) -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();

    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(?deadline, "Request deadline exceeded, cancelling");
                timer.cancel();
            }
        }
    });

    let guard = token.clone().drop_guard();
    (token, guard)
}

fn parse_id(path: Result<Path<i32>, PathRejection>) -> Result<i32, ApiError> {
    let Path(id) = path?;
    if id <= 0 {
        return Err(ApiError::Validation(format!(
            "id must be a positive integer, got: {}",
            id
        )));
    }
    Ok(id)
}

async fn list(state: &EntityState, filter: EntityFilter) -> Result<Json<EntityFilterResponse>, ApiError> {
    let (cancel, _guard) = request_token(state.request_timeout);
    let page = filter.page;
    let per_page = filter.per_page;

    let entities = state.repository.list(filter, &cancel).await?;

    Ok(Json(EntityFilterResponse {
        entity: entities.into_iter().map(EntityResponse::from).collect(),
        page,
        per_page,
    }))
}

/// Current server time
#[utoipa::path(
    get,
    path = "/api/time",
    tag = "Entity",
    responses(
        (status = 200, description = "Server time", body = String)
    )
)]
pub async fn current_time() -> String {
    chrono::Local::now().to_string()
}

/// Create an entity with its addition
#[utoipa::path(
    post,
    path = "/api/create",
    tag = "Entity",
    request_body = EntityRequest,
    responses(
        (status = 200, description = "Id of the created entity", body = i32),
        (status = 400, description = "Missing or malformed fields", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_entity(
    State(state): State<EntityState>,
    payload: Result<Json<EntityRequest>, JsonRejection>,
) -> Result<Json<i32>, ApiError> {
    let Json(request) = payload?;
    let (entity, addition) = request.into_new_entity()?;

    let (cancel, _guard) = request_token(state.request_timeout);
    let id = state.repository.create(entity, addition, &cancel).await?;

    tracing::info!(id, "Entity created");
    Ok(Json(id))
}

/// Get entity by ID
#[utoipa::path(
    get,
    path = "/api/get/{id}",
    tag = "Entity",
    params(
        ("id" = i32, Path, description = "Entity ID")
    ),
    responses(
        (status = 200, description = "Entity details", body = EntityResponse),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Entity not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_entity(
    State(state): State<EntityState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Json<EntityResponse>, ApiError> {
    let id = parse_id(path)?;

    let (cancel, _guard) = request_token(state.request_timeout);
    let entity = state.repository.get_by_id(id, &cancel).await?;

    Ok(Json(entity.into()))
}

/// Delete entity and its addition
#[utoipa::path(
    delete,
    path = "/api/delete/{id}",
    tag = "Entity",
    params(
        ("id" = i32, Path, description = "Entity ID")
    ),
    responses(
        (status = 204, description = "Entity deleted"),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Entity not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn delete_entity(
    State(state): State<EntityState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(path)?;

    let (cancel, _guard) = request_token(state.request_timeout);
    state.repository.delete_by_id(id, &cancel).await?;

    tracing::info!(id, "Entity deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List entities with filter and pagination from query parameters
#[utoipa::path(
    get,
    path = "/api/getAll",
    tag = "Entity",
    params(EntityFilterQuery),
    responses(
        (status = 200, description = "Matching entities", body = EntityFilterResponse),
        (status = 400, description = "Invalid filter value", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_entities_query(
    State(state): State<EntityState>,
    query: Result<Query<EntityFilterQuery>, QueryRejection>,
) -> Result<Json<EntityFilterResponse>, ApiError> {
    let Query(query) = query?;
    let filter = EntityFilter::try_from(query)?;

    list(&state, filter).await
}

/// List entities with filter and pagination from a JSON body (empty body allowed)
#[utoipa::path(
    post,
    path = "/api/getAll",
    tag = "Entity",
    request_body = EntityFilterRequest,
    responses(
        (status = 200, description = "Matching entities", body = EntityFilterResponse),
        (status = 400, description = "Malformed filter", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_entities_body(
    State(state): State<EntityState>,
    body: Bytes,
) -> Result<Json<EntityFilterResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        EntityFilterRequest::default()
    } else {
        serde_json::from_slice::<EntityFilterRequest>(&body)
            .map_err(|e| ApiError::Validation(format!("Invalid filter body: {}", e)))?
    };

    list(&state, request.into()).await
}

/// Partially update an entity and its addition
#[utoipa::path(
    patch,
    path = "/api/patch/{id}",
    tag = "Entity",
    params(
        ("id" = i32, Path, description = "Entity ID")
    ),
    request_body = EntityRequest,
    responses(
        (status = 204, description = "Entity updated"),
        (status = 400, description = "Invalid id or body", body = ErrorResponse),
        (status = 404, description = "Entity not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn update_entity(
    State(state): State<EntityState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<EntityRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(path)?;
    let Json(request) = payload?;
    let (entity_patch, addition_patch) = request.into_patches();

    let (cancel, _guard) = request_token(state.request_timeout);
    let current = state.repository.check_exists(id, &cancel).await?;

    let addition_id = current.addition_id.ok_or_else(|| {
        RepositoryError::IntegrityError(format!("entity {} has no addition", id))
    })?;

    state
        .repository
        .update(id, addition_id, entity_patch, addition_patch, &cancel)
        .await?;

    tracing::info!(id, "Entity updated");
    Ok(StatusCode::NO_CONTENT)
}
