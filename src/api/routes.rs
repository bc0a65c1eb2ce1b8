use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::entity_handlers::*;
use super::openapi::ApiDoc;

/// Create the API router with Swagger UI
pub fn create_router(state: EntityState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/api/_/docs/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/time", get(current_time))
        // Entity endpoints
        .route("/api/create", post(create_entity))
        .route("/api/get/:id", get(get_entity))
        .route("/api/delete/:id", delete(delete_entity))
        .route("/api/getAll", get(list_entities_query).post(list_entities_body))
        .route("/api/patch/:id", patch(update_entity))
        .with_state(state)
}
