use utoipa::OpenApi;

use crate::api::entity_handlers;
use crate::api::responses::*;

/// OpenAPI specification
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Entity Store API",
        version = "1.0.0",
        description = "CRUD over entities and their additions, backed by PostgreSQL",
        license(
            name = "MIT"
        )
    ),
    paths(
        entity_handlers::current_time,
        entity_handlers::create_entity,
        entity_handlers::get_entity,
        entity_handlers::delete_entity,
        entity_handlers::list_entities_query,
        entity_handlers::list_entities_body,
        entity_handlers::update_entity,
    ),
    components(
        schemas(
            EntityRequest,
            AdditionRequest,
            EntityFilterRequest,
            EntityResponse,
            AdditionResponse,
            EntityFilterResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Entity", description = "Entity management endpoints"),
    )
)]
pub struct ApiDoc;
