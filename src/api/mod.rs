pub mod entity_handlers;
pub mod errors;
pub mod openapi;
pub mod responses;
pub mod routes;

pub use entity_handlers::EntityState;
pub use errors::ApiError;
pub use openapi::ApiDoc;
pub use responses::*;
pub use routes::create_router;
