/// Database module for PostgreSQL persistence of the entity aggregate
///
/// This module provides:
/// - A bounded connection pool with embedded migrations
/// - The entity repository (transactional create/update/delete, filtered listing)
/// - Database models and schema
/// - Cancellation of in-flight statements
/// - Diesel ORM integration

pub mod cancellation;
pub mod connection;
pub mod errors;
pub mod models;
pub mod repositories;
pub mod schema;

pub use connection::{establish_connection_pool, run_migrations, DatabasePool};
pub use errors::RepositoryError;
pub use repositories::{EntityRepository, EntityRepositoryImpl};
