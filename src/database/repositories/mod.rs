/// Repository pattern implementations
///
/// Handlers depend on the `EntityRepository` trait, so the PostgreSQL
/// implementation can be swapped for a test double.

pub mod entity_repository;

pub use entity_repository::{EntityRepository, EntityRepositoryImpl};
