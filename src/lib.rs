// Library Crate Root
// lib.rs

pub mod api;
pub mod config;
pub mod database;

pub use api::{create_router, ApiError, EntityState};
pub use config::{AppConfig, LogFormat};
pub use database::{DatabasePool, EntityRepository, EntityRepositoryImpl, RepositoryError};
