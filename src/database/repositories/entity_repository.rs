use crate::database::cancellation::{ensure_active, run_blocking};
use crate::database::connection::DatabasePool;
use crate::database::errors::RepositoryError;
use crate::database::models::{
    Addition, AdditionPatch, Entity, EntityAddition, EntityFilter, EntityPatch, NewEntity,
};
use crate::database::schema::{additions, entities};
use diesel::prelude::*;
use tokio_util::sync::CancellationToken;

/// Entity repository trait - defines interface for aggregate operations
///
/// Every operation takes the caller's cancellation token. Triggering it
/// aborts the in-flight statement and rolls back any open transaction.
#[async_trait::async_trait]
pub trait EntityRepository: Send + Sync {
    /// Insert an entity and its addition in one transaction
    /// Returns the generated entity id
    async fn create(
        &self,
        entity: NewEntity,
        addition: Option<AdditionPatch>,
        cancel: &CancellationToken,
    ) -> Result<i32, RepositoryError>;

    /// Find entity joined with its addition
    async fn get_by_id(
        &self,
        id: i32,
        cancel: &CancellationToken,
    ) -> Result<EntityAddition, RepositoryError>;

    /// Raw entity row, used to resolve the owned addition before an update
    async fn check_exists(
        &self,
        id: i32,
        cancel: &CancellationToken,
    ) -> Result<Entity, RepositoryError>;

    /// List entities matching the filter, ordered by id
    async fn list(
        &self,
        filter: EntityFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntityAddition>, RepositoryError>;

    /// Apply partial patches to an entity and its addition in one transaction
    async fn update(
        &self,
        id: i32,
        addition_id: i32,
        entity: EntityPatch,
        addition: Option<AdditionPatch>,
        cancel: &CancellationToken,
    ) -> Result<(), RepositoryError>;

    /// Delete entity (and its addition) by ID
    async fn delete_by_id(&self, id: i32, cancel: &CancellationToken) -> Result<(), RepositoryError>;
}

/// Concrete implementation of EntityRepository backed by PostgreSQL
pub struct EntityRepositoryImpl {
    pool: DatabasePool,
}

impl EntityRepositoryImpl {
    /// Create new entity repository over the shared pool
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn validate_id(field: &str, id: i32) -> Result<(), RepositoryError> {
    if id <= 0 {
        return Err(RepositoryError::Validation(format!(
            "{} must be positive, got: {}",
            field, id
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl EntityRepository for EntityRepositoryImpl {
    async fn create(
        &self,
        entity: NewEntity,
        addition: Option<AdditionPatch>,
        cancel: &CancellationToken,
    ) -> Result<i32, RepositoryError> {
        let id = run_blocking(&self.pool, cancel, "create", move |conn, cancel| {
            conn.build_transaction()
                .read_committed()
                .run::<_, RepositoryError, _>(|conn| {
                    // The insert trigger creates the addition row and fills addition_id
                    let (entity_id, addition_id) = diesel::insert_into(entities::table)
                        .values(&entity)
                        .returning((entities::id, entities::addition_id))
                        .get_result::<(i32, Option<i32>)>(conn)?;

                    let addition_id = addition_id.ok_or_else(|| {
                        RepositoryError::IntegrityError(format!(
                            "entity {} was stored without an addition",
                            entity_id
                        ))
                    })?;

                    if let Some(patch) = addition.filter(|patch| !patch.is_empty()) {
                        ensure_active(cancel)?;

                        let updated = diesel::update(additions::table.find(addition_id))
                            .set(&patch)
                            .execute(conn)?;

                        if updated != 1 {
                            return Err(RepositoryError::IntegrityError(format!(
                                "addition {} of entity {} is missing",
                                addition_id, entity_id
                            )));
                        }
                    }

                    Ok(entity_id)
                })
        })
        .await?;

        tracing::debug!(id, "Created entity");
        Ok(id)
    }

    async fn get_by_id(
        &self,
        id: i32,
        cancel: &CancellationToken,
    ) -> Result<EntityAddition, RepositoryError> {
        validate_id("id", id)?;

        run_blocking(&self.pool, cancel, "get_by_id", move |conn, _| {
            entities::table
                .left_join(additions::table.on(additions::id.nullable().eq(entities::addition_id)))
                .filter(entities::id.eq(id))
                .select((Entity::as_select(), Option::<Addition>::as_select()))
                .first::<(Entity, Option<Addition>)>(conn)
                .optional()?
                .map(EntityAddition::from)
                .ok_or_else(|| RepositoryError::entity_not_found(id))
        })
        .await
    }

    async fn check_exists(
        &self,
        id: i32,
        cancel: &CancellationToken,
    ) -> Result<Entity, RepositoryError> {
        validate_id("id", id)?;

        run_blocking(&self.pool, cancel, "check_exists", move |conn, _| {
            entities::table
                .find(id)
                .select(Entity::as_select())
                .first::<Entity>(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::entity_not_found(id))
        })
        .await
    }

    async fn list(
        &self,
        filter: EntityFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntityAddition>, RepositoryError> {
        let pagination = filter.pagination();

        let rows = run_blocking(&self.pool, cancel, "list", move |conn, _| {
            let mut query = entities::table
                .left_join(additions::table.on(additions::id.nullable().eq(entities::addition_id)))
                .select((Entity::as_select(), Option::<Addition>::as_select()))
                .order(entities::id.asc())
                .into_boxed();

            if let Some(title) = filter.title {
                query = query.filter(entities::title.eq(title));
            }

            if let Some(verified) = filter.verified {
                query = query.filter(entities::verified.eq(verified));
            }

            if let Some(page) = pagination {
                query = query.limit(page.limit).offset(page.offset);
            }

            query
                .load::<(Entity, Option<Addition>)>(conn)
                .map_err(RepositoryError::from)
        })
        .await?;

        tracing::debug!(count = rows.len(), ?pagination, "Listed entities");

        Ok(rows.into_iter().map(EntityAddition::from).collect())
    }

    async fn update(
        &self,
        id: i32,
        addition_id: i32,
        entity: EntityPatch,
        addition: Option<AdditionPatch>,
        cancel: &CancellationToken,
    ) -> Result<(), RepositoryError> {
        validate_id("id", id)?;
        validate_id("addition_id", addition_id)?;

        let addition = addition.filter(|patch| !patch.is_empty());

        if entity.is_empty() && addition.is_none() {
            tracing::debug!(id, "Empty patch, nothing to update");
            return Ok(());
        }

        run_blocking(&self.pool, cancel, "update", move |conn, cancel| {
            conn.build_transaction()
                .read_committed()
                .run::<_, RepositoryError, _>(|conn| {
                    let row = if entity.is_empty() {
                        // Lock the row so the ownership check holds until commit
                        entities::table
                            .find(id)
                            .select(entities::addition_id)
                            .for_update()
                            .first::<Option<i32>>(conn)
                            .optional()?
                    } else {
                        diesel::update(entities::table.find(id))
                            .set(&entity)
                            .returning(entities::addition_id)
                            .get_result::<Option<i32>>(conn)
                            .optional()?
                    };

                    let owned = row.ok_or_else(|| RepositoryError::entity_not_found(id))?;

                    if owned != Some(addition_id) {
                        return Err(RepositoryError::IntegrityError(format!(
                            "entity {} owns addition {:?}, not {}",
                            id, owned, addition_id
                        )));
                    }

                    if let Some(patch) = &addition {
                        ensure_active(cancel)?;

                        let updated = diesel::update(additions::table.find(addition_id))
                            .set(patch)
                            .execute(conn)?;

                        if updated == 0 {
                            return Err(RepositoryError::IntegrityError(format!(
                                "addition {} of entity {} is missing",
                                addition_id, id
                            )));
                        }
                    }

                    Ok(())
                })
        })
        .await?;

        tracing::debug!(id, addition_id, "Updated entity");
        Ok(())
    }

    async fn delete_by_id(&self, id: i32, cancel: &CancellationToken) -> Result<(), RepositoryError> {
        validate_id("id", id)?;

        run_blocking(&self.pool, cancel, "delete_by_id", move |conn, cancel| {
            conn.build_transaction()
                .read_committed()
                .run::<_, RepositoryError, _>(|conn| {
                    // Affected row count doubles as the existence check
                    let addition_id = diesel::delete(entities::table.find(id))
                        .returning(entities::addition_id)
                        .get_result::<Option<i32>>(conn)
                        .optional()?
                        .ok_or_else(|| RepositoryError::entity_not_found(id))?;

                    if let Some(addition_id) = addition_id {
                        ensure_active(cancel)?;
                        diesel::delete(additions::table.find(addition_id)).execute(conn)?;
                    }

                    Ok(())
                })
        })
        .await?;

        tracing::debug!(id, "Deleted entity");
        Ok(())
    }
}
