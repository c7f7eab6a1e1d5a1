//! Repository-facing DAO trait.

use crate::entity::Entity;
use async_trait::async_trait;
use tabula_core::DaoResult;

/// Basic persistence operations for one entity type.
///
/// [`crate::GenericDao`] implements this for every entity. Entity-specific
/// DAOs wrap a `GenericDao` and implement it themselves when they need to
/// change an operation, typically [`EntityDao::delete`], which has no
/// generic implementation.
#[async_trait]
pub trait EntityDao<E: Entity>: Send + Sync {
    /// Loads an entity by identifier.
    async fn load(&self, id: &E::Id) -> DaoResult<Option<E>>;

    /// Inserts a new row. Returns the number of affected rows.
    async fn insert(&self, entity: &E) -> DaoResult<u64>;

    /// Updates the row with the entity's identifier.
    async fn update(&self, entity: &E) -> DaoResult<u64>;

    /// Deletes the row with the given identifier.
    async fn delete_by_id(&self, id: &E::Id) -> DaoResult<u64>;

    /// Deletes the entity.
    async fn delete(&self, entity: &E) -> DaoResult<u64>;
}
