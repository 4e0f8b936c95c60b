//! Read-model repository.
//!
//! A keyed lookup/scan store for materialized projections, living alongside
//! the event store but outside its concurrency protocol: entities are plain
//! documents with no version semantics, saved and overwritten at will. The
//! repository routes to per-tenant tables with the same naming strategy as
//! the event store.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::context::{RequestContext, TableNaming};
use crate::types::{Namespace, TableName, TablePrefix};

/// A read-model entity. Identity must be non-empty before a save is
/// accepted.
pub trait Entity: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// The entity's unique identifier.
    fn entity_id(&self) -> &str;
}

/// Errors raised by the read-model repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    /// No entity is stored under the given id.
    #[error("entity '{id}' not found (namespace: {namespace})")]
    EntityNotFound {
        /// The id that was looked up.
        id: String,
        /// The tenant namespace the lookup resolved.
        namespace: Namespace,
    },

    /// The entity offered for saving has an empty id.
    #[error("entity has no id (namespace: {namespace})")]
    MissingEntityId {
        /// The tenant namespace the save resolved.
        namespace: Namespace,
    },

    /// The entity could not be marshaled to or from the document encoding.
    #[error("could not marshal entity: {detail} (namespace: {namespace})")]
    Serialization {
        /// The underlying serde failure.
        detail: String,
        /// The tenant namespace the operation resolved.
        namespace: Namespace,
    },
}

/// An equality filter over one document attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// The attribute to compare.
    pub attribute: String,
    /// The value it must equal.
    pub value: Value,
}

impl Filter {
    /// Creates an equality filter.
    pub fn eq(attribute: impl Into<String>, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }
}

/// A named secondary index, passed through to backends that support one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// The index name.
    pub name: String,
    /// The attribute the index is keyed on.
    pub key_attribute: String,
}

/// Keyed CRUD and scan/filter over a read-model table.
#[async_trait]
pub trait ReadRepository<T: Entity>: Send + Sync {
    /// Looks up one entity by id.
    async fn find(&self, ctx: &RequestContext, id: &str) -> Result<T, RepoError>;

    /// Returns every entity in the tenant's table.
    async fn find_all(&self, ctx: &RequestContext) -> Result<Vec<T>, RepoError>;

    /// Returns the entities matching the filter.
    async fn find_with_filter(
        &self,
        ctx: &RequestContext,
        filter: &Filter,
    ) -> Result<Vec<T>, RepoError>;

    /// Returns the entities matching the filter, reading through the named
    /// index where the backend supports one.
    async fn find_with_filter_using_index(
        &self,
        ctx: &RequestContext,
        index: &IndexDescriptor,
        filter: &Filter,
    ) -> Result<Vec<T>, RepoError>;

    /// Saves (inserts or overwrites) one entity.
    async fn save(&self, ctx: &RequestContext, entity: &T) -> Result<(), RepoError>;

    /// Removes one entity by id.
    async fn remove(&self, ctx: &RequestContext, id: &str) -> Result<(), RepoError>;
}

/// Thread-safe in-memory read-model repository. Cloning shares storage.
/// Tables spring into existence on first save.
pub struct InMemoryRepo<T: Entity> {
    prefix: TablePrefix,
    naming: TableNaming,
    tables: Arc<RwLock<HashMap<TableName, HashMap<String, Value>>>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> InMemoryRepo<T> {
    /// Creates an empty repository with the default naming strategy.
    pub fn new(prefix: TablePrefix) -> Self {
        Self::with_naming(prefix, TableNaming::default())
    }

    /// Creates an empty repository with an explicit naming strategy.
    pub fn with_naming(prefix: TablePrefix, naming: TableNaming) -> Self {
        Self {
            prefix,
            naming,
            tables: Arc::new(RwLock::new(HashMap::new())),
            _entity: PhantomData,
        }
    }

    fn resolve_table(&self, ctx: &RequestContext) -> TableName {
        self.naming.resolve(&self.prefix, ctx)
    }

    fn decode(&self, ctx: &RequestContext, document: Value) -> Result<T, RepoError> {
        serde_json::from_value(document).map_err(|err| RepoError::Serialization {
            detail: err.to_string(),
            namespace: ctx.namespace().clone(),
        })
    }

    fn filtered(
        &self,
        ctx: &RequestContext,
        filter: &Filter,
    ) -> Result<Vec<T>, RepoError> {
        let tables = self.tables.read().expect("lock poisoned");
        let Some(items) = tables.get(&self.resolve_table(ctx)) else {
            return Ok(Vec::new());
        };
        items
            .values()
            .filter(|document| document.get(&filter.attribute) == Some(&filter.value))
            .map(|document| self.decode(ctx, document.clone()))
            .collect()
    }
}

impl<T: Entity> Clone for InMemoryRepo<T> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            naming: self.naming.clone(),
            tables: Arc::clone(&self.tables),
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Entity> ReadRepository<T> for InMemoryRepo<T> {
    async fn find(&self, ctx: &RequestContext, id: &str) -> Result<T, RepoError> {
        let document = {
            let tables = self.tables.read().expect("lock poisoned");
            tables
                .get(&self.resolve_table(ctx))
                .and_then(|items| items.get(id))
                .cloned()
        };
        let document = document.ok_or_else(|| RepoError::EntityNotFound {
            id: id.to_string(),
            namespace: ctx.namespace().clone(),
        })?;
        self.decode(ctx, document)
    }

    async fn find_all(&self, ctx: &RequestContext) -> Result<Vec<T>, RepoError> {
        let documents: Vec<Value> = {
            let tables = self.tables.read().expect("lock poisoned");
            tables
                .get(&self.resolve_table(ctx))
                .map(|items| items.values().cloned().collect())
                .unwrap_or_default()
        };
        documents
            .into_iter()
            .map(|document| self.decode(ctx, document))
            .collect()
    }

    async fn find_with_filter(
        &self,
        ctx: &RequestContext,
        filter: &Filter,
    ) -> Result<Vec<T>, RepoError> {
        self.filtered(ctx, filter)
    }

    async fn find_with_filter_using_index(
        &self,
        ctx: &RequestContext,
        index: &IndexDescriptor,
        filter: &Filter,
    ) -> Result<Vec<T>, RepoError> {
        // The memory table has no real indexes; the descriptor is a
        // pass-through hint for backends that do.
        debug!(index = %index.name, "[repo.find] index hint ignored by memory backend");
        self.filtered(ctx, filter)
    }

    async fn save(&self, ctx: &RequestContext, entity: &T) -> Result<(), RepoError> {
        if entity.entity_id().is_empty() {
            return Err(RepoError::MissingEntityId {
                namespace: ctx.namespace().clone(),
            });
        }

        let document = serde_json::to_value(entity).map_err(|err| RepoError::Serialization {
            detail: err.to_string(),
            namespace: ctx.namespace().clone(),
        })?;

        let mut tables = self.tables.write().expect("lock poisoned");
        tables
            .entry(self.resolve_table(ctx))
            .or_default()
            .insert(entity.entity_id().to_string(), document);
        Ok(())
    }

    async fn remove(&self, ctx: &RequestContext, id: &str) -> Result<(), RepoError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let removed = tables
            .get_mut(&self.resolve_table(ctx))
            .and_then(|items| items.remove(id));
        match removed {
            Some(_) => Ok(()),
            None => Err(RepoError::EntityNotFound {
                id: id.to_string(),
                namespace: ctx.namespace().clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Invitation {
        id: String,
        name: String,
        accepted: bool,
    }

    impl Entity for Invitation {
        fn entity_id(&self) -> &str {
            &self.id
        }
    }

    fn repo() -> InMemoryRepo<Invitation> {
        let prefix = TablePrefix::try_new("invitations").unwrap();
        InMemoryRepo::new(prefix)
    }

    fn invitation(id: &str, name: &str, accepted: bool) -> Invitation {
        Invitation {
            id: id.to_string(),
            name: name.to_string(),
            accepted,
        }
    }

    #[tokio::test]
    async fn save_then_find_returns_the_entity() {
        let repo = repo();
        let ctx = RequestContext::default();
        let entity = invitation("inv-1", "athena", false);

        repo.save(&ctx, &entity).await.unwrap();

        assert_eq!(repo.find(&ctx, "inv-1").await.unwrap(), entity);
    }

    #[tokio::test]
    async fn save_overwrites_an_existing_entity() {
        let repo = repo();
        let ctx = RequestContext::default();
        repo.save(&ctx, &invitation("inv-1", "athena", false))
            .await
            .unwrap();
        repo.save(&ctx, &invitation("inv-1", "athena", true))
            .await
            .unwrap();

        assert!(repo.find(&ctx, "inv-1").await.unwrap().accepted);
    }

    #[tokio::test]
    async fn save_rejects_an_empty_id() {
        let repo = repo();
        let ctx = RequestContext::default();

        let err = repo
            .save(&ctx, &invitation("", "nameless", false))
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::MissingEntityId { .. }));
    }

    #[tokio::test]
    async fn find_missing_entity_is_not_found() {
        let repo = repo();
        let ctx = RequestContext::default();

        let err = repo.find(&ctx, "inv-9").await.unwrap_err();

        assert!(matches!(err, RepoError::EntityNotFound { ref id, .. } if id == "inv-9"));
    }

    #[tokio::test]
    async fn filter_matches_on_attribute_equality() {
        let repo = repo();
        let ctx = RequestContext::default();
        repo.save(&ctx, &invitation("inv-1", "athena", true))
            .await
            .unwrap();
        repo.save(&ctx, &invitation("inv-2", "hades", false))
            .await
            .unwrap();
        repo.save(&ctx, &invitation("inv-3", "zeus", true))
            .await
            .unwrap();

        let accepted = repo
            .find_with_filter(&ctx, &Filter::eq("accepted", json!(true)))
            .await
            .unwrap();

        assert_eq!(accepted.len(), 2);
        assert!(accepted.iter().all(|entity| entity.accepted));
    }

    #[tokio::test]
    async fn index_hint_is_a_pass_through() {
        let repo = repo();
        let ctx = RequestContext::default();
        repo.save(&ctx, &invitation("inv-1", "athena", true))
            .await
            .unwrap();

        let index = IndexDescriptor {
            name: "by-accepted".to_string(),
            key_attribute: "accepted".to_string(),
        };
        let found = repo
            .find_with_filter_using_index(&ctx, &index, &Filter::eq("accepted", json!(true)))
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn remove_deletes_and_second_remove_is_not_found() {
        let repo = repo();
        let ctx = RequestContext::default();
        repo.save(&ctx, &invitation("inv-1", "athena", false))
            .await
            .unwrap();

        repo.remove(&ctx, "inv-1").await.unwrap();

        assert!(matches!(
            repo.remove(&ctx, "inv-1").await.unwrap_err(),
            RepoError::EntityNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let repo = repo();
        let tenant_a = RequestContext::new(Namespace::try_new("tenant_a").unwrap());
        let tenant_b = RequestContext::new(Namespace::try_new("tenant_b").unwrap());
        repo.save(&tenant_a, &invitation("inv-1", "athena", false))
            .await
            .unwrap();

        assert!(repo.find(&tenant_b, "inv-1").await.is_err());
        assert!(repo.find_all(&tenant_b).await.unwrap().is_empty());
    }
}
