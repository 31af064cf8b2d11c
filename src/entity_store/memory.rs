use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{EntityStore, Error, Filter, Predicate, Result};
use crate::{
    data_model::{Entity, EntityType},
    utils::get_epoch_time_in_ms,
};

/// In-memory entity store. A single `RwLock` over the map serializes writes,
/// which gives the per-key linearizability the controller assumes.
#[derive(Default)]
pub struct InMemoryEntityStore {
    entities: RwLock<HashMap<(EntityType, String), Entity>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn add(&self, entity: Entity) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let name_taken = Filter::everything()
            .field(Predicate::TypeIs(entity.entity_type()))
            .field(Predicate::NameIs(entity.name().to_string()));
        if entities.values().any(|e| name_taken.matches(e)) {
            return Err(Error::AlreadyExists {
                entity_type: entity.entity_type(),
                name: entity.name().to_string(),
            });
        }
        entities.insert(
            (entity.entity_type(), entity.id().to_string()),
            entity.clone(),
        );
        Ok(entity)
    }

    async fn get(&self, entity_type: EntityType, id: &str) -> Result<Option<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&(entity_type, id.to_string())).cloned())
    }

    async fn update(&self, mut entity: Entity) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let key = (entity.entity_type(), entity.id().to_string());
        let Some(stored) = entities.get(&key) else {
            return Err(Error::NotFound {
                entity_type: entity.entity_type(),
                id: entity.id().to_string(),
            });
        };
        // ModifiedTime must advance even when the wall clock has not.
        let now = get_epoch_time_in_ms().max(stored.modified_time() + 1);
        entity.set_modified_time(now);
        entities.insert(key, entity.clone());
        Ok(entity)
    }

    async fn delete(&self, entity_type: EntityType, id: &str) -> Result<()> {
        let mut entities = self.entities.write().await;
        entities.remove(&(entity_type, id.to_string()));
        Ok(())
    }

    async fn list_global(&self, filter: Filter) -> Result<Vec<Entity>> {
        let entities = self.entities.read().await;
        let mut matched: Vec<Entity> = entities
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            (a.entity_type().to_string(), a.name().to_string())
                .cmp(&(b.entity_type().to_string(), b.name().to_string()))
        });
        Ok(matched)
    }
}
