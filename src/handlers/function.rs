use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    controller::{default_sync, DispatchContext, EntityHandler},
    data_model::{Entity, EntityType, Status},
    entity_store::EntityStore,
    faas::FaasDriver,
};

/// Drives Function entities toward READY at the FaaS backend.
pub struct FunctionHandler {
    store: Arc<dyn EntityStore>,
    faas: Arc<dyn FaasDriver>,
}

impl FunctionHandler {
    pub fn new(store: Arc<dyn EntityStore>, faas: Arc<dyn FaasDriver>) -> Self {
        Self { store, faas }
    }
}

#[async_trait]
impl EntityHandler for FunctionHandler {
    fn entity_type(&self) -> EntityType {
        EntityType::Function
    }

    async fn add(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let Entity::Function(mut function) = entity else {
            bail!("function handler received a non-function entity");
        };
        if function.image.is_empty() {
            // Declaration error, not a backend hiccup: park it in ERROR for
            // the operator instead of retrying forever.
            function.status = Status::Error;
            function.reason = Some("function has no image".to_string());
            self.store.update(function.into()).await?;
            return Ok(());
        }

        function.status = Status::Creating;
        self.store.update(Entity::Function(function.clone())).await?;

        // A failure here leaves the entity in CREATING with a stale
        // ModifiedTime; the resync sweep retries it.
        self.faas.create(&function).await?;

        function.status = Status::Ready;
        function.reason = None;
        info!("function {} is ready", function.name);
        self.store.update(function.into()).await?;
        Ok(())
    }

    async fn update(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let Entity::Function(mut function) = entity else {
            bail!("function handler received a non-function entity");
        };
        if function.image.is_empty() {
            function.status = Status::Error;
            function.reason = Some("function has no image".to_string());
            self.store.update(function.into()).await?;
            return Ok(());
        }

        // Idempotent upsert covers both the UPDATING transition and the
        // READY steady-state reconciliation pass.
        self.faas.create(&function).await?;

        if function.status != Status::Ready {
            function.status = Status::Ready;
            function.reason = None;
            info!("function {} is ready", function.name);
            self.store.update(function.into()).await?;
        }
        Ok(())
    }

    async fn delete(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let Entity::Function(function) = entity else {
            bail!("function handler received a non-function entity");
        };
        self.faas.delete(&function).await?;
        self.store
            .delete(EntityType::Function, &function.id)
            .await?;
        info!("function {} deleted", function.name);
        Ok(())
    }

    async fn error(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let reason = entity
            .as_function()
            .and_then(|f| f.reason.clone())
            .unwrap_or_else(|| "unknown".to_string());
        warn!("function {} in error state: {}", entity.name(), reason);
        Ok(())
    }

    async fn sync(&self, _ctx: &DispatchContext, resync_period: Duration) -> Result<Vec<Entity>> {
        debug!("enumerating stale functions");
        default_sync(self.store.as_ref(), EntityType::Function, resync_period).await
    }
}
