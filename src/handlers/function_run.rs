use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    controller::{default_sync, DispatchContext, EntityHandler},
    data_model::{Entity, EntityType, Function, Status},
    entity_store::{EntityStore, Filter, Predicate},
    faas::FaasDriver,
};

/// Executes FunctionRun entities once their parent function is READY.
pub struct FunctionRunHandler {
    store: Arc<dyn EntityStore>,
    faas: Arc<dyn FaasDriver>,
}

impl FunctionRunHandler {
    pub fn new(store: Arc<dyn EntityStore>, faas: Arc<dyn FaasDriver>) -> Self {
        Self { store, faas }
    }

    async fn function_by_name(&self, name: &str) -> Result<Option<Function>> {
        let functions = self
            .store
            .list_global(
                Filter::everything()
                    .field(Predicate::TypeIs(EntityType::Function))
                    .field(Predicate::NameIs(name.to_string())),
            )
            .await?;
        Ok(functions
            .into_iter()
            .next()
            .and_then(|e| e.as_function().cloned()))
    }
}

#[async_trait]
impl EntityHandler for FunctionRunHandler {
    fn entity_type(&self) -> EntityType {
        EntityType::FunctionRun
    }

    async fn add(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let Entity::FunctionRun(mut run) = entity else {
            bail!("function run handler received a non-run entity");
        };

        // Move out of INITIALIZED first so the resync filter can find the run
        // again if anything below fails.
        run.status = Status::Creating;
        self.store
            .update(Entity::FunctionRun(run.clone()))
            .await?;

        let Some(function) = self.function_by_name(&run.function_name).await? else {
            run.status = Status::Error;
            run.reason = Some(format!("function {} does not exist", run.function_name));
            self.store.update(run.into()).await?;
            return Ok(());
        };
        if function.status != Status::Ready {
            bail!(
                "function {} is not ready yet, retrying run {} later",
                function.name,
                run.id
            );
        }

        let output = self.faas.invoke(&function, &run.input).await?;
        run.output = Some(output);
        run.status = Status::Ready;
        run.reason = None;
        info!("run {} of function {} completed", run.id, run.function_name);
        self.store.update(run.into()).await?;
        Ok(())
    }

    async fn update(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let Entity::FunctionRun(mut run) = entity else {
            bail!("function run handler received a non-run entity");
        };
        // Runs are immutable once executed; the steady-state pass only
        // repairs a status that slipped.
        if run.status != Status::Ready {
            run.status = Status::Ready;
            self.store.update(run.into()).await?;
        }
        Ok(())
    }

    async fn delete(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let Entity::FunctionRun(run) = entity else {
            bail!("function run handler received a non-run entity");
        };
        // Runs own no backend resource; dropping the row is the deletion.
        self.store
            .delete(EntityType::FunctionRun, &run.id)
            .await?;
        info!("run {} deleted", run.id);
        Ok(())
    }

    async fn error(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let reason = entity
            .as_function_run()
            .and_then(|r| r.reason.clone())
            .unwrap_or_else(|| "unknown".to_string());
        warn!("run {} in error state: {}", entity.name(), reason);
        Ok(())
    }

    async fn sync(&self, _ctx: &DispatchContext, resync_period: Duration) -> Result<Vec<Entity>> {
        debug!("enumerating stale function runs");
        default_sync(self.store.as_ref(), EntityType::FunctionRun, resync_period).await
    }
}
