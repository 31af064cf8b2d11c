use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio::time::Instant;

use crate::{
    controller::{Controller, ControllerOptions, Watcher},
    data_model::{Entity, EntityType, Status},
    entity_store::{memory::InMemoryEntityStore, EntityStore},
    faas::{noop::NoopDriver, FaasDriver},
    handlers::{FunctionHandler, FunctionRunHandler},
};

pub const TEST_RESYNC_PERIOD: Duration = Duration::from_millis(50);

/// A store + controller wired like the real service, minus the HTTP server.
pub struct TestService {
    pub store: Arc<dyn EntityStore>,
    pub controller: Arc<Controller>,
    pub watcher: Watcher,
}

impl TestService {
    pub async fn new() -> Result<TestService> {
        Self::with_driver(Arc::new(NoopDriver::new())).await
    }

    pub async fn with_driver(faas: Arc<dyn FaasDriver>) -> Result<TestService> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(crate::tracing::get_env_filter())
            .try_init();

        let store: Arc<dyn EntityStore> = Arc::new(InMemoryEntityStore::new());
        let mut controller = Controller::new(ControllerOptions {
            service_name: "test-function-manager".to_string(),
            resync_period: TEST_RESYNC_PERIOD,
            workers: 2,
        });
        controller.add_entity_handler(Arc::new(FunctionHandler::new(
            store.clone(),
            faas.clone(),
        )));
        controller.add_entity_handler(Arc::new(FunctionRunHandler::new(
            store.clone(),
            faas.clone(),
        )));
        let controller = Arc::new(controller);
        controller.start().await;
        let watcher = controller.watcher();

        Ok(TestService {
            store,
            controller,
            watcher,
        })
    }

    /// Persists the entity and wakes the controller, like an API write does.
    pub async fn submit(&self, entity: Entity) -> Result<Entity> {
        let entity = self.store.add(entity).await?;
        self.watcher
            .on_action(&crate::controller::DispatchContext::new(), entity.clone())
            .await;
        Ok(entity)
    }

    pub async fn wait_for_status(
        &self,
        entity_type: EntityType,
        id: &str,
        status: Status,
    ) -> Result<Entity> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(entity) = self.store.get(entity_type, id).await? {
                if entity.status() == status {
                    return Ok(entity);
                }
            }
            if Instant::now() > deadline {
                return Err(anyhow!(
                    "timed out waiting for {} {} to reach {}",
                    entity_type,
                    id,
                    status
                ));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_for_gone(&self, entity_type: EntityType, id: &str) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while self.store.get(entity_type, id).await?.is_some() {
            if Instant::now() > deadline {
                return Err(anyhow!("timed out waiting for {} {} to go away", entity_type, id));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}
