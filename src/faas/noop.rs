use std::collections::HashSet;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::FaasDriver;
use crate::data_model::Function;

/// In-process driver: tracks registrations and echoes invocation payloads.
/// The default backend for development and the test suite.
#[derive(Default)]
pub struct NoopDriver {
    functions: RwLock<HashSet<String>>,
}

impl NoopDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.functions.read().await.contains(name)
    }
}

#[async_trait]
impl FaasDriver for NoopDriver {
    async fn create(&self, function: &Function) -> Result<()> {
        debug!("noop: registering function {}", function.name);
        self.functions.write().await.insert(function.name.clone());
        Ok(())
    }

    async fn delete(&self, function: &Function) -> Result<()> {
        debug!("noop: removing function {}", function.name);
        self.functions.write().await.remove(&function.name);
        Ok(())
    }

    async fn invoke(
        &self,
        function: &Function,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        if !self.is_registered(&function.name).await {
            return Err(anyhow!(
                "function not registered with driver: {}",
                function.name
            ));
        }
        Ok(input.clone())
    }
}
