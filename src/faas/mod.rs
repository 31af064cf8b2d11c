//! FaaS backend drivers.
//!
//! The function manager realizes declared functions at whatever FaaS backend
//! it is pointed at. Each backend is an adapter behind [`FaasDriver`]; the
//! in-tree [`noop::NoopDriver`] keeps everything in process.

use anyhow::Result;
use async_trait::async_trait;

use crate::data_model::Function;

pub mod noop;

/// Backend adapter the function handlers drive.
///
/// All operations are idempotent: creating a function that already exists and
/// deleting one that is already gone are successes, so reconciliation can
/// resume after a crash without bookkeeping.
#[async_trait]
pub trait FaasDriver: Send + Sync {
    /// Registers (or re-registers) the function at the backend.
    async fn create(&self, function: &Function) -> Result<()>;

    /// Removes the function from the backend.
    async fn delete(&self, function: &Function) -> Result<()>;

    /// Executes the function with the given payload and returns its output.
    async fn invoke(
        &self,
        function: &Function,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value>;
}
