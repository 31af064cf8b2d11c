#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use crate::{
        data_model::{test_objects::tests::*, EntityType, Function, Status},
        faas::{noop::NoopDriver, FaasDriver},
        testing::TestService,
    };

    #[tokio::test]
    async fn test_function_converges_to_ready() -> Result<()> {
        let test_srv = TestService::new().await?;

        let entity = test_srv.submit(mock_function().into()).await?;
        let ready = test_srv
            .wait_for_status(EntityType::Function, entity.id(), Status::Ready)
            .await?;

        assert_eq!(TEST_FN_NAME, ready.name());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_converges_after_its_function() -> Result<()> {
        let test_srv = TestService::new().await?;

        let function = test_srv.submit(mock_function().into()).await?;
        // Submitted immediately, before the function is READY: the first
        // reconcile attempt fails and the resync sweep finishes the job.
        let run = test_srv.submit(mock_run(TEST_FN_NAME).into()).await?;

        test_srv
            .wait_for_status(EntityType::Function, function.id(), Status::Ready)
            .await?;
        let done = test_srv
            .wait_for_status(EntityType::FunctionRun, run.id(), Status::Ready)
            .await?;

        assert_eq!(
            Some(serde_json::json!({"name": "world"})),
            done.as_function_run().unwrap().output
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_run_against_unknown_function_parks_in_error() -> Result<()> {
        let test_srv = TestService::new().await?;

        let run = test_srv.submit(mock_run("no-such-function").into()).await?;
        let parked = test_srv
            .wait_for_status(EntityType::FunctionRun, run.id(), Status::Error)
            .await?;

        assert!(parked
            .as_function_run()
            .unwrap()
            .reason
            .as_deref()
            .unwrap()
            .contains("does not exist"));
        Ok(())
    }

    #[tokio::test]
    async fn test_tombstoned_function_disappears() -> Result<()> {
        let test_srv = TestService::new().await?;

        let entity = test_srv.submit(mock_function().into()).await?;
        let mut ready = test_srv
            .wait_for_status(EntityType::Function, entity.id(), Status::Ready)
            .await?;

        ready.set_delete(true);
        ready.set_status(Status::Deleting);
        let tombstoned = test_srv.store.update(ready).await?;
        test_srv
            .watcher
            .on_action(&crate::controller::DispatchContext::new(), tombstoned)
            .await;

        test_srv
            .wait_for_gone(EntityType::Function, entity.id())
            .await?;
        Ok(())
    }

    /// Fails the first create, then behaves. Models a transient backend
    /// outage the resync sweep recovers from.
    struct FlakyDriver {
        inner: NoopDriver,
        fail_once: AtomicBool,
    }

    impl FlakyDriver {
        fn new() -> Self {
            Self {
                inner: NoopDriver::new(),
                fail_once: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl FaasDriver for FlakyDriver {
        async fn create(&self, function: &Function) -> Result<()> {
            if self.fail_once.swap(false, Ordering::SeqCst) {
                return Err(anyhow!("backend unavailable"));
            }
            self.inner.create(function).await
        }

        async fn delete(&self, function: &Function) -> Result<()> {
            self.inner.delete(function).await
        }

        async fn invoke(
            &self,
            function: &Function,
            input: &serde_json::Value,
        ) -> Result<serde_json::Value> {
            self.inner.invoke(function, input).await
        }
    }

    #[tokio::test]
    async fn test_transient_driver_failure_is_retried_by_resync() -> Result<()> {
        let test_srv = TestService::with_driver(Arc::new(FlakyDriver::new())).await?;

        let entity = test_srv.submit(mock_function().into()).await?;

        // First attempt fails and leaves the function in CREATING; the next
        // sweep finds it stale and retries.
        let ready = test_srv
            .wait_for_status(EntityType::Function, entity.id(), Status::Ready)
            .await?;
        assert_eq!(Status::Ready, ready.status());
        Ok(())
    }

    #[tokio::test]
    async fn test_function_without_image_stays_in_error() -> Result<()> {
        let test_srv = TestService::new().await?;

        let mut function = mock_function();
        function.image = String::new();
        let entity = test_srv.submit(function.into()).await?;

        let parked = test_srv
            .wait_for_status(EntityType::Function, entity.id(), Status::Error)
            .await?;
        assert!(parked.as_function().unwrap().reason.is_some());

        // ERROR is terminal: the resync sweep leaves it alone.
        tokio::time::sleep(crate::testing::TEST_RESYNC_PERIOD * 3).await;
        let still_parked = test_srv
            .store
            .get(EntityType::Function, entity.id())
            .await?
            .unwrap();
        assert_eq!(Status::Error, still_parked.status());
        Ok(())
    }
}
