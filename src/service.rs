use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use axum_server::Handle;
use tokio::{
    signal,
    sync::watch,
};
use tracing::info;

use crate::{
    config::ServerConfig,
    controller::{Controller, ControllerOptions},
    entity_store::{memory::InMemoryEntityStore, EntityStore},
    faas::{noop::NoopDriver, FaasDriver},
    handlers::{FunctionHandler, FunctionRunHandler},
    metrics::{self, api_io_stats},
    routes::{create_routes, RouteState},
};

#[derive(Clone)]
pub struct Service {
    pub config: ServerConfig,
    pub shutdown_tx: watch::Sender<()>,
    pub shutdown_rx: watch::Receiver<()>,
    pub store: Arc<dyn EntityStore>,
    pub controller: Arc<Controller>,
    pub metrics_registry: Arc<prometheus::Registry>,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let registry = metrics::init_provider()?;
        let metrics_registry = Arc::new(registry);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let store: Arc<dyn EntityStore> = Arc::new(InMemoryEntityStore::new());
        // Vendor drivers register here; only the in-process driver ships
        // in-tree.
        let faas: Arc<dyn FaasDriver> = match config.faas.driver.as_str() {
            "noop" => Arc::new(NoopDriver::new()),
            other => return Err(anyhow!("unknown faas driver: {}", other)),
        };

        let mut controller = Controller::new(ControllerOptions {
            service_name: config.service_name.clone(),
            resync_period: Duration::from_secs(config.resync_period_secs),
            workers: config.workers,
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

        Ok(Self {
            config,
            shutdown_tx,
            shutdown_rx,
            store,
            controller,
            metrics_registry,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        self.controller.start().await;

        let route_state = RouteState {
            store: self.store.clone(),
            watcher: self.controller.watcher(),
            registry: self.metrics_registry.clone(),
            metrics: Arc::new(api_io_stats::Metrics::new()),
        };

        let handle = Handle::new();
        let handle_sh = handle.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        let controller = self.controller.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh, shutdown_tx).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
            controller.shutdown().await;
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(route_state);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle, shutdown_tx: watch::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.graceful_shutdown(Some(Duration::from_secs(5)));
    let _ = shutdown_tx.send(());
    info!("signal received, shutting down server gracefully");
}
