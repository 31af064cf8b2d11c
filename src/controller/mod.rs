//! Generic reconciliation engine.
//!
//! Drives entities in the store from their declared state toward READY.
//! API handlers wake it through the watch channel; a periodic resync sweep
//! picks up whatever events missed. Both paths feed the same dispatcher,
//! which routes on (delete flag, status) and admits work through one shared
//! worker semaphore.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use tokio::{
    sync::{mpsc, watch, Mutex, Semaphore},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::{
    data_model::{Entity, EntityType, Status},
    entity_store::{EntityStore, Filter, Predicate},
    metrics::{ControllerMetrics, Timer},
    utils::get_epoch_time_in_ms,
};

const DEFAULT_WORKERS: usize = 1;

// Bounded intake: a saturated dispatcher pushes back on API writes instead of
// growing a queue.
const WATCH_CHANNEL_CAPACITY: usize = 1;

/// Reconciliation-scoped context: a request id and the tracing span every log
/// line and child span of this piece of work hangs off.
///
/// Events outlive the API request that produced them, so the watch channel
/// never carries the request's own context. Producers hand the dispatcher a
/// fresh context that keeps only the request id and a span link.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub request_id: String,
    pub span: Span,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    pub fn with_request_id(request_id: String) -> Self {
        let span = info_span!("dispatch", request_id = %request_id);
        Self { request_id, span }
    }

    /// Context for a resync sweep.
    fn for_sync() -> Self {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("controller sync", request_id = %request_id);
        Self { request_id, span }
    }

    /// Re-roots the context for work that outlives the producer: same request
    /// id, a fresh span linked to the producer's.
    fn handoff(&self) -> DispatchContext {
        let span = info_span!("entity event", request_id = %self.request_id);
        span.follows_from(&self.span);
        DispatchContext {
            request_id: self.request_id.clone(),
            span,
        }
    }

    /// Per-entity reconcile context derived at dispatch time.
    fn reconcile(&self, entity: &Entity) -> DispatchContext {
        let span = info_span!(
            "reconcile",
            request_id = %self.request_id,
            entity_type = %entity.entity_type(),
            entity_name = %entity.name(),
            status = %entity.status(),
        );
        span.follows_from(&self.span);
        DispatchContext {
            request_id: self.request_id.clone(),
            span,
        }
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An intake record pairing an entity with its reconciliation context.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub entity: Entity,
    pub ctx: DispatchContext,
}

/// Handle producers use to wake the controller about an entity mutation.
#[derive(Debug, Clone)]
pub struct Watcher {
    tx: Option<mpsc::Sender<WatchEvent>>,
}

impl Watcher {
    /// A watcher with no controller behind it; `on_action` logs and drops.
    /// Stand-in while the API is wired up before the controller.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Pushes an entity onto the controller intake channel. Blocks while the
    /// dispatcher is saturated.
    pub async fn on_action(&self, ctx: &DispatchContext, entity: Entity) {
        let Some(tx) = &self.tx else {
            warn!(
                "nil watcher, skipping entity update: {} - {}",
                entity.name(),
                entity.status()
            );
            return;
        };
        let event = WatchEvent {
            ctx: ctx.handoff(),
            entity,
        };
        if let Err(err) = tx.send(event).await {
            warn!(
                "controller intake closed, dropping entity update: {}",
                err.0.entity.name()
            );
        }
    }
}

/// Reconciles one entity variant toward its declared state.
///
/// `add` must be idempotent: it resumes stuck CREATING entities on resync.
/// `delete` must be idempotent: a deletion already observed at the backend is
/// a success.
#[async_trait]
pub trait EntityHandler: Send + Sync {
    /// The entity variant this handler reconciles. Stable and unique.
    fn entity_type(&self) -> EntityType;

    async fn add(&self, ctx: &DispatchContext, entity: Entity) -> Result<()>;

    async fn update(&self, ctx: &DispatchContext, entity: Entity) -> Result<()>;

    async fn delete(&self, ctx: &DispatchContext, entity: Entity) -> Result<()>;

    async fn error(&self, ctx: &DispatchContext, entity: Entity) -> Result<()>;

    /// Enumerates entities this handler wants reprocessed on a resync tick.
    /// Store-backed handlers use [`default_sync`]; backends with their own
    /// discovery (orphan detection) override.
    async fn sync(&self, ctx: &DispatchContext, resync_period: Duration) -> Result<Vec<Entity>>;
}

/// Lists entities sitting in a transitional status that have not been touched
/// within the resync period.
pub async fn default_sync(
    store: &dyn EntityStore,
    entity_type: EntityType,
    resync_period: Duration,
) -> Result<Vec<Entity>> {
    let cutoff = get_epoch_time_in_ms().saturating_sub(resync_period.as_millis() as u64);
    let filter = Filter::everything()
        .field(Predicate::TypeIs(entity_type))
        .field(Predicate::ModifiedBefore(cutoff))
        .field(Predicate::StatusIn(vec![
            Status::Creating,
            Status::Updating,
            Status::Deleting,
        ]));
    Ok(store.list_global(filter).await?)
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Tag for log lines.
    pub service_name: String,
    /// How often the resync sweep runs. Must be positive; the config layer
    /// validates it.
    pub resync_period: Duration,
    /// Worker-pool size shared by the event and resync paths. Zero means the
    /// default of one.
    pub workers: usize,
}

pub struct Controller {
    inner: Arc<Inner>,
    watcher_rx: Mutex<Option<mpsc::Receiver<WatchEvent>>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    options: ControllerOptions,
    watcher_tx: mpsc::Sender<WatchEvent>,
    handlers: Vec<Arc<dyn EntityHandler>>,
    routes: HashMap<EntityType, Arc<dyn EntityHandler>>,
    slots: Arc<Semaphore>,
    shutdown_tx: watch::Sender<()>,
    metrics: ControllerMetrics,
}

impl Controller {
    pub fn new(mut options: ControllerOptions) -> Self {
        if options.workers == 0 {
            options.workers = DEFAULT_WORKERS;
        }
        let (watcher_tx, watcher_rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(());
        let slots = Arc::new(Semaphore::new(options.workers));
        Self {
            inner: Arc::new(Inner {
                options,
                watcher_tx,
                handlers: Vec::new(),
                routes: HashMap::new(),
                slots,
                shutdown_tx,
                metrics: ControllerMetrics::new(),
            }),
            watcher_rx: Mutex::new(Some(watcher_rx)),
            loops: Mutex::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.inner.options
    }

    pub fn watcher(&self) -> Watcher {
        Watcher {
            tx: Some(self.inner.watcher_tx.clone()),
        }
    }

    /// Registers a handler for its entity type. Registrations only before
    /// `start`; a second handler for the same type replaces the first.
    pub fn add_entity_handler(&mut self, handler: Arc<dyn EntityHandler>) {
        let inner = Arc::get_mut(&mut self.inner).expect("handler registered after start");
        if inner
            .routes
            .insert(handler.entity_type(), handler.clone())
            .is_some()
        {
            inner
                .handlers
                .retain(|h| h.entity_type() != handler.entity_type());
        }
        inner.handlers.push(handler);
    }

    /// Runs the initial sync, then spawns the dispatch and resync loops.
    ///
    /// The initial sync blocks so entities left in flight by a previous
    /// process are queued before any new API write lands.
    pub async fn start(&self) {
        info!(
            "{}: starting controller with {} workers",
            self.inner.options.service_name, self.inner.options.workers
        );
        self.inner.clone().sync().await;

        let rx = self
            .watcher_rx
            .lock()
            .await
            .take()
            .expect("controller already started");

        let dispatch = tokio::spawn(
            self.inner
                .clone()
                .dispatch_loop(rx, self.inner.shutdown_tx.subscribe()),
        );
        let resync = tokio::spawn(
            self.inner
                .clone()
                .resync_loop(self.inner.shutdown_tx.subscribe()),
        );

        self.loops.lock().await.extend([dispatch, resync]);
    }

    /// Signals the loops to stop, waits for them to exit, then waits for
    /// in-flight reconciliations to drain. Events still queued at shutdown
    /// are dropped; no new work is admitted once this returns.
    pub async fn shutdown(&self) {
        info!(
            "{}: shutting down controller",
            self.inner.options.service_name
        );
        let _ = self.inner.shutdown_tx.send(());
        for task in self.loops.lock().await.drain(..) {
            if let Err(err) = task.await {
                error!("controller loop panicked: {}", err);
            }
        }
        let _ = self
            .inner
            .slots
            .acquire_many(self.inner.options.workers as u32)
            .await;
        self.inner.slots.close();
        info!("{}: controller stopped", self.inner.options.service_name);
    }
}

impl Inner {
    async fn dispatch_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<WatchEvent>,
        mut shutdown_rx: watch::Receiver<()>,
    ) {
        loop {
            let event = tokio::select! {
                _ = shutdown_rx.changed() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let permit = tokio::select! {
                _ = shutdown_rx.changed() => break,
                permit = self.slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("worker pool closed, stopping dispatch loop");
                        break;
                    }
                },
            };
            let this = self.clone();
            let WatchEvent { entity, ctx } = event;
            let ctx = ctx.reconcile(&entity);
            let span = ctx.span.clone();
            tokio::spawn(
                async move {
                    info!(
                        "received event={} entity={}",
                        entity.status(),
                        entity.name()
                    );
                    this.process_entity(&ctx, entity).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }
        rx.close();
        info!("{}: dispatch loop stopped", self.options.service_name);
    }

    async fn resync_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<()>) {
        let period = self.options.resync_period;
        // start() already ran a sync; the first tick fires one period later.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    debug!(
                        "{}: periodic syncing with the underlying driver",
                        self.options.service_name
                    );
                    self.clone().sync().await;
                }
            }
        }
        info!("{}: resync loop stopped", self.options.service_name);
    }

    /// One sweep: ask every handler, in registration order, for entities
    /// needing attention and feed them through the dispatcher. A handler
    /// whose enumeration fails is skipped for this sweep.
    async fn sync(self: Arc<Self>) {
        let ctx = DispatchContext::for_sync();
        let span = ctx.span.clone();
        async {
            self.metrics.resyncs.add(1, &[]);
            for handler in &self.handlers {
                let entities = match handler.sync(&ctx, self.options.resync_period).await {
                    Ok(entities) => entities,
                    Err(err) => {
                        error!(
                            "sync failed for {} handler, skipping this tick: {:#}",
                            handler.entity_type(),
                            err
                        );
                        continue;
                    }
                };
                for entity in entities {
                    let permit = match self.slots.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!("worker pool closed, aborting sync");
                            return;
                        }
                    };
                    let this = self.clone();
                    let ctx = ctx.reconcile(&entity);
                    let task_span = ctx.span.clone();
                    tokio::spawn(
                        async move {
                            debug!(
                                "sync: processing entity {} ({})",
                                entity.name(),
                                entity.status()
                            );
                            this.process_entity(&ctx, entity).await;
                            drop(permit);
                        }
                        .instrument(task_span),
                    );
                }
            }
        }
        .instrument(span)
        .await;
    }

    /// Routes one entity to its handler per the status table and logs the
    /// outcome exactly once. Failed entities are not rescheduled here; the
    /// resync sweep picks them up while their status stays transitional.
    async fn process_entity(&self, ctx: &DispatchContext, entity: Entity) {
        let labels = &[KeyValue::new(
            "entity_type",
            entity.entity_type().to_string(),
        )];
        let _timer = Timer::start_with_labels(&self.metrics.reconcile_latency, labels);
        self.metrics.reconciliations.add(1, labels);
        debug!(
            "processing item: {} ({}) with status {}",
            entity.name(),
            entity.id(),
            entity.status()
        );
        if let Err(err) = self.dispatch(ctx, entity).await {
            error!("reconciliation failed: {:#}", err);
        }
    }

    async fn dispatch(&self, ctx: &DispatchContext, entity: Entity) -> Result<()> {
        let Some(handler) = self.routes.get(&entity.entity_type()) else {
            return Err(anyhow!(
                "trying to process an entity with no entity handler: {}",
                entity.entity_type()
            ));
        };
        if entity.delete() {
            return handler.delete(ctx, entity).await;
        }
        match entity.status() {
            Status::Error => handler.error(ctx, entity).await,
            Status::Initialized | Status::Creating | Status::Missing => {
                handler.add(ctx, entity).await
            }
            Status::Updating => handler.update(ctx, entity).await,
            Status::Deleting => handler.delete(ctx, entity).await,
            Status::Ready => handler.update(ctx, entity).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex as StdMutex,
    };

    use tokio::sync::Notify;

    use super::*;
    use crate::{
        data_model::test_objects::tests::*,
        entity_store::{memory::InMemoryEntityStore, EntityStore},
    };

    #[derive(Default)]
    struct RecordingHandler {
        calls: StdMutex<Vec<(&'static str, Entity)>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        work_duration: Option<Duration>,
        gate: Option<Arc<Notify>>,
        fail_next_update: AtomicBool,
        sync_entities: StdMutex<Vec<Entity>>,
        sync_delay: Option<Duration>,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        async fn record(&self, method: &'static str, entity: Entity) {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(duration) = self.work_duration {
                tokio::time::sleep(duration).await;
            }
            self.calls.lock().unwrap().push((method, entity));
            self.active.fetch_sub(1, Ordering::SeqCst);
        }

        fn calls_of(&self, method: &str) -> Vec<Entity> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| *m == method)
                .map(|(_, e)| e.clone())
                .collect()
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EntityHandler for RecordingHandler {
        fn entity_type(&self) -> EntityType {
            EntityType::Function
        }

        async fn add(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
            self.record("add", entity).await;
            Ok(())
        }

        async fn update(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
            self.record("update", entity).await;
            if self.fail_next_update.swap(false, Ordering::SeqCst) {
                return Err(anyhow!("transient backend failure"));
            }
            Ok(())
        }

        async fn delete(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
            self.record("delete", entity).await;
            Ok(())
        }

        async fn error(&self, _ctx: &DispatchContext, entity: Entity) -> Result<()> {
            self.record("error", entity).await;
            Ok(())
        }

        async fn sync(&self, _ctx: &DispatchContext, _resync_period: Duration) -> Result<Vec<Entity>> {
            if let Some(delay) = self.sync_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.sync_entities.lock().unwrap().drain(..).collect())
        }
    }

    fn test_options(workers: usize) -> ControllerOptions {
        ControllerOptions {
            service_name: "test-controller".to_string(),
            resync_period: Duration::from_millis(50),
            workers,
        }
    }

    async fn started_controller(
        handler: Arc<RecordingHandler>,
        workers: usize,
    ) -> Arc<Controller> {
        let mut controller = Controller::new(test_options(workers));
        controller.add_entity_handler(handler);
        let controller = Arc::new(controller);
        controller.start().await;
        controller
    }

    async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            if Instant::now() > deadline {
                panic!("timed out waiting for {what}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_event_dispatch() {
        let handler = RecordingHandler::new();
        let controller = started_controller(handler.clone(), 1).await;

        {
            // The producer context is gone before the handler runs; the event
            // carries its own.
            let ctx = DispatchContext::new();
            controller
                .watcher()
                .on_action(&ctx, mock_function().into())
                .await;
        }

        wait_until("add call", || handler.total_calls() == 1).await;
        let adds = handler.calls_of("add");
        assert_eq!(1, adds.len());
        assert_eq!(TEST_FN_NAME, adds[0].name());
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_routing() {
        let handler = RecordingHandler::new();
        let controller = started_controller(handler.clone(), 1).await;
        let watcher = controller.watcher();
        let ctx = DispatchContext::new();

        for status in [
            Status::Creating,
            Status::Missing,
            Status::Updating,
            Status::Ready,
            Status::Deleting,
            Status::Error,
        ] {
            watcher
                .on_action(&ctx, mock_function_with_status(status))
                .await;
        }

        wait_until("six dispatches", || handler.total_calls() == 6).await;
        assert_eq!(2, handler.calls_of("add").len());
        assert_eq!(2, handler.calls_of("update").len());
        assert_eq!(1, handler.calls_of("delete").len());
        assert_eq!(1, handler.calls_of("error").len());
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_flag_dominates_status() {
        let handler = RecordingHandler::new();
        let controller = started_controller(handler.clone(), 1).await;

        let mut entity = mock_function_with_status(Status::Ready);
        entity.set_delete(true);
        controller
            .watcher()
            .on_action(&DispatchContext::new(), entity)
            .await;

        wait_until("delete call", || handler.total_calls() == 1).await;
        assert_eq!(1, handler.calls_of("delete").len());
        assert!(handler.calls_of("update").is_empty());
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_resync_sweep_bounded_by_workers() {
        let handler = Arc::new(RecordingHandler {
            work_duration: Some(Duration::from_millis(30)),
            ..Default::default()
        });
        for i in 0..3 {
            let mut function = mock_function();
            function.name = format!("fn-{i}");
            function.status = Status::Creating;
            handler
                .sync_entities
                .lock()
                .unwrap()
                .push(function.into());
        }

        let controller = started_controller(handler.clone(), 2).await;

        wait_until("three adds", || handler.calls_of("add").len() == 3).await;
        assert!(
            handler.max_active.load(Ordering::SeqCst) <= 2,
            "more than two reconciliations ran concurrently"
        );
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_resync_tick_picks_up_stale_entities() {
        let handler = RecordingHandler::new();
        let controller = started_controller(handler.clone(), 1).await;

        // Queued after start, so only a periodic tick can find it.
        handler
            .sync_entities
            .lock()
            .unwrap()
            .push(mock_function_with_status(Status::Creating));

        wait_until("resync add", || handler.calls_of("add").len() == 1).await;
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_blocks_until_initial_sync_completes() {
        let handler = Arc::new(RecordingHandler {
            sync_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let mut controller = Controller::new(test_options(1));
        controller.add_entity_handler(handler);
        let controller = Arc::new(controller);

        let started_at = Instant::now();
        controller.start().await;
        assert!(started_at.elapsed() >= Duration::from_millis(100));
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_error_does_not_kill_the_loop() {
        let handler = RecordingHandler::new();
        handler.fail_next_update.store(true, Ordering::SeqCst);
        let controller = started_controller(handler.clone(), 1).await;
        let watcher = controller.watcher();
        let ctx = DispatchContext::new();

        let entity = mock_function_with_status(Status::Updating);
        watcher.on_action(&ctx, entity.clone()).await;
        watcher.on_action(&ctx, entity).await;
        wait_until("two updates", || handler.calls_of("update").len() == 2).await;

        // Still responsive after the failure.
        watcher.on_action(&ctx, mock_function().into()).await;
        wait_until("third dispatch", || handler.calls_of("add").len() == 1).await;
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_graceful_shutdown_drains_in_flight_work() {
        let gate = Arc::new(Notify::new());
        let handler = Arc::new(RecordingHandler {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let controller = started_controller(handler.clone(), 1).await;
        let watcher = controller.watcher();
        let ctx = DispatchContext::new();

        watcher.on_action(&ctx, mock_function().into()).await;
        wait_until("in-flight add", || {
            handler.active.load(Ordering::SeqCst) == 1
        })
        .await;

        // Enqueued but never admitted: shutdown drops it.
        watcher.on_action(&ctx, mock_function().into()).await;

        let shutdown = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.shutdown().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();
        shutdown.await.unwrap();

        assert_eq!(1, handler.total_calls());
        assert_eq!(0, handler.active.load(Ordering::SeqCst));

        // Producers that keep a watcher after shutdown get a logged drop, not
        // a panic.
        watcher.on_action(&ctx, mock_function().into()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(1, handler.total_calls());
    }

    #[tokio::test]
    async fn test_zero_workers_normalized_to_one() {
        let controller = Controller::new(test_options(0));
        assert_eq!(1, controller.options().workers);
    }

    #[tokio::test]
    async fn test_nil_watcher_does_not_panic() {
        let watcher = Watcher::disconnected();
        watcher
            .on_action(&DispatchContext::new(), mock_function().into())
            .await;
    }

    #[tokio::test]
    async fn test_unhandled_entity_type_is_dropped() {
        let handler = RecordingHandler::new();
        let controller = started_controller(handler.clone(), 1).await;
        let watcher = controller.watcher();
        let ctx = DispatchContext::new();

        // No handler registered for runs; the event is logged and dropped.
        watcher
            .on_action(&ctx, mock_run(TEST_FN_NAME).into())
            .await;
        watcher.on_action(&ctx, mock_function().into()).await;

        wait_until("function add", || handler.calls_of("add").len() == 1).await;
        assert_eq!(1, handler.total_calls());
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_default_sync_returns_stale_transitional_entities() {
        let store = InMemoryEntityStore::new();

        let mut stale = mock_function_with_status(Status::Creating);
        stale.set_modified_time(get_epoch_time_in_ms() - 10_000);
        store.add(stale).await.unwrap();

        let mut ready = mock_function_with_status(Status::Ready);
        ready.set_modified_time(get_epoch_time_in_ms() - 10_000);
        let mut function = match ready {
            Entity::Function(ref f) => f.clone(),
            _ => unreachable!(),
        };
        function.name = "converged".to_string();
        function.id = "converged-id".to_string();
        store.add(function.into()).await.unwrap();

        let entities = default_sync(&store, EntityType::Function, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(1, entities.len());
        assert_eq!(Status::Creating, entities[0].status());
    }
}
