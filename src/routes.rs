use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::{
    controller::{DispatchContext, Watcher},
    data_model::{Entity, EntityType, Function, Status},
    entity_store::{EntityStore, Filter, Predicate},
    http_objects::{
        ApiError, ApiFunction, ApiFunctionRun, CreateFunction, FunctionList, FunctionRunList,
        RunFunction, UpdateFunction,
    },
    metrics::api_io_stats,
    middleware::{RequestIdSpan, REQUEST_ID_HEADER},
};

#[derive(Clone)]
pub struct RouteState {
    pub store: Arc<dyn EntityStore>,
    pub watcher: Watcher,
    pub registry: Arc<prometheus::Registry>,
    pub metrics: Arc<api_io_stats::Metrics>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    Router::new()
        .route(
            "/functions",
            get(list_functions).post(create_function),
        )
        .route(
            "/functions/{name}",
            get(get_function)
                .put(update_function)
                .delete(delete_function),
        )
        .route(
            "/functions/{name}/runs",
            get(list_function_runs).post(run_function),
        )
        .route("/runs/{id}", get(get_function_run))
        .route("/metrics", get(export_metrics))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdSpan))
        .with_state(route_state)
}

/// The watch event context for this request: request id inherited from the
/// inbound header or freshly minted.
fn dispatch_context(headers: &HeaderMap) -> DispatchContext {
    match headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(request_id) => DispatchContext::with_request_id(request_id.to_string()),
        None => DispatchContext::new(),
    }
}

async fn function_by_name(
    store: &Arc<dyn EntityStore>,
    name: &str,
) -> Result<Function, ApiError> {
    let functions = store
        .list_global(
            Filter::everything()
                .field(Predicate::TypeIs(EntityType::Function))
                .field(Predicate::NameIs(name.to_string())),
        )
        .await?;
    functions
        .into_iter()
        .next()
        .and_then(|e| e.as_function().cloned())
        .ok_or_else(|| ApiError::not_found(&format!("function not found: {name}")))
}

async fn create_function(
    State(state): State<RouteState>,
    headers: HeaderMap,
    Json(request): Json<CreateFunction>,
) -> Result<(StatusCode, Json<ApiFunction>), ApiError> {
    state.metrics.function_writes.add(1, &[]);
    let ctx = dispatch_context(&headers);
    let span = ctx.span.clone();
    async {
        let function = request.into_function()?;
        let entity = state.store.add(function.into()).await?;
        state.watcher.on_action(&ctx, entity.clone()).await;
        let function = entity.as_function().cloned().expect("function entity");
        Ok((StatusCode::CREATED, Json(function.into())))
    }
    .instrument(span)
    .await
}

async fn list_functions(
    State(state): State<RouteState>,
) -> Result<Json<FunctionList>, ApiError> {
    let entities = state
        .store
        .list_global(Filter::everything().field(Predicate::TypeIs(EntityType::Function)))
        .await?;
    let functions = entities
        .into_iter()
        .filter_map(|e| e.as_function().cloned())
        .map(ApiFunction::from)
        .collect();
    Ok(Json(FunctionList { functions }))
}

async fn get_function(
    State(state): State<RouteState>,
    Path(name): Path<String>,
) -> Result<Json<ApiFunction>, ApiError> {
    let function = function_by_name(&state.store, &name).await?;
    Ok(Json(function.into()))
}

async fn update_function(
    State(state): State<RouteState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateFunction>,
) -> Result<Json<ApiFunction>, ApiError> {
    state.metrics.function_writes.add(1, &[]);
    let ctx = dispatch_context(&headers);
    let span = ctx.span.clone();
    async {
        let mut function = function_by_name(&state.store, &name).await?;
        function.image = request.image;
        function.source = request.source;
        if let Some(main) = request.main {
            function.main = main;
        }
        function.secrets = request.secrets;
        function.labels = request.labels;
        function.status = Status::Updating;
        let entity = state.store.update(function.into()).await?;
        state.watcher.on_action(&ctx, entity.clone()).await;
        let function = entity.as_function().cloned().expect("function entity");
        Ok(Json(function.into()))
    }
    .instrument(span)
    .await
}

async fn delete_function(
    State(state): State<RouteState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.metrics.function_writes.add(1, &[]);
    let ctx = dispatch_context(&headers);
    let span = ctx.span.clone();
    async {
        let mut function = function_by_name(&state.store, &name).await?;
        // Tombstone only: the row disappears once the handler has torn the
        // backend function down.
        function.delete = true;
        function.status = Status::Deleting;
        let entity = state.store.update(function.into()).await?;
        state.watcher.on_action(&ctx, entity).await;
        Ok(StatusCode::ACCEPTED)
    }
    .instrument(span)
    .await
}

async fn run_function(
    State(state): State<RouteState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RunFunction>,
) -> Result<(StatusCode, Json<ApiFunctionRun>), ApiError> {
    state.metrics.run_submissions.add(1, &[]);
    let ctx = dispatch_context(&headers);
    let span = ctx.span.clone();
    async {
        // The write lands even when the function was never declared; the
        // run handler parks orphan runs in ERROR, surfaced by status polling.
        let run = request.into_run(&name)?;
        let entity = state.store.add(run.into()).await?;
        state.watcher.on_action(&ctx, entity.clone()).await;
        let run = entity.as_function_run().cloned().expect("run entity");
        Ok((StatusCode::ACCEPTED, Json(run.into())))
    }
    .instrument(span)
    .await
}

async fn list_function_runs(
    State(state): State<RouteState>,
    Path(name): Path<String>,
) -> Result<Json<FunctionRunList>, ApiError> {
    let entities = state
        .store
        .list_global(Filter::everything().field(Predicate::TypeIs(EntityType::FunctionRun)))
        .await?;
    let runs = entities
        .into_iter()
        .filter_map(|e| e.as_function_run().cloned())
        .filter(|r| r.function_name == name)
        .map(ApiFunctionRun::from)
        .collect();
    Ok(Json(FunctionRunList { runs }))
}

async fn get_function_run(
    State(state): State<RouteState>,
    Path(id): Path<String>,
) -> Result<Json<ApiFunctionRun>, ApiError> {
    let entity = state
        .store
        .get(EntityType::FunctionRun, &id)
        .await?
        .ok_or_else(|| ApiError::not_found(&format!("run not found: {id}")))?;
    let run = match entity {
        Entity::FunctionRun(run) => run,
        _ => return Err(ApiError::not_found(&format!("run not found: {id}"))),
    };
    Ok(Json(run.into()))
}

async fn export_metrics(
    State(state): State<RouteState>,
) -> Result<String, ApiError> {
    let encoder = prometheus::TextEncoder::new();
    encoder
        .encode_to_string(&state.registry.gather())
        .map_err(|e| ApiError::internal_error(anyhow::anyhow!(e)))
}
