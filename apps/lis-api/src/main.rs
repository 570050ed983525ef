//! LIS 仪器接入服务：HTTP API、仪器监听器与后台任务。

mod handlers;
mod ingest;
mod middleware;
mod routes;
mod seed;
mod utils;

use axum::Router;
use lis_config::AppConfig;
use lis_pipeline::{MessageProcessor, PipelineStores};
use lis_plugin::PluginRegistry;
use lis_storage::{
    AnalyzerStore, InMemoryAnalyzerErrorStore, InMemoryAnalyzerStore, InMemoryMappingStore,
    InMemoryResultStore, InMemoryTransportConfigStore, PgAnalyzerErrorStore, PgAnalyzerStore,
    PgMappingStore, PgResultStore, PgTransportConfigStore, connect_pool, run_migrations,
};
use lis_telemetry::init_tracing;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<MessageProcessor>,
    pub stores: PipelineStores,
    /// `postgres` 或 `memory`。
    pub storage: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let (stores, storage) = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = connect_pool(database_url).await?;
            if config.run_migrations {
                run_migrations(&pool).await?;
                info!(target: "lis.api", "migrations_applied");
            }
            let stores = PipelineStores {
                analyzers: Arc::new(PgAnalyzerStore::new(pool.clone())),
                mappings: Arc::new(PgMappingStore::new(pool.clone())),
                errors: Arc::new(PgAnalyzerErrorStore::new(pool.clone())),
                results: Arc::new(PgResultStore::new(pool.clone())),
                transport_configs: Arc::new(PgTransportConfigStore::new(pool)),
            };
            (stores, "postgres")
        }
        None => (in_memory_stores(), "memory"),
    };
    info!(target: "lis.api", storage, "storage_ready");

    if let Some(path) = config.seed_file.as_deref() {
        let file = seed::load_seed(path).await?;
        let summary = seed::apply_seed(&file, &stores).await?;
        info!(
            target: "lis.api",
            path = %path.display(),
            analyzers = summary.analyzers,
            mappings = summary.mappings,
            "seed_applied"
        );
    }

    // 插件按仪器类型在启动时注册
    let types = stores.analyzers.list_analyzer_types().await?;
    let registry = PluginRegistry::from_analyzer_types(&types, stores.results.clone());
    info!(target: "lis.api", plugins = registry.len(), "plugins_registered");

    let processor = Arc::new(
        MessageProcessor::new(Arc::new(registry), stores.clone())
            .with_preview_limit(config.preview_max_bytes),
    );
    let state = AppState {
        processor: processor.clone(),
        stores: stores.clone(),
        storage,
    };

    ingest::spawn_sources(&config, processor.clone(), stores.transport_configs.clone()).await?;
    ingest::spawn_lifecycle_sweep(&config, processor.lifecycle().clone());

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "lis.api", addr = %config.http_addr, "http_listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// 组装路由与中间件。
pub fn build_app(state: AppState) -> Router {
    routes::create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(axum::middleware::from_fn(middleware::request_context))
}

fn in_memory_stores() -> PipelineStores {
    PipelineStores {
        analyzers: Arc::new(InMemoryAnalyzerStore::new()),
        mappings: Arc::new(InMemoryMappingStore::new()),
        errors: Arc::new(InMemoryAnalyzerErrorStore::new()),
        results: Arc::new(InMemoryResultStore::new()),
        transport_configs: Arc::new(InMemoryTransportConfigStore::new()),
    }
}

#[cfg(test)]
mod tests;
