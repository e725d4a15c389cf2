use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use event_bus::EventBus;
use playground_road::config::AppConfig;
use playground_road::platform::Platform;
use playground_road::routes;
use playground_road::scheduler::Scheduler;
use playground_road::state::AppState;
use playground_road::storage;
use playground_road::task::{SessionTimer, Task, WorkerRegistry};
use playground_road::telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env()?;
    init_tracing(&cfg.log_filter);

    let store = storage::build_store(cfg.store_backend, cfg.redis_url.as_deref());
    let events = EventBus::local();
    let platform = Platform::new(Arc::clone(&store), events.clone());

    let playground = platform
        .ensure_playground(&cfg.playground_domain, cfg.default_session_duration_secs)
        .await
        .context("failed to load or create the default playground")?;

    let timer = SessionTimer::new(events.clone(), Arc::clone(&store), WorkerRegistry::new())
        .with_store_timeout(cfg.store_call_timeout());
    let tasks: Vec<Arc<dyn Task>> = vec![Arc::new(timer)];
    let scheduler = Scheduler::new(Arc::clone(&store), tasks);
    if let Err(err) = scheduler.schedule_existing().await {
        warn!(error = %err, "failed to schedule existing instances");
    }
    // The bus is process-local. Instances written by an external provisioner
    // after boot only reach the listener once something bridges its
    // `instance new` events onto this bus; until then they are picked up by
    // the startup scan of the next restart.
    let _listener = scheduler.listen(&events);

    let app: Router = routes::router(AppState::with_event_stream(platform));

    info!(
        addr = %cfg.bind_addr,
        store_backend = ?cfg.store_backend,
        redis = %cfg.redis_url.as_deref().unwrap_or("unset"),
        playground_id = %playground.id,
        playground_domain = %playground.domain,
        store_call_timeout_ms = cfg.store_call_timeout_ms,
        tasks = ?scheduler.task_names(),
        "starting playground-road"
    );
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
