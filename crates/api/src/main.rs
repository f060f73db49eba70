use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::Router;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intake_api::config::ServerConfig;
use intake_api::{router, state};
use intake_events::{BroadcastState, ControlBus, ControlConsumer, HookRegistry};
use intake_pipeline::{TransformStage, TransformWorker, WorkerChannels};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intake_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = intake_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    intake_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    intake_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Control bus and worker state ---
    // Receivers must exist before the catalog is republished, otherwise the
    // replay records are lost and workers start with an empty hook set.
    let bus = ControlBus::default();
    let worker_states: Vec<Arc<BroadcastState>> = (0..config.worker_count)
        .map(|_| Arc::new(BroadcastState::new()))
        .collect();
    let control_receivers: Vec<_> = (0..config.worker_count).map(|_| bus.subscribe()).collect();

    let registry = Arc::new(HookRegistry::new(pool.clone(), bus));

    let shutdown = CancellationToken::new();
    for (worker_id, (worker_state, receiver)) in worker_states
        .iter()
        .zip(control_receivers)
        .enumerate()
    {
        let consumer = ControlConsumer::new(worker_id, Arc::clone(worker_state), receiver);
        tokio::spawn(consumer.run(shutdown.clone()));
    }

    let republished = registry
        .republish_all()
        .await
        .expect("Failed to republish hook catalog");
    tracing::info!(republished, "Hook catalog republished to workers");

    // --- Pipeline channels ---
    let (ingest_tx, ingest_rx) = mpsc::channel(config.main_channel_capacity);
    let (success_tx, mut success_rx) = mpsc::channel(config.output_channel_capacity);
    let (dead_tx, mut dead_rx) = mpsc::channel(config.output_channel_capacity);
    let shared_input = Arc::new(Mutex::new(ingest_rx));

    // --- Transform workers ---
    let mut worker_handles = Vec::with_capacity(config.worker_count);
    for (worker_id, worker_state) in worker_states.into_iter().enumerate() {
        let worker = TransformWorker::new(
            worker_id,
            TransformStage::new(worker_state),
            Arc::clone(&shared_input),
            WorkerChannels {
                success: success_tx.clone(),
                dead_letter: dead_tx.clone(),
            },
        );
        worker_handles.push(tokio::spawn(worker.run(shutdown.clone())));
    }
    drop(success_tx);
    drop(dead_tx);
    tracing::info!(worker_count = config.worker_count, "Transform workers started");

    // --- Output consumers ---
    // Transformed messages and failures are consumed and logged; a
    // downstream delivery integration would replace these loops.
    let success_handle = tokio::spawn(async move {
        while let Some(out) = success_rx.recv().await {
            tracing::info!(
                message_id = %out.message_id,
                hook_name = %out.hook_name,
                "Message transformed"
            );
        }
    });
    let dead_letter_handle = tokio::spawn(async move {
        while let Some(failed) = dead_rx.recv().await {
            tracing::warn!(
                message_id = %failed.message_id,
                hook_name = failed.hook_name.as_deref().unwrap_or("<none>"),
                error = %failed.error_message,
                execution_time_ms = failed.execution_time_ms,
                "Message transformation failed"
            );
        }
    });

    // --- App state ---
    let app_state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry,
        ingest_tx,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        .merge(router::health_router())
        .nest("/api/v1", router::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(app_state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining pipeline");

    // Stop workers and control consumers; in-flight messages finish first.
    shutdown.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    for handle in worker_handles {
        let _ = tokio::time::timeout(drain, handle).await;
    }
    tracing::info!("Transform workers stopped");

    // Output channels close once the last worker sender is dropped.
    let _ = tokio::time::timeout(drain, success_handle).await;
    let _ = tokio::time::timeout(drain, dead_letter_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server shuts
/// down cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
