use broker_core::Config;
use broker_server::{grpc, http, state::Shared};
use std::net::SocketAddr;
use std::time::Duration;
use tonic::transport::Server as GrpcServer;
use tracing::{error, info};

const DEFAULT_GRPC_ADDR: &str = "0.0.0.0:50051";
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

fn read_addr(key: &str, default: &str) -> SocketAddr {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| default.parse().expect("default addr is valid"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let grpc_addr = read_addr("BROKER_GRPC_ADDR", DEFAULT_GRPC_ADDR);
    let http_addr = read_addr("BROKER_HTTP_ADDR", DEFAULT_HTTP_ADDR);

    let shared = Shared::new(config);
    info!(
        max_inflight = shared.config.max_inflight,
        ?grpc_addr,
        ?http_addr,
        "starting collection broker"
    );

    // The gRPC server runs as a background task; the HTTP server is the
    // main loop. A listener bind failure on either surfaces as a non-zero
    // exit, per the exit-code contract.
    let grpc_service = grpc::CollectorService::new(shared.broker.clone(), shared.config.submit_deadline);
    let grpc_handle = tokio::spawn(async move {
        GrpcServer::builder()
            .add_service(grpc_service)
            .serve(grpc_addr)
            .await
    });

    let http_state = http::HttpState {
        gateway: shared.gateway.clone(),
        take_poll_window: shared.config.take_poll_window,
    };
    let app = http::router(http_state);

    let listener = match tokio::net::TcpListener::bind(http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    let http_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shared.queue.clone()))
        .await;

    if let Err(e) = http_result {
        error!(error = %e, "HTTP server exited with error");
        std::process::exit(1);
    }

    grpc_handle.abort();
    tokio::time::timeout(SHUTDOWN_DRAIN, async {
        let _ = grpc_handle.await;
    })
    .await
    .ok();

    info!("shutdown complete");
    Ok(())
}

/// Waits for SIGINT/SIGTERM, then wakes every operator long-poll parked in
/// `take_next` so they observe the shutdown promptly instead of riding out
/// their full poll window while axum drains in-flight connections.
async fn shutdown_signal(queue: std::sync::Arc<broker_core::WorkQueue>) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("termination signal received, draining");
    queue.wake_all_waiters();
}
