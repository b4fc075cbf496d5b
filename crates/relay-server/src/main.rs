mod app;
mod config;
mod delivery;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_api::TaskServiceAdapter;
use relay_core::{fleet::LocalFleet, location::StaticLocations, service::TaskService};
use relay_observe::init_logger;
use relay_prometheus::PrometheusMetrics;

use crate::{config::ServerConfig, delivery::WebhookDelivery};

#[derive(Parser, Debug)]
#[command(name = "relay-server", author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1) config + logger
    let cfg = ServerConfig::load(args.config.as_deref())?;
    init_logger(&cfg.logger)?;
    info!(locations = cfg.locations.len(), "configuration loaded");

    // 2) dispatch core
    let metrics = PrometheusMetrics::new().context("failed to register metrics")?;
    let delivery = WebhookDelivery::new(Duration::from_millis(cfg.callback_timeout_ms))
        .context("failed to build callback http client")?;
    let service = TaskService::builder()
        .with_config(cfg.core.clone())
        .with_fleet(Arc::new(LocalFleet::new()))
        .with_locations(Arc::new(StaticLocations::from(cfg.locations.clone())))
        .with_metrics(Arc::new(metrics.clone()))
        .with_delivery(Arc::new(delivery))
        .build();
    let handler = Arc::new(TaskServiceAdapter::new(Arc::new(service)));

    // 3) shutdown on ctrl-c
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    // 4) listeners
    let mut servers = JoinSet::new();
    servers.spawn(serve_http(
        cfg.http_addr,
        app::router(handler.clone(), metrics),
        shutdown.clone(),
    ));

    #[cfg(feature = "grpc")]
    if let Some(addr) = cfg.grpc_addr {
        servers.spawn(serve_grpc(addr, handler.clone(), shutdown.clone()));
    }
    #[cfg(not(feature = "grpc"))]
    if cfg.grpc_addr.is_some() {
        tracing::warn!("grpc_addr is set but this build has no grpc support; ignoring");
    }

    while let Some(joined) = servers.join_next().await {
        let res = joined.context("server task panicked").and_then(|r| r);
        if let Err(e) = res {
            shutdown.cancel();
            return Err(e);
        }
    }
    info!("relay-server stopped");
    Ok(())
}

async fn serve_http(
    addr: SocketAddr,
    app: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind http listener on {addr}"))?;
    info!(%addr, "http api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("http server failed")
}

#[cfg(feature = "grpc")]
async fn serve_grpc(
    addr: SocketAddr,
    handler: Arc<TaskServiceAdapter>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    use relay_api::{RelayApiServer, RelayApiService};

    info!(%addr, "grpc api listening");
    tonic::transport::Server::builder()
        .add_service(RelayApiServer::new(RelayApiService::new(handler)))
        .serve_with_shutdown(addr, shutdown.cancelled_owned())
        .await
        .context("grpc server failed")
}
