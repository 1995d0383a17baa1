use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::{ServerConfig, TlsConfig};
use crate::resolver::Resolver;

async fn hello() -> &'static str {
    "Hello, world!"
}

pub fn app(resolver: Arc<Resolver>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(hello))
        .nest(api::BASE_PATH, api::router(resolver))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
}

async fn resolve_addr(config: &ServerConfig) -> Result<SocketAddr> {
    tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", config.host, config.port))?
        .next()
        .ok_or_else(|| anyhow!("No address for {}:{}", config.host, config.port))
}

pub async fn run(config: &ServerConfig, resolver: Arc<Resolver>) -> Result<()> {
    let app = app(
        resolver,
        Duration::from_secs(config.request_timeout_seconds.into()),
    );
    let addr = resolve_addr(config).await?;

    if let Some(tls) = &config.tls {
        return serve_tls(addr, tls, app).await;
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")
}

#[cfg(feature = "tls")]
async fn serve_tls(addr: SocketAddr, tls: &TlsConfig, app: Router) -> Result<()> {
    let rustls =
        axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to load TLS certificate {} / key {}",
                    tls.cert_path.display(),
                    tls.key_path.display()
                )
            })?;
    tracing::info!("Web server running at https://{}", addr);
    axum_server::bind_rustls(addr, rustls)
        .serve(app.into_make_service())
        .await
        .context("Web server failed")
}

#[cfg(not(feature = "tls"))]
async fn serve_tls(_addr: SocketAddr, _tls: &TlsConfig, _app: Router) -> Result<()> {
    Err(anyhow!(
        "TLS is configured but this build does not include the `tls` feature"
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
