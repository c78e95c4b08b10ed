use anyhow::Context as _;
use axum::{
    Router,
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

mod audit;
mod config;
mod discovery;
mod error;
mod jwks;
mod key;
mod middleware;
mod telemetry;
mod token;

/// Everything a handler can see. Built once at startup and never mutated.
pub struct AppState {
    settings: config::Settings,
    keys: key::KeyMaterial,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = config::load_config().context("failed to load configuration")?;
    let _telemetry = telemetry::init(&settings.telemetry)?;

    let keys = match key::KeyMaterial::load(&settings.key) {
        Ok(keys) => keys,
        Err(e) => {
            tracing::error!(error = %e, "unable to load signing key");
            return Err(e.into());
        }
    };
    tracing::debug!(jwks = %keys.jwks_json(), "published key set");

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid listen address")?;
    let shutdown_timeout = Duration::from_secs(settings.server.shutdown_timeout_secs);

    let shared_state = Arc::new(AppState { settings, keys });
    let app = app(shared_state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("unable to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    let drain = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let drain = drain.clone();
        async move { drain.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server => {
            result.context("server task failed")?.context("server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    drain.notify_one();
    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(result) => result.context("server task failed")?.context("server error")?,
        Err(_) => tracing::warn!(
            timeout_secs = shutdown_timeout.as_secs(),
            "in-flight requests did not finish in time"
        ),
    }

    tracing::info!("server stopped");
    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    let trust_forwarded_host = state.settings.server.trust_forwarded_host;

    Router::new()
        .route("/", get(root))
        .route(jwks::JWKS_PATH, get(jwks::certs))
        .route(
            discovery::DISCOVERY_PATH,
            get(discovery::openid_configuration),
        )
        .route(token::TOKEN_PATH, post(token::token))
        .fallback(trailing_slash_redirect)
        .layer(middleware::RequestContextLayer::new(trust_forwarded_host))
        .with_state(state)
}

// liveness
async fn root() -> &'static str {
    "ok"
}

const CANONICAL_PATHS: [&str; 3] = [jwks::JWKS_PATH, discovery::DISCOVERY_PATH, token::TOKEN_PATH];

/// `/certs/` and friends redirect to the bound path; anything else is 404.
/// 308 keeps the method, so a `POST /token/` is replayed as a POST.
async fn trailing_slash_redirect(uri: Uri) -> Response {
    match uri.path().strip_suffix('/') {
        Some(path) if CANONICAL_PATHS.contains(&path) => {
            let location = match uri.query() {
                Some(query) => format!("{path}?{query}"),
                None => path.to_string(),
            };
            Redirect::permanent(&location).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
