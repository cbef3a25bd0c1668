use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::client::HttpUpstreamClient;
use crate::config::{Configuration, ConfigurationUpdate, SharedConfiguration};
use crate::dispatcher::Dispatcher;
use crate::domain::RequestEnvelope;
use crate::ProxyError;

/// State injected into the handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: SharedConfiguration,
}

/// The proxy surface: a thin admin corner plus a catch-all comparison
/// handler for everything else.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/configuration",
            get(get_configuration).put(put_configuration),
        )
        .fallback(compare_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Binds the listener and serves until shutdown.
pub async fn start_proxy(config: Configuration) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpUpstreamClient::new(&config.tls)?;
    let port = config.port;
    let shared = SharedConfiguration::new(config);
    let dispatcher = Arc::new(Dispatcher::new(shared.clone(), Arc::new(client)));
    let state = AppState {
        dispatcher,
        config: shared,
    };

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        service = %state.config.snapshot().service_name(),
        "differential proxy listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("proxy stopped");
    Ok(())
}

/// Translates a comparison outcome into the caller-facing status code. The
/// caller is an oracle consumer: verdict responses carry no body, error
/// responses carry the message.
async fn compare_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(body) => body.to_vec(),
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("cannot read request body: {}", e),
            )
                .into_response()
        }
    };
    let envelope = RequestEnvelope::new(parts.method, parts.uri, parts.headers, body);

    match state.dispatcher.compare(&envelope).await {
        Ok((result, _content)) => {
            if result.equal_content {
                StatusCode::OK.into_response()
            } else {
                StatusCode::PRECONDITION_FAILED.into_response()
            }
        }
        Err(error) => (status_for(&error), error.to_string()).into_response(),
    }
}

async fn get_configuration(State(state): State<AppState>) -> Json<Configuration> {
    Json((*state.config.snapshot()).clone())
}

async fn put_configuration(
    State(state): State<AppState>,
    Json(patch): Json<ConfigurationUpdate>,
) -> Response {
    match state.config.update(&patch) {
        Ok(()) => {
            tracing::info!("configuration updated");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(error) => (status_for(&error), error.to_string()).into_response(),
    }
}

pub(crate) fn status_for(error: &ProxyError) -> StatusCode {
    match error {
        ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        ProxyError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ProxyError::NoisePrecondition(_) => StatusCode::BAD_REQUEST,
        ProxyError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
        ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
