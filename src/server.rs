use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::Stream;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;

const INDEX_HTML: &str = include_str!("../static/index.html");
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Broadcaster,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    subscribers: usize,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/events", get(events))
        .route("/api/health", get(health))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server stopped")?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        subscribers: state.broadcaster.subscriber_count(),
    })
}

/// GET /api/events
///
/// One `data:` message per produced report. The subscription lives inside the
/// stream, so it is released as soon as the connection is dropped.
async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.broadcaster.subscribe();
    debug!(client_id = subscription.id(), "event stream opened");
    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(&event) {
                Ok(data) => yield Ok(Event::default().data(data)),
                Err(err) => warn!(error = %err, "failed to encode notification"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
