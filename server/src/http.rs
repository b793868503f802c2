//! HTTP shell - the `/mcp` event channel, the liveness probe, and CORS.
//!
//! The wire protocol is a persistent text-event channel: each `POST /mcp`
//! body is one inbound JSON-RPC message, and the response is framed as a
//! single `event: message` server-sent event on a stream that then stays
//! open, fed keep-alive comments against transport timeouts. An empty body
//! just opens the channel with a `: connected` comment.

use std::convert::Infallible;
use std::task::Poll;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::session::{ChannelGuard, SERVER_NAME, SessionHandle};

#[derive(Clone)]
struct AppState {
    session: SessionHandle,
    keep_alive: Duration,
}

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
    server: &'static str,
}

/// Build the application router.
///
/// All responses carry permissive cross-origin headers; preflight `OPTIONS`
/// requests are answered with an empty 200 by the CORS layer.
#[must_use]
pub fn router(session: SessionHandle, keep_alive: Duration) -> Router {
    // The keep-alive timer panics on a zero period.
    let keep_alive = if keep_alive.is_zero() {
        Duration::from_secs(30)
    } else {
        keep_alive
    };
    Router::new()
        .route("/mcp", post(mcp_channel))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(AppState {
            session,
            keep_alive,
        })
}

async fn health() -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        server: SERVER_NAME,
    })
}

async fn mcp_channel(
    State(state): State<AppState>,
    body: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let guard = state.session.open_channel();
    let first = first_event(&state.session, &body).await;
    Sse::new(channel_stream(first, guard))
        .keep_alive(KeepAlive::new().interval(state.keep_alive).text("keepalive"))
}

/// The first event on a fresh channel: the framed response for a message
/// body, a greeting comment for an empty body, or nothing for a dropped
/// message.
async fn first_event(session: &SessionHandle, body: &str) -> Option<Event> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Some(Event::default().comment("connected"));
    }

    let raw: Value = match serde_json::from_str(trimmed) {
        Ok(raw) => raw,
        Err(e) => {
            // ParseError: no correlation id is recoverable, so no reply.
            tracing::warn!("dropping unparseable channel message: {e}");
            return None;
        }
    };

    let response = session.request(raw).await?;
    match serde_json::to_string(&response) {
        Ok(data) => Some(Event::default().event("message").data(data)),
        Err(e) => {
            tracing::error!("serializing response failed: {e}");
            None
        }
    }
}

/// Emit at most one event, then stay pending until the client disconnects.
///
/// The guard rides inside the stream so dropping the connection notifies
/// the session that the channel closed.
fn channel_stream(
    first: Option<Event>,
    guard: ChannelGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut first = first;
    futures_util::stream::poll_fn(move |_| {
        let _keep_open = &guard;
        match first.take() {
            Some(event) => Poll::Ready(Some(Ok(event))),
            None => Poll::Pending,
        }
    })
}
