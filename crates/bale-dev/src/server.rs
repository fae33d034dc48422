//! The dev HTTP/WebSocket server.
//!
//! Serves the last successful emission from memory and speaks the
//! hot-reload protocol over `/__bale`. The server is a thin transport:
//! every decision about what to send lives in the rebuild loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::protocol::{now_timestamp, ClientMessage, ServerMessage};
use crate::state::DevState;

pub fn router(state: Arc<DevState>) -> Router {
    Router::new()
        .route("/__bale", get(websocket))
        .fallback(get(serve))
        .with_state(state)
}

/// Bind and serve until the task is dropped.
pub async fn run(state: Arc<DevState>, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dev server listening");
    axum::serve(listener, router(state)).await
}

async fn websocket(
    State(state): State<Arc<DevState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_client(state, socket))
}

async fn handle_client(state: Arc<DevState>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let mut messages = state.subscribe();

    let connected = ServerMessage::Connected {
        timestamp: now_timestamp(),
    };
    if send(&mut sink, &connected).await.is_err() {
        return;
    }
    debug!(clients = state.client_count(), "hmr client connected");

    loop {
        tokio::select! {
            broadcasted = messages.recv() => {
                match broadcasted {
                    Ok(message) => {
                        if send(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    // Lagged: the client missed updates; a reload resyncs.
                    Err(_) => {
                        let reload = ServerMessage::FullReload { timestamp: now_timestamp() };
                        if send(&mut sink, &reload).await.is_err() {
                            break;
                        }
                    }
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::HmrAck { update_timestamp }) => {
                            debug!(update_timestamp, "hmr update acknowledged");
                        }
                        Err(error) => warn!(%error, "unrecognised client message"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!(%error, "client socket error");
                        break;
                    }
                }
            }
        }
    }
    debug!("hmr client disconnected");
}

async fn send(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).expect("protocol messages serialise");
    sink.send(Message::Text(json)).await
}

async fn serve(State(state): State<Arc<DevState>>, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    if path.is_empty() || path == "index.html" {
        return html_shell(&state).into_response();
    }
    match state.file(path) {
        Some((bytes, content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Minimal page: entry scripts plus the hot-reload client.
fn html_shell(state: &DevState) -> axum::response::Html<String> {
    let mut scripts = String::new();
    if let Some(output) = state.output() {
        for file in output.manifest.entries.values() {
            scripts.push_str(&format!("  <script src=\"/{file}\"></script>\n"));
        }
    }
    axum::response::Html(format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>bale dev</title></head>\n<body>\n{scripts}  <script>\n{HMR_CLIENT}  </script>\n</body>\n</html>\n"
    ))
}

/// The in-page client: applies `update` payloads by re-evaluating chunk
/// bytes (factories re-register over the old ones), reloads otherwise,
/// and acknowledges applied updates.
const HMR_CLIENT: &str = r#"
(function () {
  var url = (location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/__bale";
  var socket = new WebSocket(url);
  socket.onmessage = function (event) {
    var message = JSON.parse(event.data);
    if (message.type === "update") {
      try {
        // Drop every instantiation, then re-evaluate the patched chunks:
        // factories re-register over the old ones and entry trailers
        // re-run the app against the fresh registry.
        var cache = globalThis.__bale_cache || {};
        Object.keys(cache).forEach(function (id) { delete cache[id]; });
        message.updates.forEach(function (update) {
          (0, eval)(update.newBytes);
        });
        socket.send(JSON.stringify({ type: "hmr-ack", update_timestamp: message.timestamp }));
      } catch (error) {
        location.reload();
      }
    } else if (message.type === "full-reload") {
      location.reload();
    } else if (message.type === "error") {
      console.error("[bale] build failed:", message.message);
    }
  };
  socket.onclose = function () {
    setTimeout(function () { location.reload(); }, 1000);
  };
})();
"#;
