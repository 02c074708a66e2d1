// src/livereload/server.rs

//! LiveReload (protocol 7) push server.
//!
//! Browsers connect with a WebSocket to `/livereload` and send a `hello`
//! command; the server answers with its own `hello`. After that every
//! [`ReloadNotifier::notify_reload`] is fanned out to all connected clients
//! as a `reload` command.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::Session;
use crate::livereload::pipeline::ReloadNotifier;

pub const PROTOCOL: &str = "http://livereload.com/protocols/official-7";
const SERVER_NAME: &str = "devloop";

#[derive(Clone)]
struct AppState {
    reloads: broadcast::Sender<String>,
    shutdown: CancellationToken,
}

#[derive(Debug)]
pub struct LivereloadServer {
    reloads: broadcast::Sender<String>,
    addr: SocketAddr,
}

impl LivereloadServer {
    /// Bind `0.0.0.0:<port>` and serve until the session ends.
    pub async fn start(port: u16, session: &Session) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding livereload port {port}"))?;
        let addr = listener.local_addr()?;

        let (reloads, _) = broadcast::channel(16);
        let shutdown = session.token();
        let state = AppState {
            reloads: reloads.clone(),
            shutdown: shutdown.clone(),
        };
        let app = Router::new()
            .route("/livereload", get(upgrade))
            .with_state(state);

        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                error!(error = %err, "livereload server failed");
            }
        });

        info!(%addr, "livereload server listening");
        Ok(Arc::new(Self { reloads, addr }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client_count(&self) -> usize {
        self.reloads.receiver_count()
    }
}

impl ReloadNotifier for LivereloadServer {
    fn notify_reload(&self, path: &str) {
        match self.reloads.send(reload_message(path)) {
            Ok(clients) => info!(clients, path, "reload pushed"),
            Err(_) => debug!(path, "no livereload clients connected"),
        }
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let reloads = state.reloads.subscribe();
    ws.on_upgrade(move |socket| serve_client(socket, reloads, state.shutdown))
}

async fn serve_client(
    mut socket: WebSocket,
    mut reloads: broadcast::Receiver<String>,
    shutdown: CancellationToken,
) {
    debug!("livereload client connected");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if is_hello(text.as_str())
                        && socket.send(Message::Text(hello_message().into())).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            reload = reloads.recv() => match reload {
                Ok(message) => {
                    if socket.send(Message::Text(message.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "livereload client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("livereload client disconnected");
}

#[derive(Deserialize)]
struct ClientCommand {
    command: String,
}

/// Whether a client frame is the protocol handshake.
pub fn is_hello(frame: &str) -> bool {
    serde_json::from_str::<ClientCommand>(frame)
        .map(|c| c.command == "hello")
        .unwrap_or(false)
}

pub fn hello_message() -> String {
    json!({
        "command": "hello",
        "protocols": [PROTOCOL],
        "serverName": SERVER_NAME,
    })
    .to_string()
}

pub fn reload_message(path: &str) -> String {
    json!({
        "command": "reload",
        "path": path,
        "liveCSS": true,
    })
    .to_string()
}
