//! Placelink WebSocket Relay Server
//!
//! Routes delegated writes between the peers of a scene. A peer without
//! write permission sends its writes here; the relay forwards them to the
//! scene's privileged peer and routes the answers back.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "scene": "scene-id", "privileged": true }
//! { "type": "delegate", "message": { "type": "write_request", "request_id": "...", "write": { "op": "update", ... } } }
//! { "type": "delegate", "message": { "type": "write_response", "request_id": "...", "keys": [] } }
//! ```

mod relay;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use relay::{ClientMessage, Relay, ServerMessage};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_PORT: u16 = 3030;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "placelink_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(Relay::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = listen_addr();
    info!("Placelink relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

/// Address from `PLACELINK_ADDR`, or `0.0.0.0:3030`.
fn listen_addr() -> SocketAddr {
    let fallback = || SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT));
    match std::env::var("PLACELINK_ADDR") {
        Ok(value) => value.parse().unwrap_or_else(|e| {
            warn!("Ignoring PLACELINK_ADDR={}: {}", value, e);
            fallback()
        }),
        Err(_) => fallback(),
    }
}

/// Index page
async fn index() -> &'static str {
    "Placelink Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<Relay>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Cannot encode message: {}", e);
            true
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<Relay>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut current_scene: Option<String> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Join { scene, privileged }) => {
                                if let Some(ref old_scene) = current_scene {
                                    state.leave(old_scene, &peer_id);
                                }
                                let privileged_present =
                                    state.join(&scene, &peer_id, privileged, tx.clone());
                                current_scene = Some(scene.clone());

                                let joined = ServerMessage::Joined {
                                    peer_id: peer_id.clone(),
                                    peer_count: state.peer_count(&scene),
                                    scene,
                                    privileged_present,
                                };
                                if !send_json(&mut sender, &joined).await {
                                    break;
                                }
                            }
                            Ok(ClientMessage::Leave) => {
                                if let Some(ref scene) = current_scene {
                                    state.leave(scene, &peer_id);
                                }
                                current_scene = None;
                            }
                            Ok(ClientMessage::Delegate { message }) => match current_scene {
                                Some(ref scene) => state.route(scene, &peer_id, message),
                                None => {
                                    let err = ServerMessage::Error {
                                        message: "Join a scene before delegating writes".into(),
                                    };
                                    if !send_json(&mut sender, &err).await {
                                        break;
                                    }
                                }
                            },
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                if !send_json(&mut sender, &err).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Messages routed to this peer
            Some(server_msg) = rx.recv() => {
                if !send_json(&mut sender, &server_msg).await {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(ref scene) = current_scene {
        state.leave(scene, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}
