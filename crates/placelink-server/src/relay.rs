//! Scene membership and delegate routing.

use dashmap::DashMap;
use placelink_core::store::DelegateMessage;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A message sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a scene. A privileged peer performs writes for the others.
    Join {
        scene: String,
        #[serde(default)]
        privileged: bool,
    },
    /// Leave current scene
    Leave,
    /// Delegated write request or response
    Delegate { message: DelegateMessage },
}

/// A message sent to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm scene join
    Joined {
        peer_id: String,
        scene: String,
        peer_count: usize,
        privileged_present: bool,
    },
    /// Delegated write request or response routed from another peer
    Delegate { message: DelegateMessage },
    /// Error message
    Error { message: String },
}

pub type PeerSender = mpsc::UnboundedSender<ServerMessage>;

struct Peer {
    id: String,
    privileged: bool,
    tx: PeerSender,
}

/// Peers of one scene, in join order.
#[derive(Default)]
struct Scene {
    peers: Vec<Peer>,
}

impl Scene {
    fn peer(&self, peer_id: &str) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == peer_id)
    }

    /// The earliest joined privileged peer other than `except`.
    fn writer(&self, except: &str) -> Option<&Peer> {
        self.peers.iter().find(|p| p.privileged && p.id != except)
    }
}

struct PendingRequest {
    scene: String,
    requester: String,
    writer: String,
}

/// Shared relay state
#[derive(Default)]
pub struct Relay {
    scenes: DashMap<String, Scene>,
    /// Request id to the peer waiting for the response
    pending: DashMap<String, PendingRequest>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer to a scene. Returns whether a privileged peer other than
    /// the joiner is present.
    pub fn join(&self, scene_id: &str, peer_id: &str, privileged: bool, tx: PeerSender) -> bool {
        let mut scene = self.scenes.entry(scene_id.to_string()).or_default();
        scene.peers.retain(|p| p.id != peer_id);
        scene.peers.push(Peer {
            id: peer_id.to_string(),
            privileged,
            tx,
        });
        info!(
            "Peer {} joined scene {} (privileged: {})",
            peer_id, scene_id, privileged
        );
        scene.writer(peer_id).is_some()
    }

    /// Remove a peer from a scene, dropping requests it sent or was
    /// answering. Requesters of dropped requests fall back to their timeout.
    pub fn leave(&self, scene_id: &str, peer_id: &str) {
        if let Some(mut scene) = self.scenes.get_mut(scene_id) {
            scene.peers.retain(|p| p.id != peer_id);
            if scene.peers.is_empty() {
                drop(scene);
                self.scenes.remove(scene_id);
            }
        }
        self.pending
            .retain(|_, request| request.requester != peer_id && request.writer != peer_id);
        info!("Peer {} left scene {}", peer_id, scene_id);
    }

    pub fn peer_count(&self, scene_id: &str) -> usize {
        self.scenes
            .get(scene_id)
            .map(|scene| scene.peers.len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Route a delegate message from `from` within `scene_id`.
    ///
    /// Requests go to the scene's privileged peer; when there is none the
    /// requester gets an empty response at once instead of waiting for its
    /// timeout. Responses go back to whoever sent the request, and only
    /// when they come from the peer the request was forwarded to.
    pub fn route(&self, scene_id: &str, from: &str, message: DelegateMessage) {
        match message {
            DelegateMessage::WriteRequest { .. } => self.route_request(scene_id, from, message),
            DelegateMessage::WriteResponse { .. } => self.route_response(from, message),
        }
    }

    fn route_request(&self, scene_id: &str, from: &str, message: DelegateMessage) {
        let request_id = message.request_id().to_string();
        let Some(scene) = self.scenes.get(scene_id) else {
            warn!("Request {} for unknown scene {}", request_id, scene_id);
            return;
        };

        let Some(writer) = scene.writer(from) else {
            debug!("No privileged peer in {}, answering {} empty", scene_id, request_id);
            if let Some(requester) = scene.peer(from) {
                let _ = requester.tx.send(ServerMessage::Delegate {
                    message: DelegateMessage::WriteResponse {
                        request_id,
                        keys: Vec::new(),
                    },
                });
            }
            return;
        };

        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                scene: scene_id.to_string(),
                requester: from.to_string(),
                writer: writer.id.clone(),
            },
        );
        if writer.tx.send(ServerMessage::Delegate { message }).is_err() {
            warn!("Privileged peer {} is gone, dropping {}", writer.id, request_id);
            self.pending.remove(&request_id);
        }
    }

    fn route_response(&self, from: &str, message: DelegateMessage) {
        let request_id = message.request_id();
        let Some((request_id, request)) = self
            .pending
            .remove_if(request_id, |_, request| request.writer == from)
        else {
            if self.pending.contains_key(request_id) {
                warn!("Peer {} answered request {} it was not sent", from, request_id);
            } else {
                warn!("Response to unknown request {}", request_id);
            }
            return;
        };
        let Some(scene) = self.scenes.get(&request.scene) else {
            return;
        };
        match scene.peer(&request.requester) {
            Some(requester) => {
                let _ = requester.tx.send(ServerMessage::Delegate { message });
            }
            None => debug!("Requester of {} already left", request_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placelink_core::placeables::Kind;
    use placelink_core::store::{DelegatedWrite, UpdateContext};
    use placelink_core::ObjectKey;

    fn peer() -> (PeerSender, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    fn request(id: &str) -> DelegateMessage {
        DelegateMessage::WriteRequest {
            request_id: id.to_string(),
            write: DelegatedWrite::Delete {
                kind: Kind::Wall,
                ids: vec!["w1".into()],
                context: UpdateContext::default(),
            },
        }
    }

    fn delegated(message: ServerMessage) -> DelegateMessage {
        match message {
            ServerMessage::Delegate { message } => message,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_request_and_response_round_trip() {
        let relay = Relay::new();
        let (gm_tx, mut gm_rx) = peer();
        let (player_tx, mut player_rx) = peer();
        assert!(!relay.join("s", "gm", true, gm_tx));
        assert!(relay.join("s", "player", false, player_tx));

        relay.route("s", "player", request("r1"));
        assert_eq!(delegated(gm_rx.try_recv().unwrap()), request("r1"));
        assert_eq!(relay.pending_count(), 1);

        let response = DelegateMessage::WriteResponse {
            request_id: "r1".into(),
            keys: vec![ObjectKey::new(Kind::Wall, "w1")],
        };
        relay.route("s", "gm", response.clone());
        assert_eq!(delegated(player_rx.try_recv().unwrap()), response);
        assert_eq!(relay.pending_count(), 0);
    }

    #[test]
    fn test_response_from_other_peer_is_ignored() {
        let relay = Relay::new();
        let (gm_tx, _gm_rx) = peer();
        let (player_tx, mut player_rx) = peer();
        let (other_tx, _other_rx) = peer();
        relay.join("s", "gm", true, gm_tx);
        relay.join("s", "player", false, player_tx);
        relay.join("s", "other", false, other_tx);
        relay.route("s", "player", request("r1"));

        let forged = DelegateMessage::WriteResponse {
            request_id: "r1".into(),
            keys: vec![ObjectKey::new(Kind::Wall, "w1")],
        };
        relay.route("s", "other", forged.clone());
        assert!(player_rx.try_recv().is_err());
        assert_eq!(relay.pending_count(), 1);

        relay.route("s", "gm", forged.clone());
        assert_eq!(delegated(player_rx.try_recv().unwrap()), forged);
        assert_eq!(relay.pending_count(), 0);
    }

    #[test]
    fn test_no_privileged_peer_answers_empty() {
        let relay = Relay::new();
        let (player_tx, mut player_rx) = peer();
        relay.join("s", "player", false, player_tx);

        relay.route("s", "player", request("r1"));

        let DelegateMessage::WriteResponse { request_id, keys } =
            delegated(player_rx.try_recv().unwrap())
        else {
            panic!("expected a response");
        };
        assert_eq!(request_id, "r1");
        assert!(keys.is_empty());
        assert_eq!(relay.pending_count(), 0);
    }

    #[test]
    fn test_leave_drops_pending_and_empty_scene() {
        let relay = Relay::new();
        let (gm_tx, _gm_rx) = peer();
        let (player_tx, _player_rx) = peer();
        relay.join("s", "gm", true, gm_tx);
        relay.join("s", "player", false, player_tx);
        relay.route("s", "player", request("r1"));

        relay.leave("s", "player");
        assert_eq!(relay.pending_count(), 0);
        relay.leave("s", "gm");
        assert_eq!(relay.peer_count("s"), 0);
    }

    #[test]
    fn test_client_message_wire_format() {
        let json = r#"{"type":"join","scene":"s1","privileged":true}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Join { privileged: true, .. }));

        let json = serde_json::to_value(ServerMessage::Delegate {
            message: request("r1"),
        })
        .unwrap();
        assert_eq!(json["type"], "delegate");
        assert_eq!(json["message"]["type"], "write_request");
        assert_eq!(json["message"]["write"]["op"], "delete");
    }
}
