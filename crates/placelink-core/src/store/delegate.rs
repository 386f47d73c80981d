//! Write delegation to a privileged peer.
//!
//! An actor without write permission wraps each write in a
//! [`DelegateMessage::WriteRequest`] addressed by a fresh request id. The
//! privileged peer performs the write and answers with a
//! [`DelegateMessage::WriteResponse`]. A request that gets no answer within
//! the timeout resolves to an empty result.

use super::{DocumentStore, ObjectUpdate, UpdateContext};
use crate::config::EngineConfig;
use crate::placeables::{Kind, ObjectId, ObjectKey, Placeable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Default time to wait for a privileged peer.
pub const DEFAULT_DELEGATE_TIMEOUT: Duration = Duration::from_secs(4);

/// A write performed on behalf of another actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DelegatedWrite {
    Create {
        documents: Vec<Placeable>,
        context: UpdateContext,
    },
    Update {
        kind: Kind,
        updates: Vec<ObjectUpdate>,
        context: UpdateContext,
    },
    Delete {
        kind: Kind,
        ids: Vec<ObjectId>,
        context: UpdateContext,
    },
}

/// Messages exchanged with the privileged peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DelegateMessage {
    WriteRequest {
        request_id: String,
        write: DelegatedWrite,
    },
    WriteResponse {
        request_id: String,
        keys: Vec<ObjectKey>,
    },
}

impl DelegateMessage {
    pub fn request_id(&self) -> &str {
        match self {
            DelegateMessage::WriteRequest { request_id, .. }
            | DelegateMessage::WriteResponse { request_id, .. } => request_id,
        }
    }
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Vec<ObjectKey>>>>>;

/// Removes a pending request when the waiting future finishes or is dropped.
struct PendingGuard<'a> {
    pending: &'a Pending,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.request_id);
    }
}

/// Client side of the delegation exchange.
///
/// Outgoing requests are pushed onto a channel the transport drains;
/// responses come back through [`DelegateChannel::handle_message`].
#[derive(Clone)]
pub struct DelegateChannel {
    outbound: mpsc::UnboundedSender<DelegateMessage>,
    pending: Pending,
    timeout: Duration,
}

impl DelegateChannel {
    /// Create a channel and the receiver its transport should drain.
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<DelegateMessage>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let channel = Self {
            outbound,
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        };
        (channel, rx)
    }

    /// Channel waiting `config.delegate_timeout_ms` for each answer.
    pub fn from_config(config: &EngineConfig) -> (Self, mpsc::UnboundedReceiver<DelegateMessage>) {
        Self::new(config.delegate_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of requests still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Send a write to the privileged peer and wait for its answer.
    ///
    /// Resolves to an empty list on timeout or when the transport is gone.
    pub async fn request(&self, write: DelegatedWrite) -> Vec<ObjectKey> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id.clone(), tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id: &request_id,
        };

        let message = DelegateMessage::WriteRequest {
            request_id: request_id.clone(),
            write,
        };
        if self.outbound.send(message).is_err() {
            log::warn!("Delegate transport closed, dropping request {}", request_id);
            return Vec::new();
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(keys)) => keys,
            Ok(Err(_)) => {
                log::warn!("Delegated write {} was abandoned", request_id);
                Vec::new()
            }
            Err(_) => {
                log::warn!(
                    "Delegated write {} timed out after {:?}",
                    request_id,
                    self.timeout
                );
                Vec::new()
            }
        }
    }

    /// Resolve a pending request from an incoming response.
    ///
    /// Returns `false` for requests and for responses nobody waits for.
    pub fn handle_message(&self, message: DelegateMessage) -> bool {
        let DelegateMessage::WriteResponse { request_id, keys } = message else {
            return false;
        };
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id);
        match sender {
            Some(sender) => sender.send(keys).is_ok(),
            None => {
                log::debug!("Ignoring response for unknown request {}", request_id);
                false
            }
        }
    }
}

/// Privileged side: perform a delegated write and build the response.
///
/// Failed writes answer with an empty key list so the requester does not
/// wait for its timeout.
pub async fn serve(store: &dyn DocumentStore, message: DelegateMessage) -> Option<DelegateMessage> {
    let DelegateMessage::WriteRequest { request_id, write } = message else {
        return None;
    };
    let result = match write {
        DelegatedWrite::Create { documents, context } => {
            store.create_documents(documents, context).await
        }
        DelegatedWrite::Update {
            kind,
            updates,
            context,
        } => store.update_documents(kind, updates, context).await,
        DelegatedWrite::Delete { kind, ids, context } => store
            .delete_documents(kind, ids, context)
            .await
            .map(|docs| docs.iter().map(Placeable::key).collect()),
    };
    let keys = result.unwrap_or_else(|e| {
        log::warn!("Delegated write {} failed: {}", request_id, e);
        Vec::new()
    });
    Some(DelegateMessage::WriteResponse { request_id, keys })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let message = DelegateMessage::WriteResponse {
            request_id: "r1".into(),
            keys: vec![ObjectKey::new(Kind::Wall, "w1")],
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "write_response");
        assert_eq!(json["keys"][0]["kind"], "Wall");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_empty() {
        let (channel, mut rx) = DelegateChannel::new(DEFAULT_DELEGATE_TIMEOUT);
        let keys = channel
            .request(DelegatedWrite::Delete {
                kind: Kind::Token,
                ids: vec!["t1".into()],
                context: UpdateContext::default(),
            })
            .await;
        assert!(keys.is_empty());
        assert_eq!(channel.pending_count(), 0);
        assert!(matches!(rx.recv().await, Some(DelegateMessage::WriteRequest { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_from_config() {
        let config = EngineConfig {
            delegate_timeout_ms: 50,
            ..EngineConfig::default()
        };
        let (channel, _rx) = DelegateChannel::from_config(&config);
        assert_eq!(channel.timeout(), Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let keys = channel
            .request(DelegatedWrite::Delete {
                kind: Kind::Token,
                ids: vec!["t1".into()],
                context: UpdateContext::default(),
            })
            .await;
        assert!(keys.is_empty());
        assert!(started.elapsed() < DEFAULT_DELEGATE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_response_resolves_request() {
        let (channel, mut rx) = DelegateChannel::new(DEFAULT_DELEGATE_TIMEOUT);
        let responder = channel.clone();
        let handle = tokio::spawn(async move {
            let Some(request) = rx.recv().await else {
                return false;
            };
            responder.handle_message(DelegateMessage::WriteResponse {
                request_id: request.request_id().to_string(),
                keys: vec![ObjectKey::new(Kind::Token, "t1")],
            })
        });

        let keys = channel
            .request(DelegatedWrite::Delete {
                kind: Kind::Token,
                ids: vec!["t1".into()],
                context: UpdateContext::default(),
            })
            .await;
        assert_eq!(keys, vec![ObjectKey::new(Kind::Token, "t1")]);
        assert!(handle.await.unwrap());
    }
}
