//! Live-event WebSocket API and viewer connection management.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use sentinel_store::{EventRecord, EventStats};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::AppState;

/// Per-viewer outbound buffer. A viewer that falls this many messages
/// behind is considered dead and is pruned on the next broadcast.
pub const VIEWER_BUFFER: usize = 256;

/// The event shape pushed to dashboard viewers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventView {
    pub id: i64,
    pub event_type: String,
    pub timestamp: i64,
    pub employee_name: Option<String>,
    pub license_plate: Option<String>,
    pub duration: i64,
}

impl EventView {
    /// Builds the viewer-facing projection of a persisted event, joining
    /// in the employee display name resolved at ingestion time.
    pub fn from_record(record: &EventRecord, employee_name: Option<String>) -> Self {
        Self {
            id: record.id,
            event_type: record.event_type.clone(),
            timestamp: record.timestamp,
            employee_name,
            license_plate: record.license_plate.clone(),
            duration: record.duration,
        }
    }
}

/// Outgoing stream message wrapper.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamMessage {
    #[serde(rename = "new_event")]
    NewEvent {
        event: EventView,
        #[serde(skip_serializing_if = "Option::is_none")]
        stats: Option<EventStats>,
    },
}

/// Type alias for the viewer map to satisfy clippy complexity checks.
type ViewerMap = HashMap<Uuid, mpsc::Sender<String>>;

/// Maintains the set of live dashboard viewer connections.
///
/// Membership mutation (register, unregister, post-broadcast pruning) is
/// serialized by a single `RwLock`. A broadcast snapshots the members
/// under the read lock and delivers outside it, so slow delivery never
/// blocks new registrations.
#[derive(Clone, Default)]
pub struct ViewerRegistry {
    viewers: Arc<RwLock<ViewerMap>>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection and returns its registry id.
    pub async fn register(&self, sender: mpsc::Sender<String>) -> Uuid {
        let viewer_id = Uuid::new_v4();
        let mut viewers = self.viewers.write().await;
        viewers.insert(viewer_id, sender);
        tracing::info!(viewer = %viewer_id, total = viewers.len(), "viewer connected");
        viewer_id
    }

    /// Removes a connection. Idempotent.
    pub async fn unregister(&self, viewer_id: Uuid) {
        let mut viewers = self.viewers.write().await;
        if viewers.remove(&viewer_id).is_some() {
            tracing::info!(viewer = %viewer_id, total = viewers.len(), "viewer disconnected");
        }
    }

    /// Number of live viewer connections.
    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    /// Delivers an already-serialized message to every live viewer.
    ///
    /// Works on a snapshot of the member set; every viewer whose channel
    /// rejects the message (buffer full or closed) is collected during
    /// the sweep and removed afterwards, so iteration never observes its
    /// own removals and one dead viewer cannot affect delivery to the
    /// rest. No retry: a pruned viewer must reconnect.
    pub async fn broadcast(&self, message_json: String) {
        let snapshot: Vec<(Uuid, mpsc::Sender<String>)> = {
            let viewers = self.viewers.read().await;
            if viewers.is_empty() {
                return;
            }
            viewers
                .iter()
                .map(|(id, sender)| (*id, sender.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (viewer_id, sender) in snapshot {
            if let Err(e) = sender.try_send(message_json.clone()) {
                tracing::warn!(
                    viewer = %viewer_id,
                    "dropping viewer after failed delivery: {}",
                    e
                );
                dead.push(viewer_id);
            }
        }

        if !dead.is_empty() {
            let mut viewers = self.viewers.write().await;
            for viewer_id in dead {
                viewers.remove(&viewer_id);
            }
            tracing::info!(total = viewers.len(), "pruned dead viewers after broadcast");
        }
    }

    /// Serializes a `new_event` message once and broadcasts it.
    pub async fn broadcast_event(&self, event: EventView, stats: Option<EventStats>) {
        let message = StreamMessage::NewEvent { event, stats };
        match serde_json::to_string(&message) {
            Ok(json) => self.broadcast(json).await,
            Err(e) => {
                tracing::error!("failed to serialize stream message: {}", e);
            }
        }
    }
}

/// WebSocket handler: `GET /ws`.
///
/// Viewers receive server-pushed `new_event` messages; anything a viewer
/// sends is treated as keep-alive and ignored.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles one viewer connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded channel per session: a consumer that cannot keep up fills
    // its buffer and is pruned by the next broadcast instead of growing
    // memory without bound.
    let (tx, mut rx) = mpsc::channel::<String>(VIEWER_BUFFER);

    let viewer_id = state.viewers.register(tx).await;

    // Forward queued frames to the socket. The socket write is the only
    // place per-viewer I/O can stall, and it stalls only this task.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => {
                tracing::debug!(viewer = %viewer_id, "ignoring viewer message: {}", text.as_str());
            }
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    state.viewers.unregister(viewer_id).await;
    send_task.abort();
}
