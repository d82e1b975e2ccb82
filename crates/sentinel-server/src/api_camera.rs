//! Camera-frame WebSocket endpoint and the pluggable detector seam.
//!
//! Web clients stream frames over `/ws/camera` and receive detections
//! back. Detection itself is an external collaborator: the server ships
//! with [`NoopDetector`], which reports no detections; a real model is
//! plugged in by swapping the `detector` handle in [`crate::AppState`].

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use sentinel_types::Detection;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Produces zero or more detections for one camera frame.
pub trait FrameDetector: Send + Sync {
    /// `frame_data` is a base64-encoded JPEG; `sensitivity` is the
    /// client-chosen confidence threshold in `0.0..=1.0`.
    fn detect(&self, frame_data: &str, sensitivity: f32) -> Vec<Detection>;
}

/// Placeholder detector: always returns an empty result set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDetector;

impl FrameDetector for NoopDetector {
    fn detect(&self, _frame_data: &str, _sensitivity: f32) -> Vec<Detection> {
        Vec::new()
    }
}

/// Incoming camera channel message types.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum CameraMessage {
    #[serde(rename = "frame")]
    Frame {
        #[serde(default)]
        data: String,
        #[serde(default)]
        timestamp: i64,
        #[serde(default = "default_sensitivity")]
        sensitivity: f32,
    },
}

fn default_sensitivity() -> f32 {
    0.5
}

/// Outgoing camera channel message types.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum CameraResponse {
    #[serde(rename = "detections")]
    Detections {
        detections: Vec<Detection>,
        timestamp: i64,
    },
}

/// WebSocket handler: `GET /ws/camera`.
pub async fn camera_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_camera_socket(socket, state))
}

async fn handle_camera_socket(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("camera channel connected");

    while let Some(Ok(msg)) = socket.next().await {
        match msg {
            AxumMessage::Text(text) => {
                let Ok(incoming) = serde_json::from_str::<CameraMessage>(text.as_str()) else {
                    tracing::debug!("ignoring unrecognized camera message");
                    continue;
                };

                let CameraMessage::Frame {
                    data,
                    timestamp,
                    sensitivity,
                } = incoming;

                let detections = state.detector.detect(&data, sensitivity);
                let response = CameraResponse::Detections {
                    detections,
                    timestamp,
                };

                match serde_json::to_string(&response) {
                    Ok(json) => {
                        if socket.send(AxumMessage::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize detections: {}", e);
                    }
                }
            }
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!("camera channel disconnected");
}
