use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::web::{AppError, AppState};

/// Frames queued per session before senders start waiting.
const AGENT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
pub struct AgentConnectQuery {
    #[serde(default)]
    secret: String,
}

/// Axum handler for the agent command channel. The node secret is checked before the
/// upgrade so unknown agents get a plain 401.
pub async fn ws_agent_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<AgentConnectQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let node = match app_state.repo.find_node_by_secret(&query.secret).await {
        Ok(Some(node)) => node,
        Ok(None) => {
            warn!("Agent connection rejected: unknown secret.");
            return AppError::Unauthorized("unknown node secret".to_string()).into_response();
        }
        Err(e) => return AppError::from(e).into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    info!(node_id = node.id, "New WebSocket agent connection request.");
    ws.on_upgrade(move |socket| handle_socket(socket, node.id, app_state))
}

/// Runs one agent session until the agent goes away.
async fn handle_socket(socket: WebSocket, node_id: i64, app_state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(AGENT_QUEUE_CAPACITY);
    let connection_id = app_state.connected_agents.register(node_id, tx);
    info!(node_id, %connection_id, "Agent session registered.");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(frame.into())).await {
                warn!(node_id, error = %e, "Failed to write to agent socket.");
                break;
            }
        }
    });

    let reconciler = app_state.reconciler.clone();
    tokio::spawn(async move {
        if let Err(e) = reconciler.sync_node(node_id).await {
            warn!(node_id, error = %e, "On-connect observer sync failed.");
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!(node_id, message = %text.as_str(), "Message from agent.");
            }
            Ok(Message::Close(_)) => {
                info!(node_id, "WebSocket connection closed by agent.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(node_id, error = %e, "WebSocket receive error.");
                break;
            }
        }
    }

    if app_state.connected_agents.unregister(node_id, connection_id) {
        info!(node_id, %connection_id, "Agent session unregistered.");
    }
    writer.abort();
}
