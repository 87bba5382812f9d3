use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::server::command_dispatcher::DispatcherError;
use crate::server::commands::AgentCommand;

/// Outbound queue of a single agent session. The WebSocket writer drains it.
pub type AgentSender = mpsc::Sender<String>;

#[derive(Debug, Clone)]
pub struct AgentState {
    pub node_id: i64,
    pub connection_id: Uuid,
    pub sender: AgentSender,
}

/// Live agent sessions keyed by node id. A node has at most one session; a reconnect
/// replaces the previous one.
#[derive(Debug, Default)]
pub struct ConnectedAgents {
    agents: DashMap<i64, AgentState>,
}

impl ConnectedAgents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node_id: i64, sender: AgentSender) -> Uuid {
        let connection_id = Uuid::new_v4();
        let state = AgentState {
            node_id,
            connection_id,
            sender,
        };
        if self.agents.insert(node_id, state).is_some() {
            info!(node_id, "Agent reconnected, replacing previous session.");
        }
        connection_id
    }

    /// Removes the session only if it is still the one identified by `connection_id`.
    pub fn unregister(&self, node_id: i64, connection_id: Uuid) -> bool {
        self.agents
            .remove_if(&node_id, |_, state| state.connection_id == connection_id)
            .is_some()
    }

    pub fn find_by_node_id(&self, node_id: i64) -> Option<AgentState> {
        self.agents.get(&node_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// The single "send command to node" capability used by the dispatcher and the reconciler.
#[async_trait]
pub trait NodeCommandSender: Send + Sync {
    async fn send_command(&self, node_id: i64, command: AgentCommand)
        -> Result<(), DispatcherError>;
}

/// Delivers commands through the connected agent sessions, bounded by a timeout so a
/// stalled agent cannot hold up the caller.
#[derive(Clone)]
pub struct AgentCommandChannel {
    connected_agents: Arc<ConnectedAgents>,
    send_timeout: Duration,
}

impl AgentCommandChannel {
    pub fn new(connected_agents: Arc<ConnectedAgents>, send_timeout: Duration) -> Self {
        Self {
            connected_agents,
            send_timeout,
        }
    }
}

#[async_trait]
impl NodeCommandSender for AgentCommandChannel {
    async fn send_command(
        &self,
        node_id: i64,
        command: AgentCommand,
    ) -> Result<(), DispatcherError> {
        let sender = self
            .connected_agents
            .find_by_node_id(node_id)
            .map(|state| state.sender)
            .ok_or(DispatcherError::AgentNotConnected(node_id))?;

        let frame = command.to_frame()?;
        match tokio::time::timeout(self.send_timeout, sender.send(frame)).await {
            Ok(Ok(())) => {
                debug!(node_id, kind = command.kind(), "Command queued for agent.");
                Ok(())
            }
            Ok(Err(e)) => Err(DispatcherError::SendFailed(node_id, e.to_string())),
            Err(_) => Err(DispatcherError::Timeout(node_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_connected_agent() {
        let agents = ConnectedAgents::new();
        let (tx, mut rx) = mpsc::channel(4);
        agents.register(5, tx);
        let channel = AgentCommandChannel::new(agents.clone(), Duration::from_millis(100));

        channel
            .send_command(5, AgentCommand::pause_service("1_2_3".to_string()))
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "PauseService");
    }

    #[tokio::test]
    async fn test_send_to_unknown_node() {
        let channel = AgentCommandChannel::new(ConnectedAgents::new(), Duration::from_millis(100));
        let err = channel
            .send_command(9, AgentCommand::pause_service("x".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::AgentNotConnected(9)));
    }

    #[tokio::test]
    async fn test_send_times_out_on_full_queue() {
        let agents = ConnectedAgents::new();
        let (tx, _rx) = mpsc::channel(1);
        agents.register(5, tx);
        let channel = AgentCommandChannel::new(agents, Duration::from_millis(20));

        channel
            .send_command(5, AgentCommand::pause_service("a".to_string()))
            .await
            .unwrap();
        let err = channel
            .send_command(5, AgentCommand::pause_service("b".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::Timeout(5)));
    }

    #[tokio::test]
    async fn test_closed_session_reports_send_failure() {
        let agents = ConnectedAgents::new();
        let (tx, rx) = mpsc::channel(1);
        agents.register(5, tx);
        drop(rx);
        let channel = AgentCommandChannel::new(agents, Duration::from_millis(20));
        let err = channel
            .send_command(5, AgentCommand::pause_service("a".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::SendFailed(5, _)));
    }

    #[test]
    fn test_unregister_only_removes_matching_session() {
        let agents = ConnectedAgents::new();
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);
        let first = agents.register(5, tx1);
        let second = agents.register(5, tx2);

        assert!(!agents.unregister(5, first));
        assert_eq!(agents.len(), 1);
        assert!(agents.unregister(5, second));
        assert!(agents.is_empty());
    }
}
