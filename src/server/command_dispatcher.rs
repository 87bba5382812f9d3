use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::DbErr;
use tracing::{info, warn};

use crate::db::FlowRepository;
use crate::db::entities::{forward, tunnel};
use crate::db::enums::EntityStatus;
use crate::server::agent_state::NodeCommandSender;
use crate::server::commands::AgentCommand;

#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("Agent not connected for node ID: {0}")]
    AgentNotConnected(i64),
    #[error("Failed to send command to node ID {0}: {1}")]
    SendFailed(i64, String),
    #[error("Timed out sending command to node ID: {0}")]
    Timeout(i64),
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of one pause cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseSummary {
    pub forwards_paused: usize,
    pub commands_sent: usize,
    pub commands_failed: usize,
}

/// Pauses forwards in the database and tells the owning agents to stop their services.
///
/// Delivery is best-effort: failures are logged and never undo the status change. The
/// next report or reconciliation pass is what heals a missed command.
#[derive(Clone)]
pub struct NodeCommandDispatcher {
    repo: Arc<dyn FlowRepository>,
    sender: Arc<dyn NodeCommandSender>,
}

impl NodeCommandDispatcher {
    pub fn new(repo: Arc<dyn FlowRepository>, sender: Arc<dyn NodeCommandSender>) -> Self {
        Self { repo, sender }
    }

    /// Pauses every forward owned by `user_id`.
    pub async fn pause_user_forwards(&self, user_id: i64) -> Result<PauseSummary, DbErr> {
        let forwards = self.repo.list_forwards_by_user(user_id).await?;
        let summary = self.pause_forwards(forwards).await;
        info!(user_id, ?summary, "Paused user forwards.");
        Ok(summary)
    }

    /// Pauses the forwards `user_id` runs over `tunnel_id`.
    pub async fn pause_user_tunnel_forwards(
        &self,
        user_id: i64,
        tunnel_id: i64,
    ) -> Result<PauseSummary, DbErr> {
        let forwards = self
            .repo
            .list_forwards_by_user_tunnel(user_id, tunnel_id)
            .await?;
        let summary = self.pause_forwards(forwards).await;
        info!(user_id, tunnel_id, ?summary, "Paused user tunnel forwards.");
        Ok(summary)
    }

    /// Sends a command and swallows the failure after logging it.
    pub async fn send_best_effort(&self, node_id: i64, command: AgentCommand) -> bool {
        let kind = command.kind();
        match self.sender.send_command(node_id, command).await {
            Ok(()) => true,
            Err(e) => {
                warn!(node_id, kind, error = %e, "Command delivery failed.");
                false
            }
        }
    }

    async fn pause_forwards(&self, forwards: Vec<forward::Model>) -> PauseSummary {
        let mut summary = PauseSummary::default();
        let mut tunnels: HashMap<i64, Option<tunnel::Model>> = HashMap::new();

        for fwd in forwards {
            match self.repo.set_forward_status(fwd.id, EntityStatus::Paused).await {
                Ok(_) => summary.forwards_paused += 1,
                Err(e) => {
                    warn!(forward_id = fwd.id, error = %e, "Failed to persist paused status.");
                }
            }

            let tunnel = match tunnels.get(&fwd.tunnel_id) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = self.repo.find_tunnel(fwd.tunnel_id).await.unwrap_or_else(|e| {
                        warn!(tunnel_id = fwd.tunnel_id, error = %e, "Tunnel lookup failed.");
                        None
                    });
                    tunnels.insert(fwd.tunnel_id, loaded.clone());
                    loaded
                }
            };
            let Some(tunnel) = tunnel else {
                warn!(forward_id = fwd.id, tunnel_id = fwd.tunnel_id, "No tunnel for forward, pause not sent.");
                continue;
            };

            let name = fwd.service_name();
            for node_id in tunnel.command_targets() {
                if self
                    .send_best_effort(node_id, AgentCommand::pause_service(name.clone()))
                    .await
                {
                    summary.commands_sent += 1;
                } else {
                    summary.commands_failed += 1;
                }
            }
        }
        summary
    }
}
