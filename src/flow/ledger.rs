use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::FlowRepository;
use crate::db::entities::forward;
use crate::db::enums::FlowMode;
use crate::flow::FlowError;
use crate::flow::report::{FlowReport, UserTunnelTarget};

/// Byte increments for one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowDelta {
    pub in_bytes: i64,
    pub out_bytes: i64,
}

impl FlowDelta {
    pub fn new(in_bytes: i64, out_bytes: i64) -> Self {
        Self { in_bytes, out_bytes }
    }

    /// Applies the tunnel's accounting convention. Single-direction tunnels book
    /// everything as outbound traffic.
    pub fn for_mode(self, mode: FlowMode) -> Self {
        match mode {
            FlowMode::SingleDirection => Self {
                in_bytes: 0,
                out_bytes: self.in_bytes.saturating_add(self.out_bytes),
            },
            FlowMode::Bidirectional => self,
        }
    }
}

/// What the ledger touched for one report, handed to quota enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub forward: forward::Model,
    pub user_id: i64,
    pub user_tunnel_id: Option<i64>,
    pub applied: FlowDelta,
}

#[derive(Clone)]
pub struct FlowLedger {
    repo: Arc<dyn FlowRepository>,
}

impl FlowLedger {
    pub fn new(repo: Arc<dyn FlowRepository>) -> Self {
        Self { repo }
    }

    /// Books a report against its forward, the charged user and, when one applies, the
    /// user-tunnel association. A missing forward aborts before anything is written.
    pub async fn apply(&self, report: &FlowReport, now_ms: i64) -> Result<LedgerEntry, FlowError> {
        let forward = self
            .repo
            .find_forward(report.forward_id)
            .await?
            .ok_or(FlowError::ForwardNotFound(report.forward_id))?;

        let mode = match self.repo.find_tunnel(forward.tunnel_id).await {
            Ok(Some(tunnel)) => tunnel.flow,
            Ok(None) => {
                debug!(tunnel_id = forward.tunnel_id, "Tunnel not found, using default flow mode.");
                FlowMode::default()
            }
            Err(e) => {
                warn!(tunnel_id = forward.tunnel_id, error = %e, "Tunnel lookup failed, using default flow mode.");
                FlowMode::default()
            }
        };
        let applied = FlowDelta::new(report.in_bytes, report.out_bytes).for_mode(mode);

        self.repo
            .add_forward_flow(forward.id, applied.in_bytes, applied.out_bytes, now_ms)
            .await?;

        let user_id = report.user_id.unwrap_or(forward.user_id);
        let user_rows = self
            .repo
            .add_user_flow(user_id, applied.in_bytes, applied.out_bytes, now_ms)
            .await?;
        if user_rows == 0 {
            debug!(user_id, forward_id = forward.id, "No user row to charge.");
        }

        let user_tunnel_id = match report.user_tunnel {
            UserTunnelTarget::ById(id) => Some(id),
            UserTunnelTarget::Skip => None,
            UserTunnelTarget::ByScope => match self
                .repo
                .find_user_tunnel_by_scope(forward.user_id, forward.tunnel_id)
                .await
            {
                Ok(found) => found.map(|ut| ut.id),
                Err(e) => {
                    warn!(
                        user_id = forward.user_id,
                        tunnel_id = forward.tunnel_id,
                        error = %e,
                        "User tunnel lookup failed, skipping its counters."
                    );
                    None
                }
            },
        };
        if let Some(id) = user_tunnel_id {
            self.repo
                .add_user_tunnel_flow(id, applied.in_bytes, applied.out_bytes)
                .await?;
        }

        Ok(LedgerEntry {
            forward,
            user_id,
            user_tunnel_id,
            applied,
        })
    }
}
