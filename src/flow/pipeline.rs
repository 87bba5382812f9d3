use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::db::FlowRepository;
use crate::db::enums::EntityStatus;
use crate::flow::FlowError;
use crate::flow::ledger::{FlowLedger, LedgerEntry};
use crate::flow::quota::{user_suspend_reason, user_tunnel_suspend_reason};
use crate::flow::report::{IgnoreReason, ParseOutcome, parse_report};
use crate::server::command_dispatcher::NodeCommandDispatcher;

/// What happened to one upload. The HTTP layer answers `ok` regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    UnknownSecret,
    Ignored(IgnoreReason),
    Applied {
        forward_id: i64,
        user_suspended: bool,
        user_tunnel_suspended: bool,
    },
}

/// Runs an upload through secret check, parsing, the ledger and quota enforcement.
#[derive(Clone)]
pub struct FlowIngestService {
    repo: Arc<dyn FlowRepository>,
    ledger: FlowLedger,
    dispatcher: Arc<NodeCommandDispatcher>,
}

impl FlowIngestService {
    pub fn new(repo: Arc<dyn FlowRepository>, dispatcher: Arc<NodeCommandDispatcher>) -> Self {
        Self {
            ledger: FlowLedger::new(repo.clone()),
            repo,
            dispatcher,
        }
    }

    pub async fn ingest(
        &self,
        secret: &str,
        query_id: Option<&str>,
        body: &[u8],
    ) -> Result<IngestOutcome, FlowError> {
        debug!(body = %String::from_utf8_lossy(body), query_id, "Flow report received.");

        if !self.repo.node_exists_by_secret(secret).await? {
            debug!("Flow report with unknown secret dropped.");
            return Ok(IngestOutcome::UnknownSecret);
        }

        let report = match parse_report(body, query_id) {
            ParseOutcome::Report(report) => report,
            ParseOutcome::Ignored(reason) => {
                debug!(?reason, "Flow report ignored.");
                return Ok(IngestOutcome::Ignored(reason));
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        let entry = self.ledger.apply(&report, now_ms).await?;
        info!(
            forward_id = entry.forward.id,
            user_id = entry.user_id,
            user_tunnel_id = entry.user_tunnel_id,
            in_bytes = entry.applied.in_bytes,
            out_bytes = entry.applied.out_bytes,
            format = ?report.format,
            "Flow applied."
        );

        let user_suspended = self.enforce_user(&entry, now_ms).await?;
        let user_tunnel_suspended = self.enforce_user_tunnel(&entry, now_ms).await?;

        Ok(IngestOutcome::Applied {
            forward_id: entry.forward.id,
            user_suspended,
            user_tunnel_suspended,
        })
    }

    async fn enforce_user(&self, entry: &LedgerEntry, now_ms: i64) -> Result<bool, FlowError> {
        let Some(user) = self.repo.find_user(entry.user_id).await? else {
            return Ok(false);
        };
        let Some(reason) = user_suspend_reason(&user, now_ms) else {
            return Ok(false);
        };

        warn!(user_id = user.id, ?reason, "Suspending user.");
        self.repo.set_user_status(user.id, EntityStatus::Paused).await?;
        self.dispatcher.pause_user_forwards(user.id).await?;
        Ok(true)
    }

    async fn enforce_user_tunnel(
        &self,
        entry: &LedgerEntry,
        now_ms: i64,
    ) -> Result<bool, FlowError> {
        let Some(user_tunnel_id) = entry.user_tunnel_id else {
            return Ok(false);
        };
        let user_tunnel = match self.repo.find_user_tunnel(user_tunnel_id).await {
            Ok(Some(ut)) => ut,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!(user_tunnel_id, error = %e, "User tunnel reload failed, skipping quota check.");
                return Ok(false);
            }
        };
        let Some(reason) = user_tunnel_suspend_reason(&user_tunnel, now_ms) else {
            return Ok(false);
        };

        warn!(
            user_tunnel_id,
            user_id = user_tunnel.user_id,
            tunnel_id = user_tunnel.tunnel_id,
            ?reason,
            "Suspending user tunnel."
        );
        self.repo
            .set_user_tunnel_status(user_tunnel.id, EntityStatus::Paused)
            .await?;
        self.dispatcher
            .pause_user_tunnel_forwards(user_tunnel.user_id, user_tunnel.tunnel_id)
            .await?;
        Ok(true)
    }
}
