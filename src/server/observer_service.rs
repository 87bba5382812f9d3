use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::DbErr;
use tracing::{debug, error, info, warn};

use crate::db::FlowRepository;
use crate::db::entities::node;
use crate::db::enums::{EntityStatus, TunnelType};
use crate::server::command_dispatcher::NodeCommandDispatcher;
use crate::server::commands::{
    AgentCommand, ForwardTarget, ForwarderSpec, ObserverPatch, ObserverPlugin, ObserverSpec,
    ServiceDescriptor, ServiceMetadata, TypeSpec,
};

pub const DEFAULT_OBSERVER_INTERVAL_SECS: u64 = 60;

/// Turns a configured interval into a tick period; non-positive values fall back to the default.
pub fn normalize_interval(secs: i64) -> Duration {
    match u64::try_from(secs) {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => Duration::from_secs(DEFAULT_OBSERVER_INTERVAL_SECS),
    }
}

pub fn observer_name(node_id: i64) -> String {
    format!("flow_observer_{node_id}")
}

/// Keeps every agent's entry services wired to the flow observer that posts back to
/// `/flow/upload`.
pub struct ObserverReconciler {
    repo: Arc<dyn FlowRepository>,
    dispatcher: Arc<NodeCommandDispatcher>,
    panel_addr: Option<String>,
}

impl ObserverReconciler {
    pub fn new(
        repo: Arc<dyn FlowRepository>,
        dispatcher: Arc<NodeCommandDispatcher>,
        panel_addr: Option<String>,
    ) -> Self {
        let panel_addr = panel_addr
            .map(|addr| addr.trim().trim_end_matches('/').to_string())
            .filter(|addr| !addr.is_empty());
        Self {
            repo,
            dispatcher,
            panel_addr,
        }
    }

    /// The shared observer a node's services report through, if one can be built.
    pub fn observer_for_node(&self, node: &node::Model) -> Option<ObserverSpec> {
        let panel_addr = self.panel_addr.as_deref()?;
        if node.secret.is_empty() {
            return None;
        }
        Some(ObserverSpec {
            name: observer_name(node.id),
            plugin: ObserverPlugin {
                kind: "http".to_string(),
                addr: format!(
                    "{panel_addr}/flow/upload?secret={}",
                    urlencoding::encode(&node.secret)
                ),
            },
        })
    }

    /// Port-forward entry services that should be running on `node_id`, ordered by forward id.
    pub async fn desired_services(
        &self,
        node_id: i64,
        observer: &ObserverSpec,
    ) -> Result<Vec<ServiceDescriptor>, DbErr> {
        let entries = self
            .repo
            .list_entry_forwards(node_id, TunnelType::PortForward)
            .await?;

        let mut iface_maps: HashMap<i64, HashMap<i64, String>> = HashMap::new();
        let mut services = Vec::with_capacity(entries.len());
        for (fwd, tunnel) in entries {
            if fwd.status != EntityStatus::Active {
                continue;
            }
            let Some(port) = fwd.in_port.filter(|p| *p > 0) else {
                continue;
            };

            if !iface_maps.contains_key(&tunnel.id) {
                let map = self.repo.tunnel_iface_map(tunnel.id).await.unwrap_or_else(|e| {
                    warn!(tunnel_id = tunnel.id, error = %e, "Failed to read tunnel interface mapping.");
                    HashMap::new()
                });
                iface_maps.insert(tunnel.id, map);
            }
            let metadata = iface_maps
                .get(&tunnel.id)
                .and_then(|map| map.get(&node_id))
                .filter(|ip| !ip.is_empty())
                .map(|ip| ServiceMetadata {
                    interface: ip.clone(),
                });

            let targets = fwd
                .remote_addr
                .split(',')
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .enumerate()
                .map(|(i, addr)| ForwardTarget {
                    name: format!("target-{i}"),
                    addr: addr.to_string(),
                })
                .collect();

            services.push(ServiceDescriptor {
                name: fwd.service_name(),
                addr: format!(":{port}"),
                handler: TypeSpec::new("tcp"),
                listener: TypeSpec::new("tcp"),
                forwarder: ForwarderSpec { nodes: targets },
                observer: observer.name.clone(),
                observers: vec![observer.clone()],
                metadata,
            });
        }
        Ok(services)
    }

    /// Observer-only patches for tunnel-forward entry services whose ingress is `node_id`.
    pub async fn build_tunnel_entry_observer_patches(
        &self,
        node_id: i64,
    ) -> Result<Vec<ObserverPatch>, DbErr> {
        let Some(node) = self.repo.find_node(node_id).await? else {
            return Ok(Vec::new());
        };
        let Some(observer) = self.observer_for_node(&node) else {
            return Ok(Vec::new());
        };
        let entries = self
            .repo
            .list_entry_forwards(node_id, TunnelType::TunnelForward)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(fwd, _)| ObserverPatch {
                name: fwd.service_name(),
                observer: observer.name.clone(),
                observers: vec![observer.clone()],
            })
            .collect())
    }

    /// Pushes the full entry-service list to one node. Returns whether a command was sent.
    async fn push_entry_services(&self, node: &node::Model) -> Result<bool, DbErr> {
        let Some(observer) = self.observer_for_node(node) else {
            warn!(node_id = node.id, "No observer for node, panel address or secret missing.");
            return Ok(false);
        };
        let services = self.desired_services(node.id, &observer).await?;
        if services.is_empty() {
            debug!(node_id = node.id, "No entry services for node.");
            return Ok(false);
        }
        debug!(node_id = node.id, count = services.len(), "Pushing entry services.");
        Ok(self
            .dispatcher
            .send_best_effort(node.id, AgentCommand::AddService(services))
            .await)
    }

    /// One reconciliation pass over every node. Returns how many nodes were sent an update.
    pub async fn run_once(&self) -> usize {
        let nodes = match self.repo.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(error = %e, "Failed to list nodes for observer reconciliation.");
                return 0;
            }
        };

        let mut pushed = 0;
        for node in &nodes {
            match self.push_entry_services(node).await {
                Ok(true) => pushed += 1,
                Ok(false) => {}
                Err(e) => error!(node_id = node.id, error = %e, "Observer reconciliation failed for node."),
            }
        }
        debug!(nodes = nodes.len(), pushed, "Observer reconciliation pass finished.");
        pushed
    }

    /// Brings a freshly connected node up to date: entry services first, then observer
    /// patches for the tunnel entries it hosts.
    pub async fn sync_node(&self, node_id: i64) -> Result<(), DbErr> {
        let Some(node) = self.repo.find_node(node_id).await? else {
            warn!(node_id, "Cannot sync unknown node.");
            return Ok(());
        };
        self.push_entry_services(&node).await?;

        let patches = self.build_tunnel_entry_observer_patches(node_id).await?;
        if !patches.is_empty() {
            self.dispatcher
                .send_best_effort(node_id, AgentCommand::UpdateService(patches))
                .await;
        }
        Ok(())
    }

    /// Reconciles immediately, then once per `period`, forever.
    pub async fn run(self: Arc<Self>, period: Duration) {
        info!(interval_secs = period.as_secs(), "Observer reconciler started.");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}
