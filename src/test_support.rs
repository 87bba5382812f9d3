//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use sea_orm::DbErr;

use crate::db::FlowRepository;
use crate::db::entities::{forward, node, tunnel, user, user_tunnel};
use crate::db::enums::{EntityStatus, FlowMode, TunnelType};
use crate::db::services::{parse_tunnel_iface_map, tunnel_iface_key};
use crate::server::agent_state::NodeCommandSender;
use crate::server::command_dispatcher::DispatcherError;
use crate::server::commands::AgentCommand;

pub fn node(id: i64, secret: &str) -> node::Model {
    node::Model {
        id,
        name: format!("node-{id}"),
        secret: secret.to_string(),
        ip: None,
        server_ip: None,
        status: Some(1),
        created_time: 0,
        updated_time: None,
    }
}

/// Tunnel with the topology implied by `out_node_id`.
pub fn tunnel(id: i64, in_node_id: i64, out_node_id: Option<i64>, flow: FlowMode) -> tunnel::Model {
    tunnel::Model {
        id,
        name: format!("tunnel-{id}"),
        in_node_id,
        out_node_id,
        tunnel_type: if out_node_id.is_some() {
            TunnelType::TunnelForward
        } else {
            TunnelType::PortForward
        },
        flow,
        protocol: None,
        status: EntityStatus::Active,
        created_time: 0,
        updated_time: None,
    }
}

pub fn user(id: i64, quota_gib: i64) -> user::Model {
    user::Model {
        id,
        username: format!("user-{id}"),
        flow: quota_gib,
        in_flow: 0,
        out_flow: 0,
        exp_time: None,
        status: Some(EntityStatus::Active),
        created_time: 0,
        updated_time: None,
    }
}

pub fn user_tunnel(id: i64, user_id: i64, tunnel_id: i64, quota_gib: i64) -> user_tunnel::Model {
    user_tunnel::Model {
        id,
        user_id,
        tunnel_id,
        flow: quota_gib,
        in_flow: 0,
        out_flow: 0,
        exp_time: None,
        status: EntityStatus::Active,
    }
}

pub fn forward(id: i64, user_id: i64, tunnel_id: i64) -> forward::Model {
    forward::Model {
        id,
        user_id,
        tunnel_id,
        name: format!("forward-{id}"),
        in_port: Some(10_000 + id as i32),
        remote_addr: "192.0.2.1:80".to_string(),
        in_flow: 0,
        out_flow: 0,
        status: EntityStatus::Active,
        created_time: 0,
        updated_time: None,
    }
}

#[derive(Default)]
struct Tables {
    nodes: DashMap<i64, node::Model>,
    tunnels: DashMap<i64, tunnel::Model>,
    forwards: DashMap<i64, forward::Model>,
    users: DashMap<i64, user::Model>,
    user_tunnels: DashMap<i64, user_tunnel::Model>,
    config: DashMap<String, String>,
}

/// Repository over shared in-memory tables. Clones see the same rows; increments happen
/// under the row's shard lock so concurrent updates never interleave.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&self, model: node::Model) {
        self.tables.nodes.insert(model.id, model);
    }

    pub fn insert_tunnel(&self, model: tunnel::Model) {
        self.tables.tunnels.insert(model.id, model);
    }

    pub fn insert_forward(&self, model: forward::Model) {
        self.tables.forwards.insert(model.id, model);
    }

    pub fn insert_user(&self, model: user::Model) {
        self.tables.users.insert(model.id, model);
    }

    pub fn insert_user_tunnel(&self, model: user_tunnel::Model) {
        self.tables.user_tunnels.insert(model.id, model);
    }

    pub fn set_config(&self, name: &str, value: &str) {
        self.tables.config.insert(name.to_string(), value.to_string());
    }

    pub fn forward(&self, id: i64) -> Option<forward::Model> {
        self.tables.forwards.get(&id).map(|r| r.clone())
    }

    pub fn user(&self, id: i64) -> Option<user::Model> {
        self.tables.users.get(&id).map(|r| r.clone())
    }

    pub fn user_tunnel(&self, id: i64) -> Option<user_tunnel::Model> {
        self.tables.user_tunnels.get(&id).map(|r| r.clone())
    }

    fn sorted_forwards(&self, keep: impl Fn(&forward::Model) -> bool) -> Vec<forward::Model> {
        let mut rows: Vec<forward::Model> = self
            .tables
            .forwards
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|f| f.id);
        rows
    }
}

#[async_trait]
impl FlowRepository for InMemoryRepository {
    async fn node_exists_by_secret(&self, secret: &str) -> Result<bool, DbErr> {
        Ok(self.find_node_by_secret(secret).await?.is_some())
    }

    async fn find_node_by_secret(&self, secret: &str) -> Result<Option<node::Model>, DbErr> {
        if secret.is_empty() {
            return Ok(None);
        }
        Ok(self
            .tables
            .nodes
            .iter()
            .find(|r| r.secret == secret)
            .map(|r| r.value().clone()))
    }

    async fn find_node(&self, node_id: i64) -> Result<Option<node::Model>, DbErr> {
        Ok(self.tables.nodes.get(&node_id).map(|r| r.clone()))
    }

    async fn list_nodes(&self) -> Result<Vec<node::Model>, DbErr> {
        let mut nodes: Vec<node::Model> =
            self.tables.nodes.iter().map(|r| r.value().clone()).collect();
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }

    async fn find_forward(&self, forward_id: i64) -> Result<Option<forward::Model>, DbErr> {
        Ok(self.forward(forward_id))
    }

    async fn find_tunnel(&self, tunnel_id: i64) -> Result<Option<tunnel::Model>, DbErr> {
        Ok(self.tables.tunnels.get(&tunnel_id).map(|r| r.clone()))
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<user::Model>, DbErr> {
        Ok(self.user(user_id))
    }

    async fn find_user_tunnel(
        &self,
        user_tunnel_id: i64,
    ) -> Result<Option<user_tunnel::Model>, DbErr> {
        Ok(self.user_tunnel(user_tunnel_id))
    }

    async fn find_user_tunnel_by_scope(
        &self,
        user_id: i64,
        tunnel_id: i64,
    ) -> Result<Option<user_tunnel::Model>, DbErr> {
        Ok(self
            .tables
            .user_tunnels
            .iter()
            .find(|r| r.user_id == user_id && r.tunnel_id == tunnel_id)
            .map(|r| r.value().clone()))
    }

    async fn add_forward_flow(
        &self,
        forward_id: i64,
        in_inc: i64,
        out_inc: i64,
        now_ms: i64,
    ) -> Result<u64, DbErr> {
        Ok(match self.tables.forwards.get_mut(&forward_id) {
            Some(mut row) => {
                row.in_flow += in_inc;
                row.out_flow += out_inc;
                row.updated_time = Some(now_ms);
                1
            }
            None => 0,
        })
    }

    async fn add_user_flow(
        &self,
        user_id: i64,
        in_inc: i64,
        out_inc: i64,
        now_ms: i64,
    ) -> Result<u64, DbErr> {
        Ok(match self.tables.users.get_mut(&user_id) {
            Some(mut row) => {
                row.in_flow += in_inc;
                row.out_flow += out_inc;
                row.updated_time = Some(now_ms);
                1
            }
            None => 0,
        })
    }

    async fn add_user_tunnel_flow(
        &self,
        user_tunnel_id: i64,
        in_inc: i64,
        out_inc: i64,
    ) -> Result<u64, DbErr> {
        Ok(match self.tables.user_tunnels.get_mut(&user_tunnel_id) {
            Some(mut row) => {
                row.in_flow += in_inc;
                row.out_flow += out_inc;
                1
            }
            None => 0,
        })
    }

    async fn set_user_status(&self, user_id: i64, status: EntityStatus) -> Result<u64, DbErr> {
        Ok(match self.tables.users.get_mut(&user_id) {
            Some(mut row) => {
                row.status = Some(status);
                1
            }
            None => 0,
        })
    }

    async fn set_user_tunnel_status(
        &self,
        user_tunnel_id: i64,
        status: EntityStatus,
    ) -> Result<u64, DbErr> {
        Ok(match self.tables.user_tunnels.get_mut(&user_tunnel_id) {
            Some(mut row) => {
                row.status = status;
                1
            }
            None => 0,
        })
    }

    async fn set_forward_status(
        &self,
        forward_id: i64,
        status: EntityStatus,
    ) -> Result<u64, DbErr> {
        Ok(match self.tables.forwards.get_mut(&forward_id) {
            Some(mut row) => {
                row.status = status;
                1
            }
            None => 0,
        })
    }

    async fn list_forwards_by_user(&self, user_id: i64) -> Result<Vec<forward::Model>, DbErr> {
        Ok(self.sorted_forwards(|f| f.user_id == user_id))
    }

    async fn list_forwards_by_user_tunnel(
        &self,
        user_id: i64,
        tunnel_id: i64,
    ) -> Result<Vec<forward::Model>, DbErr> {
        Ok(self.sorted_forwards(|f| f.user_id == user_id && f.tunnel_id == tunnel_id))
    }

    async fn list_entry_forwards(
        &self,
        node_id: i64,
        tunnel_type: TunnelType,
    ) -> Result<Vec<(forward::Model, tunnel::Model)>, DbErr> {
        let tunnels: HashMap<i64, tunnel::Model> = self
            .tables
            .tunnels
            .iter()
            .filter(|t| t.in_node_id == node_id && t.tunnel_type == tunnel_type)
            .map(|t| (t.id, t.value().clone()))
            .collect();
        Ok(self
            .sorted_forwards(|f| tunnels.contains_key(&f.tunnel_id))
            .into_iter()
            .filter_map(|f| tunnels.get(&f.tunnel_id).cloned().map(|t| (f, t)))
            .collect())
    }

    async fn tunnel_iface_map(&self, tunnel_id: i64) -> Result<HashMap<i64, String>, DbErr> {
        let raw = self
            .tables
            .config
            .get(&tunnel_iface_key(tunnel_id))
            .map(|r| r.value().clone());
        Ok(parse_tunnel_iface_map(tunnel_id, raw.as_deref()))
    }
}

/// Command sender that records every command instead of delivering it.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(i64, AgentCommand)>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later send to `node_id` fail as if the agent were offline.
    pub fn fail_node(&self, node_id: i64) {
        self.failing.lock().unwrap().insert(node_id);
    }

    pub fn sent(&self) -> Vec<(i64, AgentCommand)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, node_id: i64) -> Vec<AgentCommand> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == node_id)
            .map(|(_, cmd)| cmd)
            .collect()
    }
}

#[async_trait]
impl NodeCommandSender for RecordingSender {
    async fn send_command(
        &self,
        node_id: i64,
        command: AgentCommand,
    ) -> Result<(), DispatcherError> {
        if self.failing.lock().unwrap().contains(&node_id) {
            return Err(DispatcherError::AgentNotConnected(node_id));
        }
        self.sent.lock().unwrap().push((node_id, command));
        Ok(())
    }
}
