use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr};

use crate::db::entities::{forward, node, tunnel, user, user_tunnel};
use crate::db::enums::{EntityStatus, TunnelType};
use crate::db::services;

/// Everything the flow pipeline, the dispatcher and the reconciler need from storage.
///
/// Implementations must apply the `add_*_flow` operations as atomic relative updates:
/// two concurrent calls adding `a` and `b` to the same row must leave it at `old + a + b`.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    async fn node_exists_by_secret(&self, secret: &str) -> Result<bool, DbErr>;
    async fn find_node_by_secret(&self, secret: &str) -> Result<Option<node::Model>, DbErr>;
    async fn find_node(&self, node_id: i64) -> Result<Option<node::Model>, DbErr>;
    async fn list_nodes(&self) -> Result<Vec<node::Model>, DbErr>;

    async fn find_forward(&self, forward_id: i64) -> Result<Option<forward::Model>, DbErr>;
    async fn find_tunnel(&self, tunnel_id: i64) -> Result<Option<tunnel::Model>, DbErr>;
    async fn find_user(&self, user_id: i64) -> Result<Option<user::Model>, DbErr>;
    async fn find_user_tunnel(
        &self,
        user_tunnel_id: i64,
    ) -> Result<Option<user_tunnel::Model>, DbErr>;
    async fn find_user_tunnel_by_scope(
        &self,
        user_id: i64,
        tunnel_id: i64,
    ) -> Result<Option<user_tunnel::Model>, DbErr>;

    async fn add_forward_flow(
        &self,
        forward_id: i64,
        in_inc: i64,
        out_inc: i64,
        now_ms: i64,
    ) -> Result<u64, DbErr>;
    async fn add_user_flow(
        &self,
        user_id: i64,
        in_inc: i64,
        out_inc: i64,
        now_ms: i64,
    ) -> Result<u64, DbErr>;
    async fn add_user_tunnel_flow(
        &self,
        user_tunnel_id: i64,
        in_inc: i64,
        out_inc: i64,
    ) -> Result<u64, DbErr>;

    async fn set_user_status(&self, user_id: i64, status: EntityStatus) -> Result<u64, DbErr>;
    async fn set_user_tunnel_status(
        &self,
        user_tunnel_id: i64,
        status: EntityStatus,
    ) -> Result<u64, DbErr>;
    async fn set_forward_status(
        &self,
        forward_id: i64,
        status: EntityStatus,
    ) -> Result<u64, DbErr>;

    async fn list_forwards_by_user(&self, user_id: i64) -> Result<Vec<forward::Model>, DbErr>;
    async fn list_forwards_by_user_tunnel(
        &self,
        user_id: i64,
        tunnel_id: i64,
    ) -> Result<Vec<forward::Model>, DbErr>;
    async fn list_entry_forwards(
        &self,
        node_id: i64,
        tunnel_type: TunnelType,
    ) -> Result<Vec<(forward::Model, tunnel::Model)>, DbErr>;

    async fn tunnel_iface_map(&self, tunnel_id: i64) -> Result<HashMap<i64, String>, DbErr>;
}

/// Production repository backed by the shared SeaORM connection pool.
#[derive(Clone)]
pub struct SeaOrmRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }
}

#[async_trait]
impl FlowRepository for SeaOrmRepository {
    async fn node_exists_by_secret(&self, secret: &str) -> Result<bool, DbErr> {
        Ok(services::count_nodes_by_secret(&self.db, secret).await? > 0)
    }

    async fn find_node_by_secret(&self, secret: &str) -> Result<Option<node::Model>, DbErr> {
        services::get_node_by_secret(&self.db, secret).await
    }

    async fn find_node(&self, node_id: i64) -> Result<Option<node::Model>, DbErr> {
        services::get_node_by_id(&self.db, node_id).await
    }

    async fn list_nodes(&self) -> Result<Vec<node::Model>, DbErr> {
        services::get_all_nodes(&self.db).await
    }

    async fn find_forward(&self, forward_id: i64) -> Result<Option<forward::Model>, DbErr> {
        services::get_forward_by_id(&self.db, forward_id).await
    }

    async fn find_tunnel(&self, tunnel_id: i64) -> Result<Option<tunnel::Model>, DbErr> {
        services::get_tunnel_by_id(&self.db, tunnel_id).await
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<user::Model>, DbErr> {
        services::get_user_by_id(&self.db, user_id).await
    }

    async fn find_user_tunnel(
        &self,
        user_tunnel_id: i64,
    ) -> Result<Option<user_tunnel::Model>, DbErr> {
        services::get_user_tunnel_by_id(&self.db, user_tunnel_id).await
    }

    async fn find_user_tunnel_by_scope(
        &self,
        user_id: i64,
        tunnel_id: i64,
    ) -> Result<Option<user_tunnel::Model>, DbErr> {
        services::get_user_tunnel_by_scope(&self.db, user_id, tunnel_id).await
    }

    async fn add_forward_flow(
        &self,
        forward_id: i64,
        in_inc: i64,
        out_inc: i64,
        now_ms: i64,
    ) -> Result<u64, DbErr> {
        services::add_forward_flow(&self.db, forward_id, in_inc, out_inc, now_ms).await
    }

    async fn add_user_flow(
        &self,
        user_id: i64,
        in_inc: i64,
        out_inc: i64,
        now_ms: i64,
    ) -> Result<u64, DbErr> {
        services::add_user_flow(&self.db, user_id, in_inc, out_inc, now_ms).await
    }

    async fn add_user_tunnel_flow(
        &self,
        user_tunnel_id: i64,
        in_inc: i64,
        out_inc: i64,
    ) -> Result<u64, DbErr> {
        services::add_user_tunnel_flow(&self.db, user_tunnel_id, in_inc, out_inc).await
    }

    async fn set_user_status(&self, user_id: i64, status: EntityStatus) -> Result<u64, DbErr> {
        services::set_user_status(&self.db, user_id, status).await
    }

    async fn set_user_tunnel_status(
        &self,
        user_tunnel_id: i64,
        status: EntityStatus,
    ) -> Result<u64, DbErr> {
        services::set_user_tunnel_status(&self.db, user_tunnel_id, status).await
    }

    async fn set_forward_status(
        &self,
        forward_id: i64,
        status: EntityStatus,
    ) -> Result<u64, DbErr> {
        services::set_forward_status(&self.db, forward_id, status).await
    }

    async fn list_forwards_by_user(&self, user_id: i64) -> Result<Vec<forward::Model>, DbErr> {
        services::get_forwards_by_user(&self.db, user_id).await
    }

    async fn list_forwards_by_user_tunnel(
        &self,
        user_id: i64,
        tunnel_id: i64,
    ) -> Result<Vec<forward::Model>, DbErr> {
        services::get_forwards_by_user_tunnel(&self.db, user_id, tunnel_id).await
    }

    async fn list_entry_forwards(
        &self,
        node_id: i64,
        tunnel_type: TunnelType,
    ) -> Result<Vec<(forward::Model, tunnel::Model)>, DbErr> {
        services::get_entry_forwards_for_node(&self.db, node_id, tunnel_type).await
    }

    async fn tunnel_iface_map(&self, tunnel_id: i64) -> Result<HashMap<i64, String>, DbErr> {
        services::get_tunnel_iface_map(&self.db, tunnel_id).await
    }
}
