use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{EntityStatus, FlowMode, TunnelType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tunnel")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub in_node_id: i64,
    pub out_node_id: Option<i64>,
    #[sea_orm(column_name = "type", column_type = "Integer")]
    pub tunnel_type: TunnelType,
    #[sea_orm(column_type = "Integer")]
    pub flow: FlowMode,
    pub protocol: Option<String>,
    #[sea_orm(column_type = "Integer")]
    pub status: EntityStatus,
    pub created_time: i64,
    pub updated_time: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::forward::Entity")]
    Forward,
}

impl Related<super::forward::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Forward.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Nodes that own the listening side of a forward over this tunnel.
    /// A dual-node tunnel without an egress node yields only the ingress.
    pub fn command_targets(&self) -> Vec<i64> {
        let mut targets = vec![self.in_node_id];
        if self.tunnel_type.is_dual_node() {
            if let Some(out_node_id) = self.out_node_id {
                targets.push(out_node_id);
            }
        }
        targets
    }
}
