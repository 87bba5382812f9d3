use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::EntityStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "forward")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub tunnel_id: i64,
    pub name: String,
    pub in_port: Option<i32>,
    pub remote_addr: String,
    pub in_flow: i64,
    pub out_flow: i64,
    #[sea_orm(column_type = "Integer")]
    pub status: EntityStatus,
    pub created_time: i64,
    pub updated_time: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tunnel::Entity",
        from = "Column::TunnelId",
        to = "super::tunnel::Column::Id"
    )]
    Tunnel,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::tunnel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tunnel.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Name under which the agents know this forward's service.
    pub fn service_name(&self) -> String {
        service_name(self.id, self.user_id, self.tunnel_id)
    }
}

pub fn service_name(forward_id: i64, user_id: i64, tunnel_id: i64) -> String {
    format!("{forward_id}_{user_id}_{tunnel_id}")
}
