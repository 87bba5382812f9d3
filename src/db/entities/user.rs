use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::EntityStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "user", unique)]
    pub username: String,
    /// Quota in GiB, 0 means unlimited.
    pub flow: i64,
    pub in_flow: i64,
    pub out_flow: i64,
    /// Expiry as epoch millis; absent or 0 never expires.
    pub exp_time: Option<i64>,
    /// Absent status is treated as active.
    #[sea_orm(column_type = "Integer", nullable)]
    pub status: Option<EntityStatus>,
    pub created_time: i64,
    pub updated_time: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::forward::Entity")]
    Forward,
    #[sea_orm(has_many = "super::user_tunnel::Entity")]
    UserTunnel,
}

impl Related<super::forward::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Forward.def()
    }
}

impl Related<super::user_tunnel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserTunnel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
