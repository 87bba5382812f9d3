use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::db::entities::user_tunnel;
use crate::db::enums::EntityStatus;

// --- UserTunnel Service Functions ---

pub async fn get_user_tunnel_by_id(
    db: &DatabaseConnection,
    user_tunnel_id: i64,
) -> Result<Option<user_tunnel::Model>, DbErr> {
    user_tunnel::Entity::find_by_id(user_tunnel_id).one(db).await
}

pub async fn get_user_tunnel_by_scope(
    db: &DatabaseConnection,
    user_id: i64,
    tunnel_id: i64,
) -> Result<Option<user_tunnel::Model>, DbErr> {
    user_tunnel::Entity::find()
        .filter(user_tunnel::Column::UserId.eq(user_id))
        .filter(user_tunnel::Column::TunnelId.eq(tunnel_id))
        .one(db)
        .await
}

/// The association has no timestamp column, only the counters move.
pub async fn add_user_tunnel_flow(
    db: &DatabaseConnection,
    user_tunnel_id: i64,
    in_inc: i64,
    out_inc: i64,
) -> Result<u64, DbErr> {
    let result = user_tunnel::Entity::update_many()
        .col_expr(
            user_tunnel::Column::InFlow,
            Expr::col(user_tunnel::Column::InFlow).add(in_inc),
        )
        .col_expr(
            user_tunnel::Column::OutFlow,
            Expr::col(user_tunnel::Column::OutFlow).add(out_inc),
        )
        .filter(user_tunnel::Column::Id.eq(user_tunnel_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn set_user_tunnel_status(
    db: &DatabaseConnection,
    user_tunnel_id: i64,
    status: EntityStatus,
) -> Result<u64, DbErr> {
    let result = user_tunnel::Entity::update_many()
        .col_expr(user_tunnel::Column::Status, Expr::value(status))
        .filter(user_tunnel::Column::Id.eq(user_tunnel_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
