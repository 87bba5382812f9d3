use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
};

use crate::db::entities::{forward, tunnel};
use crate::db::enums::{EntityStatus, TunnelType};

// --- Forward Service Functions ---

pub async fn get_forward_by_id(
    db: &DatabaseConnection,
    forward_id: i64,
) -> Result<Option<forward::Model>, DbErr> {
    forward::Entity::find_by_id(forward_id).one(db).await
}

/// Adds the given byte counts to a forward's counters in a single relative UPDATE.
/// Returns the number of rows touched (0 when the forward no longer exists).
pub async fn add_forward_flow(
    db: &DatabaseConnection,
    forward_id: i64,
    in_inc: i64,
    out_inc: i64,
    now_ms: i64,
) -> Result<u64, DbErr> {
    let result = forward::Entity::update_many()
        .col_expr(forward::Column::InFlow, Expr::col(forward::Column::InFlow).add(in_inc))
        .col_expr(forward::Column::OutFlow, Expr::col(forward::Column::OutFlow).add(out_inc))
        .col_expr(forward::Column::UpdatedTime, Expr::value(now_ms))
        .filter(forward::Column::Id.eq(forward_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn set_forward_status(
    db: &DatabaseConnection,
    forward_id: i64,
    status: EntityStatus,
) -> Result<u64, DbErr> {
    let result = forward::Entity::update_many()
        .col_expr(forward::Column::Status, Expr::value(status))
        .filter(forward::Column::Id.eq(forward_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn get_forwards_by_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<forward::Model>, DbErr> {
    forward::Entity::find()
        .filter(forward::Column::UserId.eq(user_id))
        .order_by_asc(forward::Column::Id)
        .all(db)
        .await
}

pub async fn get_forwards_by_user_tunnel(
    db: &DatabaseConnection,
    user_id: i64,
    tunnel_id: i64,
) -> Result<Vec<forward::Model>, DbErr> {
    forward::Entity::find()
        .filter(forward::Column::UserId.eq(user_id))
        .filter(forward::Column::TunnelId.eq(tunnel_id))
        .order_by_asc(forward::Column::Id)
        .all(db)
        .await
}

/// Forwards entering the platform on `node_id` through tunnels of the given type,
/// joined with their tunnel and ordered by forward id.
pub async fn get_entry_forwards_for_node(
    db: &DatabaseConnection,
    node_id: i64,
    tunnel_type: TunnelType,
) -> Result<Vec<(forward::Model, tunnel::Model)>, DbErr> {
    let rows = forward::Entity::find()
        .find_also_related(tunnel::Entity)
        .filter(tunnel::Column::TunnelType.eq(tunnel_type))
        .filter(tunnel::Column::InNodeId.eq(node_id))
        .order_by_asc(forward::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(fwd, tun)| tun.map(|t| (fwd, t)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction};

    #[tokio::test]
    async fn test_add_forward_flow_is_one_relative_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let rows = add_forward_flow(&db, 42, 100, 200, 1_700).await.unwrap();
        assert_eq!(rows, 1);
        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"UPDATE "forward" SET "in_flow" = "in_flow" + $1, "out_flow" = "out_flow" + $2, "updated_time" = $3 WHERE "forward"."id" = $4"#,
                [100i64.into(), 200i64.into(), 1_700i64.into(), 42i64.into()],
            )]
        );
    }
}
