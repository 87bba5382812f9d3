use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::db::entities::user;
use crate::db::enums::EntityStatus;

// --- User Service Functions ---

pub async fn get_user_by_id(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find_by_id(user_id).one(db).await
}

/// Relative counter update, see `forward_service::add_forward_flow`.
pub async fn add_user_flow(
    db: &DatabaseConnection,
    user_id: i64,
    in_inc: i64,
    out_inc: i64,
    now_ms: i64,
) -> Result<u64, DbErr> {
    let result = user::Entity::update_many()
        .col_expr(user::Column::InFlow, Expr::col(user::Column::InFlow).add(in_inc))
        .col_expr(user::Column::OutFlow, Expr::col(user::Column::OutFlow).add(out_inc))
        .col_expr(user::Column::UpdatedTime, Expr::value(now_ms))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn set_user_status(
    db: &DatabaseConnection,
    user_id: i64,
    status: EntityStatus,
) -> Result<u64, DbErr> {
    let result = user::Entity::update_many()
        .col_expr(user::Column::Status, Expr::value(status))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction};

    #[tokio::test]
    async fn test_add_user_flow_is_one_relative_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let rows = add_user_flow(&db, 3, 5, 7, 1_700).await.unwrap();
        assert_eq!(rows, 1);
        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"UPDATE "user" SET "in_flow" = "in_flow" + $1, "out_flow" = "out_flow" + $2, "updated_time" = $3 WHERE "user"."id" = $4"#,
                [5i64.into(), 7i64.into(), 1_700i64.into(), 3i64.into()],
            )]
        );
    }
}
