use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};

use crate::db::entities::node;

// --- Node Service Functions ---

/// Counts nodes carrying the given agent secret. An empty secret never matches.
pub async fn count_nodes_by_secret(db: &DatabaseConnection, secret: &str) -> Result<u64, DbErr> {
    if secret.is_empty() {
        return Ok(0);
    }
    node::Entity::find()
        .filter(node::Column::Secret.eq(secret))
        .count(db)
        .await
}

pub async fn get_node_by_secret(
    db: &DatabaseConnection,
    secret: &str,
) -> Result<Option<node::Model>, DbErr> {
    if secret.is_empty() {
        return Ok(None);
    }
    node::Entity::find()
        .filter(node::Column::Secret.eq(secret))
        .one(db)
        .await
}

pub async fn get_node_by_id(
    db: &DatabaseConnection,
    node_id: i64,
) -> Result<Option<node::Model>, DbErr> {
    node::Entity::find_by_id(node_id).one(db).await
}

pub async fn get_all_nodes(db: &DatabaseConnection) -> Result<Vec<node::Model>, DbErr> {
    node::Entity::find()
        .order_by_asc(node::Column::Id)
        .all(db)
        .await
}
