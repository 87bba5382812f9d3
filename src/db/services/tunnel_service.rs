use sea_orm::{DatabaseConnection, DbErr, EntityTrait};

use crate::db::entities::tunnel;

pub async fn get_tunnel_by_id(
    db: &DatabaseConnection,
    tunnel_id: i64,
) -> Result<Option<tunnel::Model>, DbErr> {
    tunnel::Entity::find_by_id(tunnel_id).one(db).await
}
