use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use tracing::warn;

use crate::db::entities::vite_config;

// --- Settings Service Functions ---

/// Retrieves a raw configuration value by its name.
pub async fn get_config_value(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<String>, DbErr> {
    let row = vite_config::Entity::find()
        .filter(vite_config::Column::Name.eq(name))
        .one(db)
        .await?;
    Ok(row.map(|r| r.value))
}

pub fn tunnel_iface_key(tunnel_id: i64) -> String {
    format!("tunnel_iface_{tunnel_id}")
}

/// Decodes the stored `{"<nodeId>": "<ip>"}` document. Missing, empty or malformed values
/// yield an empty mapping.
pub fn parse_tunnel_iface_map(tunnel_id: i64, raw: Option<&str>) -> HashMap<i64, String> {
    match raw {
        Some(value) if !value.trim().is_empty() => {
            serde_json::from_str::<HashMap<i64, String>>(value).unwrap_or_else(|e| {
                warn!(tunnel_id, error = %e, "Ignoring malformed tunnel interface mapping.");
                HashMap::new()
            })
        }
        _ => HashMap::new(),
    }
}

/// Reads the node id -> outgoing IP mapping configured for a tunnel.
pub async fn get_tunnel_iface_map(
    db: &DatabaseConnection,
    tunnel_id: i64,
) -> Result<HashMap<i64, String>, DbErr> {
    let raw = get_config_value(db, &tunnel_iface_key(tunnel_id)).await?;
    Ok(parse_tunnel_iface_map(tunnel_id, raw.as_deref()))
}
