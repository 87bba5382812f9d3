use axum::{
    Router,
    body::Bytes,
    extract::{
        Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::flow::FlowError;
use crate::web::AppState;

// --- Request Structs ---

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    secret: Option<String>,
    id: Option<String>,
}

// --- Route Handlers ---

/// Traffic report sink for the agents. Every outcome is acknowledged with `ok`.
async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> &'static str {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Flow upload body rejected.");
            return "ok";
        }
    };
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let secret = query.secret.unwrap_or_default();

    match app_state
        .flow_service
        .ingest(&secret, query.id.as_deref(), &body)
        .await
    {
        Ok(outcome) => debug!(?outcome, "Flow upload handled."),
        Err(FlowError::ForwardNotFound(forward_id)) => {
            warn!(forward_id, "Flow upload for unknown forward dropped.");
        }
        Err(e) => error!(error = %e, "Flow upload failed."),
    }
    "ok"
}

async fn flow_config_handler() -> &'static str {
    "ok"
}

async fn flow_test_handler() -> &'static str {
    "test"
}

pub fn create_flow_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/flow/upload", post(upload_handler))
        .route("/flow/config", get(flow_config_handler).post(flow_config_handler))
        .route("/flow/test", get(flow_test_handler).post(flow_test_handler))
}
