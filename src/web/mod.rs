use axum::{Router, http::Method, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::FlowRepository;
use crate::flow::FlowIngestService;
use crate::server::agent_state::{ConnectedAgents, NodeCommandSender};
use crate::server::command_dispatcher::NodeCommandDispatcher;
use crate::server::observer_service::ObserverReconciler;
use crate::web::routes::flow_routes;

pub mod error;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn FlowRepository>,
    pub connected_agents: Arc<ConnectedAgents>,
    pub flow_service: Arc<FlowIngestService>,
    pub reconciler: Arc<ObserverReconciler>,
}

impl AppState {
    /// Wires the pipeline and the reconciler around one command sender.
    pub fn new(
        repo: Arc<dyn FlowRepository>,
        connected_agents: Arc<ConnectedAgents>,
        sender: Arc<dyn NodeCommandSender>,
        panel_addr: Option<String>,
    ) -> Self {
        let dispatcher = Arc::new(NodeCommandDispatcher::new(repo.clone(), sender));
        Self {
            flow_service: Arc::new(FlowIngestService::new(repo.clone(), dispatcher.clone())),
            reconciler: Arc::new(ObserverReconciler::new(repo.clone(), dispatcher, panel_addr)),
            repo,
            connected_agents,
        }
    }
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/ws/agent", get(crate::server::ws_agent_handler::ws_agent_handler))
        .merge(flow_routes::create_flow_router())
        .with_state(app_state)
        .layer(cors)
}
