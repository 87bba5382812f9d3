//! The `services` module wraps every query this control plane issues against the panel
//! database. Counter updates are expressed as relative `column = column + n` updates so
//! concurrent reports never lose increments.

pub mod forward_service;
pub mod node_service;
pub mod settings_service;
pub mod tunnel_service;
pub mod user_service;
pub mod user_tunnel_service;

pub use forward_service::*;
pub use node_service::*;
pub use settings_service::*;
pub use tunnel_service::*;
pub use user_service::*;
pub use user_tunnel_service::*;
