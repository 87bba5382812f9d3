//! SeaORM Entity Crate
//!
//! Defines the SeaORM entities that map to the panel's tables. The schema itself is owned
//! by the admin side; this crate only reads rows and applies counter/status updates.

pub mod forward;
pub mod node;
pub mod tunnel;
pub mod user;
pub mod user_tunnel;
pub mod vite_config;
