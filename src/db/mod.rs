pub mod entities;
pub mod enums;
pub mod repository;
pub mod services;

pub use repository::{FlowRepository, SeaOrmRepository};
