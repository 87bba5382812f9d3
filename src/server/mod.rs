pub mod agent_state;
pub mod command_dispatcher;
pub mod commands;
pub mod config;
pub mod observer_service;
pub mod ws_agent_handler;
