#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod dto;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ws_channel;

// Re-export primary types
pub use bootstrap::{ApiInfo, AxumContext, CorsConfig, ServerConfig, bootstrap, serve, start_server};
pub use routes::{ROUTES, create_router};
pub use state::AppState;
pub use ws_channel::WsChannel;
