pub mod admin_handlers;
pub mod app;
pub mod auth_handlers;
pub mod config;
pub mod event_handlers;
pub mod metrics;
pub mod store;

pub use app::{build_router, AppState};
