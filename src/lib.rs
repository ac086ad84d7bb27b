//! Circulation: library lending server
//!
//! Tracks lending of a finite pool of items to registered members. The
//! lending state machine (borrow, return, fine payment, overdue sweep)
//! keeps availability, member standing and the fine ledger consistent
//! under concurrent requests; a REST JSON API wraps it.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
