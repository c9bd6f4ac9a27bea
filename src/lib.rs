//! Counsel Desk - Rust Backend Library
//!
//! Backend of a legal-office assistant that answers statute questions and
//! carries out office record operations from one chat box.
//! It includes:
//! - HTTP command handlers
//! - The turn pipeline (gatekeeper, router, legal and admin branches)
//! - Storage layer (SQLite records and knowledge base, JSON config)
//! - Data models and utilities

pub mod commands;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use commands::api_router;
pub use models::chat::{ChatMode, ChatRequest, ChatResponse};
pub use models::response::*;
pub use models::settings::AppConfig;
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
