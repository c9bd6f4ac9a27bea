//! Storage Layer
//!
//! Handles all data persistence: SQLite database (office records and the
//! knowledge base) and the JSON config.

pub mod config;
pub mod database;
pub mod knowledge;
pub mod records;

pub use config::*;
pub use database::*;
pub use knowledge::*;
pub use records::*;
