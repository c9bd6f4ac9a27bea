//! Data Models
//!
//! Request, response and configuration types.

pub mod chat;
pub mod response;
pub mod settings;

pub use chat::*;
pub use response::*;
pub use settings::*;
