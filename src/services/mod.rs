//! Services
//!
//! The turn pipeline: gatekeeper, router, and the branches it dispatches to.

pub mod admin;
pub mod gatekeeper;
pub mod panel;
pub mod retrieval;
pub mod router;
