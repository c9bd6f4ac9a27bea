//! Deliberation Panel
//!
//! Independent persona opinions over the same retrieved facts.

pub mod deliberation;
pub mod persona;

pub use deliberation::{
    DeliberationPanel, FactExcerpt, Opinion, PanelFacts, PanelReport, PersonaOutcome,
};
pub use persona::{Persona, PersonaRegistry, PersonaRole};
