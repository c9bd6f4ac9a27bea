//! Router/Controller
//!
//! Four stages per turn after the gatekeeper: Analyst (intent), Strategist
//! (path), executor-prep (runs the chosen branch) and Responder (reply).

pub mod analyst;
pub mod branches;
pub mod controller;
pub mod responder;
pub mod strategist;
pub mod turn;

pub use analyst::{Analyst, DecisionSource, Intent, IntentDecision};
pub use branches::{AdminBranch, AdminFindings, LegalBranch, LegalFindings};
pub use controller::{build_response, RouterController};
pub use responder::Responder;
pub use strategist::{DirectReason, ExecutionPath, LegalQuery, Strategist};
pub use turn::{ConversationTurn, WriteOnce};
