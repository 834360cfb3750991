//! Lead-intake flow — the conversation state machine.
//!
//! A session walks a menu of categories and sub-categories, then answers
//! free-text questions (phone and name, or project name and time needed for
//! collaborators). Text answers are validated and re-asked on failure; menu
//! choices never fail. A finished flow yields a `LeadRecord` and resets the
//! session.

pub mod catalog;
pub mod engine;
pub mod event;
pub mod record;
pub mod session;
pub mod state;

#[cfg(test)]
mod proptests;

pub use catalog::{MenuCatalog, MenuEntry, MenuKey};
pub use engine::{ConversationEngine, Outcome, Prompt, PromptStep, Rejection};
pub use event::{Event, EventParser};
pub use record::{LeadKind, LeadRecord};
pub use session::{Field, Session, SessionId, SessionStore};
pub use state::FlowState;
