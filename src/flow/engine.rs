//! Conversation engine — applies events to sessions.
//!
//! The transition function is pure: given a session, an event, and the menu
//! catalog it yields the next session (or a reset) and an [`Outcome`]. The
//! engine wraps it with the session-store read and write.

use std::sync::Arc;

use serde::Serialize;

use super::catalog::{MenuCatalog, MenuEntry, MenuKey};
use super::event::Event;
use super::record::{LeadKind, LeadRecord};
use super::session::{Field, Session, SessionId, SessionStore};
use super::state::FlowState;

/// Shortest phone number accepted, in characters.
pub const MIN_PHONE_CHARS: usize = 7;
/// Shortest name accepted, in characters.
pub const MIN_NAME_CHARS: usize = 2;
/// Shortest project name accepted, in characters.
pub const MIN_PROJECT_NAME_CHARS: usize = 2;
/// Shortest time estimate accepted, in characters.
pub const MIN_TIME_NEEDED_CHARS: usize = 2;

/// What a prompt is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PromptStep {
    MainMenu,
    SubMenu { category: String },
    AskPhone,
    AskName,
    AskProjectName,
    AskTimeNeeded,
}

/// Why a text input was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub field: Field,
    pub min_chars: usize,
}

/// A request for more input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub step: PromptStep,
    /// Selectable entries; empty when free text is expected.
    pub choices: Vec<MenuEntry>,
    /// Set when the prompt is re-issued after invalid input.
    pub rejected: Option<Rejection>,
}

impl Prompt {
    fn ask(step: PromptStep) -> Self {
        Self {
            step,
            choices: Vec::new(),
            rejected: None,
        }
    }

    fn retry(step: PromptStep, field: Field, min_chars: usize) -> Self {
        Self {
            step,
            choices: Vec::new(),
            rejected: Some(Rejection { field, min_chars }),
        }
    }

    /// The top-level menu.
    pub fn main_menu(catalog: &MenuCatalog) -> Self {
        Self {
            step: PromptStep::MainMenu,
            choices: catalog.top_level().to_vec(),
            rejected: None,
        }
    }

    /// The sub-menu of `key`, followed by the back choice.
    pub fn sub_menu(catalog: &MenuCatalog, key: &MenuKey, category: String) -> Self {
        let mut choices = catalog.sub_entries_for(key).to_vec();
        choices.push(catalog.back_choice());
        Self {
            step: PromptStep::SubMenu { category },
            choices,
            rejected: None,
        }
    }
}

/// The engine's answer to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// More input is needed.
    Prompt(Prompt),
    /// The flow finished; the session has been reset. `follow_up` is the
    /// fresh main menu shown after the confirmation.
    Completed { record: LeadRecord, follow_up: Prompt },
    /// The flow was cancelled; the session has been reset.
    Cancelled,
}

impl Outcome {
    pub fn prompt(&self) -> Option<&Prompt> {
        match self {
            Self::Prompt(prompt) => Some(prompt),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&LeadRecord> {
        match self {
            Self::Completed { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Prompt(prompt) if prompt.rejected.is_some() => "rejected",
            Self::Prompt(_) => "prompt",
            Self::Completed { .. } => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of a pure transition.
#[derive(Debug)]
pub struct Transition {
    /// The session to store, or `None` to clear it.
    pub session: Option<Session>,
    pub outcome: Outcome,
}

impl Transition {
    fn keep(session: Session, outcome: Outcome) -> Self {
        Self {
            session: Some(session),
            outcome,
        }
    }

    fn reset(outcome: Outcome) -> Self {
        Self {
            session: None,
            outcome,
        }
    }

    /// State after the transition.
    pub fn next_state(&self) -> FlowState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(FlowState::Initial)
    }
}

/// Trim `raw` and accept it if it has at least `min_chars` characters.
fn accept_text(raw: &str, min_chars: usize) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty() && trimmed.chars().count() >= min_chars).then(|| trimmed.to_string())
}

/// The prompt for the step `session` is currently at.
pub fn current_prompt(session: &Session, catalog: &MenuCatalog) -> Prompt {
    match session.state {
        FlowState::Initial => Prompt::main_menu(catalog),
        FlowState::CategoryChosen => {
            let category = session.field(Field::Category).unwrap_or_default().to_string();
            let key = catalog.key_for_label(&category);
            Prompt::sub_menu(catalog, &key, category)
        }
        FlowState::AwaitPhone => Prompt::ask(PromptStep::AskPhone),
        FlowState::AwaitName => Prompt::ask(PromptStep::AskName),
        FlowState::AwaitProjectName => Prompt::ask(PromptStep::AskProjectName),
        FlowState::AwaitTimeNeeded => Prompt::ask(PromptStep::AskTimeNeeded),
    }
}

/// Apply `event` to `session`.
///
/// Menu steps never reject: unknown keys become their own label. Text steps
/// validate and re-prompt on failure with no attempt limit. An event that
/// does not fit the current step (text at a menu, a stale button at a text
/// step) re-issues the current prompt and leaves the session untouched.
pub fn transition(
    session_id: &SessionId,
    mut session: Session,
    event: Event,
    catalog: &MenuCatalog,
) -> Transition {
    use FlowState::*;

    match (session.state, event) {
        (_, Event::Start) => Transition::reset(Outcome::Prompt(Prompt::main_menu(catalog))),

        (_, Event::Cancel) => Transition::reset(Outcome::Cancelled),

        // Back goes through the same reset as Start
        (_, Event::MenuSelect { key }) if key.is_back() => {
            Transition::reset(Outcome::Prompt(Prompt::main_menu(catalog)))
        }

        (Initial, Event::MenuSelect { key }) => {
            let label = catalog.label_for(&key);
            session.set_field(Field::Category, label.clone());
            if catalog.is_collaborator(&key) {
                session.state = AwaitProjectName;
                Transition::keep(session, Outcome::Prompt(Prompt::ask(PromptStep::AskProjectName)))
            } else {
                session.state = CategoryChosen;
                let prompt = Prompt::sub_menu(catalog, &key, label);
                Transition::keep(session, Outcome::Prompt(prompt))
            }
        }

        (CategoryChosen, Event::MenuSelect { key }) => {
            session.set_field(Field::Service, catalog.label_for(&key));
            session.state = AwaitPhone;
            Transition::keep(session, Outcome::Prompt(Prompt::ask(PromptStep::AskPhone)))
        }

        (AwaitPhone, Event::TextInput { raw }) => match accept_text(&raw, MIN_PHONE_CHARS) {
            Some(phone) => {
                session.set_field(Field::Phone, phone);
                session.state = AwaitName;
                Transition::keep(session, Outcome::Prompt(Prompt::ask(PromptStep::AskName)))
            }
            None => {
                let prompt = Prompt::retry(PromptStep::AskPhone, Field::Phone, MIN_PHONE_CHARS);
                Transition::keep(session, Outcome::Prompt(prompt))
            }
        },

        (AwaitName, Event::TextInput { raw }) => match accept_text(&raw, MIN_NAME_CHARS) {
            Some(name) => {
                session.set_field(Field::Name, name);
                complete(session_id, &session, LeadKind::Service, catalog)
            }
            None => {
                let prompt = Prompt::retry(PromptStep::AskName, Field::Name, MIN_NAME_CHARS);
                Transition::keep(session, Outcome::Prompt(prompt))
            }
        },

        (AwaitProjectName, Event::TextInput { raw }) => {
            match accept_text(&raw, MIN_PROJECT_NAME_CHARS) {
                Some(project) => {
                    session.set_field(Field::ProjectName, project);
                    session.state = AwaitTimeNeeded;
                    let prompt = Prompt::ask(PromptStep::AskTimeNeeded);
                    Transition::keep(session, Outcome::Prompt(prompt))
                }
                None => {
                    let prompt = Prompt::retry(
                        PromptStep::AskProjectName,
                        Field::ProjectName,
                        MIN_PROJECT_NAME_CHARS,
                    );
                    Transition::keep(session, Outcome::Prompt(prompt))
                }
            }
        }

        (AwaitTimeNeeded, Event::TextInput { raw }) => {
            match accept_text(&raw, MIN_TIME_NEEDED_CHARS) {
                Some(time_needed) => {
                    session.set_field(Field::TimeNeeded, time_needed);
                    complete(session_id, &session, LeadKind::Collaborator, catalog)
                }
                None => {
                    let prompt = Prompt::retry(
                        PromptStep::AskTimeNeeded,
                        Field::TimeNeeded,
                        MIN_TIME_NEEDED_CHARS,
                    );
                    Transition::keep(session, Outcome::Prompt(prompt))
                }
            }
        }

        (_, Event::TextInput { .. } | Event::MenuSelect { .. }) => {
            let prompt = current_prompt(&session, catalog);
            Transition::keep(session, Outcome::Prompt(prompt))
        }
    }
}

fn complete(
    session_id: &SessionId,
    session: &Session,
    kind: LeadKind,
    catalog: &MenuCatalog,
) -> Transition {
    let record = LeadRecord::build(session_id.clone(), &session.fields, kind);
    Transition::reset(Outcome::Completed {
        record,
        follow_up: Prompt::main_menu(catalog),
    })
}

/// The state machine bound to a session store and catalog.
pub struct ConversationEngine {
    store: Arc<SessionStore>,
    catalog: Arc<MenuCatalog>,
}

impl ConversationEngine {
    pub fn new(store: Arc<SessionStore>, catalog: Arc<MenuCatalog>) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one event for one session.
    ///
    /// Callers must not handle two events for the same session concurrently;
    /// the read and write below are not one atomic step.
    pub fn handle(&self, session_id: &SessionId, event: Event) -> Outcome {
        let session = self.store.get(session_id);
        let from = session.state;
        let event_kind = event.kind();

        let result = transition(session_id, session, event, &self.catalog);
        let to = result.next_state();
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");

        match result.session {
            Some(session) => self.store.set(session_id, session),
            None => self.store.clear(session_id),
        }

        tracing::debug!(
            session = %session_id,
            event = event_kind,
            %from,
            %to,
            outcome = result.outcome.kind(),
            "Flow transition"
        );

        result.outcome
    }
}
