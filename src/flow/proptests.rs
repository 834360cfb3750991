//! Property-based tests for the flow engine
//!
//! Random event sequences must never leave a session outside the shape its
//! state implies.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use super::catalog::MenuCatalog;
use super::engine::{ConversationEngine, Outcome};
use super::event::Event;
use super::session::{Field, SessionId, SessionStore};
use super::state::FlowState;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_engine() -> ConversationEngine {
    ConversationEngine::new(
        Arc::new(SessionStore::new()),
        Arc::new(MenuCatalog::default()),
    )
}

/// The exact field set each state implies.
fn expected_fields(state: FlowState) -> BTreeSet<Field> {
    use Field::*;
    let fields: &[Field] = match state {
        FlowState::Initial => &[],
        FlowState::CategoryChosen => &[Category],
        FlowState::AwaitPhone => &[Category, Service],
        FlowState::AwaitName => &[Category, Service, Phone],
        FlowState::AwaitProjectName => &[Category],
        FlowState::AwaitTimeNeeded => &[Category, ProjectName],
    };
    fields.iter().copied().collect()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_menu_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("main_web".to_string()),
        Just("main_ads".to_string()),
        Just("main_logo".to_string()),
        Just("main_admin".to_string()),
        Just("main_collab".to_string()),
        Just("sub_web_shop".to_string()),
        Just("sub_ads_other".to_string()),
        Just("sub_logo_icon".to_string()),
        Just("back_to_main".to_string()),
        "[a-z_]{1,12}",
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9+ ]{0,14}",
        "[a-zA-Z ]{0,10}",
        Just(String::new()),
        Just("   ".to_string()),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => Just(Event::Start),
        1 => Just(Event::Cancel),
        4 => arb_menu_key().prop_map(|key| Event::menu(key)),
        4 => arb_text().prop_map(|raw| Event::text(raw)),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn fields_always_match_state(events in proptest::collection::vec(arb_event(), 0..40)) {
        let engine = test_engine();
        let id = SessionId::from("prop:1");

        for event in events {
            let before = engine.store().get(&id).state;
            engine.handle(&id, event);
            let session = engine.store().get(&id);

            prop_assert!(before.can_transition_to(session.state));
            let keys: BTreeSet<Field> = session.fields.keys().copied().collect();
            prop_assert_eq!(keys, expected_fields(session.state));
        }
    }

    #[test]
    fn terminal_outcomes_reset_session(events in proptest::collection::vec(arb_event(), 0..40)) {
        let engine = test_engine();
        let id = SessionId::from("prop:1");

        for event in events {
            let outcome = engine.handle(&id, event);
            if matches!(outcome, Outcome::Completed { .. } | Outcome::Cancelled) {
                let session = engine.store().get(&id);
                prop_assert_eq!(session.state, FlowState::Initial);
                prop_assert!(session.fields.is_empty());
            }
        }
    }

    #[test]
    fn invalid_phone_rejection_is_idempotent(raw in "[0-9 ]{0,6}") {
        let engine = test_engine();
        let id = SessionId::from("prop:1");
        engine.handle(&id, Event::menu("main_web"));
        engine.handle(&id, Event::menu("sub_web_shop"));

        let first = engine.handle(&id, Event::text(raw.clone()));
        let second = engine.handle(&id, Event::text(raw));

        prop_assert_eq!(&first, &second);
        prop_assert!(first.prompt().is_some_and(|p| p.rejected.is_some()));
        prop_assert_eq!(engine.store().get(&id).state, FlowState::AwaitPhone);
    }

    #[test]
    fn menu_steps_never_reject(key in arb_menu_key()) {
        let engine = test_engine();
        let id = SessionId::from("prop:1");

        let top = engine.handle(&id, Event::menu(key.clone()));
        prop_assert!(top.prompt().is_some_and(|p| p.rejected.is_none()));

        engine.handle(&id, Event::Start);
        engine.handle(&id, Event::menu("main_ads"));
        let sub = engine.handle(&id, Event::menu(key));
        prop_assert!(sub.prompt().is_some_and(|p| p.rejected.is_none()));
    }

    #[test]
    fn sessions_are_independent(events in proptest::collection::vec(arb_event(), 0..20)) {
        let engine = test_engine();
        let busy = SessionId::from("prop:busy");
        let idle = SessionId::from("prop:idle");

        engine.handle(&idle, Event::menu("main_collab"));
        let idle_before = engine.store().get(&idle);

        for event in events {
            engine.handle(&busy, event);
        }

        prop_assert_eq!(engine.store().get(&idle), idle_before);
    }
}
