//! Flow state machine — tracks which step a session is in.

use serde::{Deserialize, Serialize};

/// The steps of the lead-intake conversation.
///
/// Service branch: Initial → CategoryChosen → AwaitPhone → AwaitName → Initial.
/// Collaborator branch: Initial → AwaitProjectName → AwaitTimeNeeded → Initial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Initial,
    CategoryChosen,
    AwaitPhone,
    AwaitName,
    AwaitProjectName,
    AwaitTimeNeeded,
}

impl FlowState {
    /// All six states, in flow order.
    pub const ALL: [FlowState; 6] = [
        FlowState::Initial,
        FlowState::CategoryChosen,
        FlowState::AwaitPhone,
        FlowState::AwaitName,
        FlowState::AwaitProjectName,
        FlowState::AwaitTimeNeeded,
    ];

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Staying in place (retry) and returning to `Initial` (start, back,
    /// cancel, completion) are allowed from every state.
    pub fn can_transition_to(&self, target: FlowState) -> bool {
        use FlowState::*;
        if *self == target || target == Initial {
            return true;
        }
        matches!(
            (self, target),
            (Initial, CategoryChosen)
                | (Initial, AwaitProjectName)
                | (CategoryChosen, AwaitPhone)
                | (AwaitPhone, AwaitName)
                | (AwaitProjectName, AwaitTimeNeeded)
        )
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::CategoryChosen => "category_chosen",
            Self::AwaitPhone => "await_phone",
            Self::AwaitName => "await_name",
            Self::AwaitProjectName => "await_project_name",
            Self::AwaitTimeNeeded => "await_time_needed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_forward_transitions() {
        use FlowState::*;
        let transitions = [
            (Initial, CategoryChosen),
            (Initial, AwaitProjectName),
            (CategoryChosen, AwaitPhone),
            (AwaitPhone, AwaitName),
            (AwaitProjectName, AwaitTimeNeeded),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn every_state_can_reset_and_retry() {
        for state in FlowState::ALL {
            assert!(state.can_transition_to(FlowState::Initial));
            assert!(state.can_transition_to(state));
        }
    }

    #[test]
    fn invalid_transitions() {
        use FlowState::*;
        // Skip steps
        assert!(!Initial.can_transition_to(AwaitPhone));
        assert!(!CategoryChosen.can_transition_to(AwaitName));
        // Cross branches
        assert!(!AwaitPhone.can_transition_to(AwaitTimeNeeded));
        assert!(!AwaitProjectName.can_transition_to(AwaitName));
        // Go backward without reset
        assert!(!AwaitName.can_transition_to(AwaitPhone));
    }

    #[test]
    fn display_matches_serde() {
        for state in FlowState::ALL {
            let display = format!("{state}");
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(
                format!("\"{display}\""),
                json,
                "Display and serde should match for {state:?}"
            );
        }
    }

    #[test]
    fn default_is_initial() {
        assert_eq!(FlowState::default(), FlowState::Initial);
    }
}
