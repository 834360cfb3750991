//! Inbound events and the parser that maps raw transport input onto them.

use serde::{Deserialize, Serialize};

use super::catalog::MenuKey;

/// An input to the conversation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Entry command: reset and show the main menu.
    Start,
    /// A button press carrying its callback key.
    MenuSelect { key: MenuKey },
    /// Free text typed by the user.
    TextInput { raw: String },
    /// Explicit cancellation.
    Cancel,
}

impl Event {
    pub fn menu(key: impl Into<String>) -> Self {
        Self::MenuSelect {
            key: MenuKey::new(key),
        }
    }

    pub fn text(raw: impl Into<String>) -> Self {
        Self::TextInput { raw: raw.into() }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::MenuSelect { .. } => "menu_select",
            Self::TextInput { .. } => "text_input",
            Self::Cancel => "cancel",
        }
    }
}

/// Parses transport input into events.
pub struct EventParser;

impl EventParser {
    /// Parse a typed message. Returns `None` for commands the flow does not
    /// handle; those are ignored rather than treated as free text.
    pub fn parse(content: &str) -> Option<Event> {
        let trimmed = content.trim();
        if !trimmed.starts_with('/') {
            return Some(Event::text(content));
        }

        let command = trimmed
            .split_whitespace()
            .next()
            .unwrap_or(trimmed)
            .to_lowercase();
        // Group chats address commands as `/start@SomeBot`
        let command = command.split('@').next().unwrap_or_default();

        match command {
            "/start" => Some(Event::Start),
            "/cancel" => Some(Event::Cancel),
            _ => None,
        }
    }

    /// Parse button callback data.
    pub fn callback(data: &str) -> Event {
        Event::menu(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(EventParser::parse("/start"), Some(Event::Start));
        assert_eq!(EventParser::parse("/cancel"), Some(Event::Cancel));
        assert_eq!(EventParser::parse("  /START  "), Some(Event::Start));
        assert_eq!(EventParser::parse("/start@LeadBot"), Some(Event::Start));
        assert_eq!(EventParser::parse("/cancel now"), Some(Event::Cancel));
    }

    #[test]
    fn unknown_commands_are_ignored() {
        assert_eq!(EventParser::parse("/help"), None);
        assert_eq!(EventParser::parse("/"), None);
    }

    #[test]
    fn plain_text_is_kept_raw() {
        assert_eq!(
            EventParser::parse("  0912345678 "),
            Some(Event::text("  0912345678 "))
        );
        assert_eq!(EventParser::parse(""), Some(Event::text("")));
    }

    #[test]
    fn callback_is_menu_select() {
        assert_eq!(
            EventParser::callback("sub_web_shop"),
            Event::menu("sub_web_shop")
        );
    }

    #[test]
    fn event_kind_names() {
        assert_eq!(Event::Start.kind(), "start");
        assert_eq!(Event::menu("x").kind(), "menu_select");
        assert_eq!(Event::text("x").kind(), "text_input");
        assert_eq!(Event::Cancel.kind(), "cancel");
    }
}
