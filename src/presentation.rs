//! Rendering of engine outcomes into outbound messages.

use crate::channels::{Button, OutgoingResponse};
use crate::flow::record::MISSING_FIELD;
use crate::flow::{Field, LeadKind, LeadRecord, MenuEntry, Outcome, Prompt, PromptStep};

/// Choices per keyboard row.
const CHOICES_PER_ROW: usize = 2;

const GREETING: &str = "سلام 👋 یکی از گزینه‌ها را انتخاب کنید:";
const CANCELLED: &str = "لغو شد ❌";
const NEW_REQUEST: &str = "می‌تونی درخواست جدید ثبت کنی:";
const CONTINUE_FROM_MENU: &str = "می‌تونی از منوی زیر ادامه بدی:";

/// Turns [`Outcome`]s into [`OutgoingResponse`]s.
#[derive(Debug, Clone)]
pub struct Presenter {
    site_url: String,
}

impl Presenter {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
        }
    }

    /// Render one outcome. `replying_to_button` marks outcomes triggered by a
    /// button press; their prompts replace the message that held the button.
    pub fn render(&self, outcome: &Outcome, replying_to_button: bool) -> Vec<OutgoingResponse> {
        match outcome {
            Outcome::Prompt(prompt) => {
                let response = render_prompt(prompt, prompt_text(prompt));
                if replying_to_button {
                    vec![response.replacing_previous()]
                } else {
                    vec![response]
                }
            }
            Outcome::Completed { record, follow_up } => {
                let follow_up_text = match record.kind {
                    LeadKind::Service => NEW_REQUEST,
                    LeadKind::Collaborator => CONTINUE_FROM_MENU,
                };
                vec![
                    self.confirmation(record),
                    render_prompt(follow_up, follow_up_text.to_string()),
                ]
            }
            Outcome::Cancelled => vec![OutgoingResponse::text(CANCELLED)],
        }
    }

    fn confirmation(&self, record: &LeadRecord) -> OutgoingResponse {
        let value = |field| record.get(field).unwrap_or(MISSING_FIELD);
        let (content, button_label) = match record.kind {
            LeadKind::Service => (
                format!(
                    "درخواست شما ثبت شد ✅\nبه زودی با شما تماس می‌گیریم.\n\n\
                     **دسته:** {}\n**خدمت:** {}\n**نام:** {}\n**شماره:** {}",
                    value(Field::Category),
                    value(Field::Service),
                    value(Field::Name),
                    value(Field::Phone),
                ),
                "🌐 وب‌سایت ما",
            ),
            LeadKind::Collaborator => (
                format!(
                    "✅ اطلاعات شما ثبت شد.\n\n**نام پروژه:** {}\n**زمان موردنیاز:** {}",
                    value(Field::ProjectName),
                    value(Field::TimeNeeded),
                ),
                "🌐 مشاهده سایت",
            ),
        };

        OutgoingResponse::text(content)
            .markdown()
            .with_buttons(vec![vec![Button::url(button_label, &self.site_url)]])
    }
}

/// Text for a prompt, or its rejection notice when re-issued.
fn prompt_text(prompt: &Prompt) -> String {
    let rejected = prompt.rejected.is_some();
    match &prompt.step {
        PromptStep::MainMenu => GREETING.to_string(),
        PromptStep::SubMenu { category } => {
            format!("✅ انتخاب شد: {category}\nیکی از زیرگزینه‌ها را انتخاب کنید:")
        }
        PromptStep::AskPhone if rejected => {
            "شماره معتبر نیست. دوباره وارد کن (مثلاً 0912... یا +98 ...)".to_string()
        }
        PromptStep::AskPhone => "📱 شمارهٔ خود را وارد کنید (مثلاً 0912... یا +98):".to_string(),
        PromptStep::AskName if rejected => "نام خیلی کوتاهه. دوباره وارد کن.".to_string(),
        PromptStep::AskName => "👤 نام خود را وارد کنید:".to_string(),
        PromptStep::AskProjectName if rejected => "نام پروژه معتبر نیست. دوباره وارد کن:".to_string(),
        PromptStep::AskProjectName => "🧩 نام پروژه را وارد کنید:".to_string(),
        PromptStep::AskTimeNeeded if rejected => "زمان معتبر نیست. دوباره وارد کن:".to_string(),
        PromptStep::AskTimeNeeded => {
            "⏱️ زمان موردنیاز (مثلاً 3 روز، 1 هفته) را وارد کنید:".to_string()
        }
    }
}

fn render_prompt(prompt: &Prompt, content: String) -> OutgoingResponse {
    OutgoingResponse::text(content).with_buttons(keyboard(&prompt.choices))
}

/// Lay choices out two per row, with the back choice alone on the last row.
fn keyboard(choices: &[MenuEntry]) -> Vec<Vec<Button>> {
    let (back, regular): (Vec<&MenuEntry>, Vec<&MenuEntry>) =
        choices.iter().partition(|entry| entry.key.is_back());

    let mut rows: Vec<Vec<Button>> = regular
        .chunks(CHOICES_PER_ROW)
        .map(|chunk| chunk.iter().map(|entry| button(entry)).collect())
        .collect();
    if !back.is_empty() {
        rows.push(back.into_iter().map(button).collect());
    }
    rows
}

fn button(entry: &MenuEntry) -> Button {
    Button::callback(entry.label.clone(), entry.key.as_str())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::channels::ButtonAction;
    use crate::flow::{ConversationEngine, Event, MenuCatalog, SessionId, SessionStore};

    fn presenter() -> Presenter {
        Presenter::new("https://designeryas.com")
    }

    fn engine() -> ConversationEngine {
        ConversationEngine::new(
            Arc::new(SessionStore::new()),
            Arc::new(MenuCatalog::default()),
        )
    }

    fn callback_rows(response: &OutgoingResponse) -> Vec<Vec<&str>> {
        response
            .buttons
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| match &b.action {
                        ButtonAction::Callback(data) => data.as_str(),
                        ButtonAction::Url(url) => url.as_str(),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn main_menu_is_two_per_row() {
        let outcome = Outcome::Prompt(Prompt::main_menu(&MenuCatalog::default()));
        let responses = presenter().render(&outcome, false);

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].content, GREETING);
        assert!(!responses[0].replace_previous);
        assert_eq!(
            callback_rows(&responses[0]),
            vec![
                vec!["main_web", "main_ads"],
                vec!["main_logo", "main_admin"],
                vec!["main_collab"],
            ]
        );
    }

    #[test]
    fn sub_menu_puts_back_on_its_own_row() {
        let engine = engine();
        let id = SessionId::from("t:1");
        let outcome = engine.handle(&id, Event::menu("main_web"));
        let responses = presenter().render(&outcome, true);

        let response = &responses[0];
        assert!(response.replace_previous);
        assert_eq!(
            response.content,
            "✅ انتخاب شد: طراحی سایت\nیکی از زیرگزینه‌ها را انتخاب کنید:"
        );
        assert_eq!(
            callback_rows(response),
            vec![
                vec!["sub_web_service", "sub_web_shop"],
                vec!["sub_web_mix"],
                vec!["back_to_main"],
            ]
        );
    }

    #[test]
    fn unknown_category_shows_only_back() {
        let engine = engine();
        let id = SessionId::from("t:1");
        let outcome = engine.handle(&id, Event::menu("main_mystery"));
        let responses = presenter().render(&outcome, true);
        assert_eq!(callback_rows(&responses[0]), vec![vec!["back_to_main"]]);
    }

    #[test]
    fn rejection_uses_retry_copy() {
        let engine = engine();
        let id = SessionId::from("t:1");
        engine.handle(&id, Event::menu("main_web"));
        engine.handle(&id, Event::menu("sub_web_shop"));

        let outcome = engine.handle(&id, Event::text("123"));
        let responses = presenter().render(&outcome, false);
        assert_eq!(
            responses[0].content,
            "شماره معتبر نیست. دوباره وارد کن (مثلاً 0912... یا +98 ...)"
        );
        assert!(responses[0].buttons.is_empty());
    }

    #[test]
    fn service_completion_renders_confirmation_and_menu() {
        let engine = engine();
        let id = SessionId::from("t:1");
        engine.handle(&id, Event::menu("main_web"));
        engine.handle(&id, Event::menu("sub_web_shop"));
        engine.handle(&id, Event::text("0912345678"));
        let outcome = engine.handle(&id, Event::text("Ali"));

        let responses = presenter().render(&outcome, false);
        assert_eq!(responses.len(), 2);

        let confirmation = &responses[0];
        assert!(confirmation.markdown);
        assert!(confirmation.content.contains("**دسته:** طراحی سایت"));
        assert!(confirmation.content.contains("**خدمت:** درخواست سایت فروشگاهی"));
        assert!(confirmation.content.contains("**نام:** Ali"));
        assert!(confirmation.content.contains("**شماره:** 0912345678"));
        assert_eq!(
            confirmation.buttons,
            vec![vec![Button::url("🌐 وب‌سایت ما", "https://designeryas.com")]]
        );

        assert_eq!(responses[1].content, NEW_REQUEST);
        assert_eq!(responses[1].buttons.len(), 3);
    }

    #[test]
    fn collaborator_completion_uses_its_own_copy() {
        let engine = engine();
        let id = SessionId::from("t:2");
        engine.handle(&id, Event::menu("main_collab"));
        engine.handle(&id, Event::text("Logo X"));
        let outcome = engine.handle(&id, Event::text("3 روز"));

        let responses = presenter().render(&outcome, false);
        assert!(responses[0].content.starts_with("✅ اطلاعات شما ثبت شد."));
        assert!(responses[0].content.contains("**نام پروژه:** Logo X"));
        assert!(responses[0].content.contains("**زمان موردنیاز:** 3 روز"));
        assert_eq!(responses[0].buttons[0][0].text, "🌐 مشاهده سایت");
        assert_eq!(responses[1].content, CONTINUE_FROM_MENU);
    }

    #[test]
    fn cancel_is_a_bare_acknowledgement() {
        let responses = presenter().render(&Outcome::Cancelled, false);
        assert_eq!(responses, vec![OutgoingResponse::text(CANCELLED)]);
    }
}
