//! Menu catalog — the static category / sub-category hierarchy.

use serde::{Deserialize, Serialize};

/// Callback key of the collaborator entry ("I do projects").
pub const COLLABORATOR_KEY: &str = "main_collab";

/// Callback key of the synthetic "back to main menu" choice.
pub const BACK_KEY: &str = "back_to_main";

/// Label shown on the synthetic back choice.
pub const BACK_LABEL: &str = "⬅️ بازگشت";

/// A menu key as delivered by the transport (button callback data).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuKey(String);

impl MenuKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the synthetic back choice.
    pub fn is_back(&self) -> bool {
        self.0 == BACK_KEY
    }
}

impl From<&str> for MenuKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl std::fmt::Display for MenuKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One selectable menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub key: MenuKey,
}

impl MenuEntry {
    pub fn new(label: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key: MenuKey::new(key),
        }
    }
}

/// Immutable, process-wide menu data.
#[derive(Debug, Clone)]
pub struct MenuCatalog {
    top_level: Vec<MenuEntry>,
    sub_entries: Vec<(MenuKey, Vec<MenuEntry>)>,
}

impl MenuCatalog {
    /// Build a catalog from explicit data.
    pub fn new(top_level: Vec<MenuEntry>, sub_entries: Vec<(MenuKey, Vec<MenuEntry>)>) -> Self {
        Self {
            top_level,
            sub_entries,
        }
    }

    /// Top-level entries in display order.
    pub fn top_level(&self) -> &[MenuEntry] {
        &self.top_level
    }

    /// Sub-entries for a top-level key; empty if it has no sub-menu.
    pub fn sub_entries_for(&self, key: &MenuKey) -> &[MenuEntry] {
        self.sub_entries
            .iter()
            .find(|(parent, _)| parent == key)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    /// Label for a key, searching top-level then sub-entries.
    /// Unknown keys are their own label.
    pub fn label_for(&self, key: &MenuKey) -> String {
        self.top_level
            .iter()
            .chain(self.sub_entries.iter().flat_map(|(_, entries)| entries.iter()))
            .find(|entry| &entry.key == key)
            .map(|entry| entry.label.clone())
            .unwrap_or_else(|| key.as_str().to_string())
    }

    /// Reverse lookup of a top-level label. Unknown labels are their own key,
    /// mirroring [`label_for`](Self::label_for).
    pub fn key_for_label(&self, label: &str) -> MenuKey {
        self.top_level
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.key.clone())
            .unwrap_or_else(|| MenuKey::new(label))
    }

    pub fn is_collaborator(&self, key: &MenuKey) -> bool {
        key.as_str() == COLLABORATOR_KEY
    }

    /// The synthetic back choice appended to every sub-menu.
    pub fn back_choice(&self) -> MenuEntry {
        MenuEntry::new(BACK_LABEL, BACK_KEY)
    }
}

impl Default for MenuCatalog {
    fn default() -> Self {
        let top_level = vec![
            MenuEntry::new("طراحی سایت", "main_web"),
            MenuEntry::new("تبلیغات هدفمند", "main_ads"),
            MenuEntry::new("طراحی لوگو", "main_logo"),
            MenuEntry::new("ادمین شبکه‌های اجتماعی", "main_admin"),
            MenuEntry::new("انجام میدم (همکار)", COLLABORATOR_KEY),
        ];
        let sub_entries = vec![
            (
                MenuKey::from("main_web"),
                vec![
                    MenuEntry::new("درخواست سایت خدماتی", "sub_web_service"),
                    MenuEntry::new("درخواست سایت فروشگاهی", "sub_web_shop"),
                    MenuEntry::new("درخواست سایت تلفیقی", "sub_web_mix"),
                ],
            ),
            (
                MenuKey::from("main_ads"),
                vec![
                    MenuEntry::new("تبلیغات گوگل ادز", "sub_ads_google"),
                    MenuEntry::new("سایر", "sub_ads_other"),
                ],
            ),
            (
                MenuKey::from("main_logo"),
                vec![
                    MenuEntry::new("لوگو تلفیقی", "sub_logo_combo"),
                    MenuEntry::new("لوگو تایپی", "sub_logo_typo"),
                    MenuEntry::new("لوگو نماد", "sub_logo_icon"),
                ],
            ),
            (
                MenuKey::from("main_admin"),
                vec![
                    MenuEntry::new("اینستا", "sub_admin_instagram"),
                    MenuEntry::new("سایر", "sub_admin_other"),
                ],
            ),
        ];
        Self::new(top_level, sub_entries)
    }
}
