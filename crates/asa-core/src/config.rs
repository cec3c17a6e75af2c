//! Relay configuration and the read-only settings seam.

use crate::conversation::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_PROACTIVE_DELAY_MS: u64 = 3000;
pub const DEFAULT_PRIMARY_COLOR: &str = "#333333";
pub const DEFAULT_AVATAR_ICON: &str = "fas fa-robot";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ASA, a friendly and expert sales assistant for this website. \
Your primary goal is to be proactive, engaging, and helpful. Use the content of the page the user is viewing \
to understand their interests. Start conversations with insightful questions, highlight product benefits, \
answer questions clearly, and gently guide them towards making a purchase. Your tone should be persuasive \
but never pushy. Always aim to provide value and a great customer experience.";

/// Where the widget is auto-inserted.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DisplayRule {
    Everywhere,
    FrontPage,
    Posts,
    Pages,
    Archives,
}

impl DisplayRule {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "everywhere" => Some(Self::Everywhere),
            "front_page" => Some(Self::FrontPage),
            "posts" => Some(Self::Posts),
            "pages" => Some(Self::Pages),
            "archives" => Some(Self::Archives),
            _ => None,
        }
    }
}

/// Kind of page being rendered, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    FrontPage,
    Page,
    Post,
    Archive,
    Other,
}

impl PageKind {
    /// Unknown names count as [`PageKind::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "front_page" => Self::FrontPage,
            "page" => Self::Page,
            "post" => Self::Post,
            "archive" => Self::Archive,
            _ => Self::Other,
        }
    }
}

/// Widget corner.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    #[default]
    Right,
}

/// Full relay configuration, stored as `settings.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub system_prompt: String,
    pub title: String,
    pub subtitle: String,
    pub primary_color: String,
    pub avatar_icon: String,
    pub avatar_image_url: String,
    pub position: Position,
    pub show_credit: bool,
    pub auto_insert: bool,
    /// Raw rule names; unknown names are dropped by [`Settings::sanitized`].
    pub display_types: Vec<String>,
    pub history_limit: usize,
    pub proactive_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            title: String::new(),
            subtitle: String::new(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            avatar_icon: DEFAULT_AVATAR_ICON.to_string(),
            avatar_image_url: String::new(),
            position: Position::Right,
            show_credit: true,
            auto_insert: true,
            display_types: vec!["everywhere".to_string()],
            history_limit: DEFAULT_HISTORY_LIMIT,
            proactive_delay_ms: DEFAULT_PROACTIVE_DELAY_MS,
        }
    }
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn proactive_delay(&self) -> Duration {
        Duration::from_millis(self.proactive_delay_ms)
    }

    /// Parsed display rules, unknown names skipped.
    pub fn display_rules(&self) -> Vec<DisplayRule> {
        self.display_types
            .iter()
            .filter_map(|raw| DisplayRule::parse(raw))
            .collect()
    }

    /// Normalizes admin-supplied values before they are persisted.
    pub fn sanitized(mut self) -> Self {
        self.api_key = self.api_key.trim().to_string();
        self.title = self.title.trim().to_string();
        self.subtitle = self.subtitle.trim().to_string();
        self.avatar_icon = self.avatar_icon.trim().to_string();
        self.avatar_image_url = self.avatar_image_url.trim().to_string();
        self.system_prompt = self.system_prompt.trim().to_string();
        if self.system_prompt.is_empty() {
            self.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        }

        if !is_hex_color(self.primary_color.trim()) {
            self.primary_color = DEFAULT_PRIMARY_COLOR.to_string();
        } else {
            self.primary_color = self.primary_color.trim().to_string();
        }

        self.display_types = self
            .display_types
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| DisplayRule::parse(raw).is_some())
            .map(str::to_string)
            .collect();

        if self.history_limit == 0 {
            self.history_limit = DEFAULT_HISTORY_LIMIT;
        }
        self
    }

    /// Whether the widget is auto-inserted on a page of the given kind.
    pub fn should_display(&self, kind: PageKind) -> bool {
        if !self.auto_insert {
            return false;
        }

        self.display_rules().iter().any(|rule| match rule {
            DisplayRule::Everywhere => true,
            DisplayRule::FrontPage => kind == PageKind::FrontPage,
            DisplayRule::Pages => kind == PageKind::Page,
            DisplayRule::Posts => kind == PageKind::Post,
            DisplayRule::Archives => kind == PageKind::Archive,
        })
    }

    /// Secret-free view handed to the front end.
    pub fn widget_settings(&self) -> WidgetSettings {
        self.widget_settings_for(None)
    }

    /// Like [`Settings::widget_settings`], with `display` resolved for the
    /// page kind. Without a kind the host decides and `display` is true.
    pub fn widget_settings_for(&self, kind: Option<PageKind>) -> WidgetSettings {
        WidgetSettings {
            display: kind.is_none_or(|kind| self.should_display(kind)),
            has_api_key: self.has_api_key(),
            history_limit: self.history_limit,
            proactive_delay_ms: self.proactive_delay_ms,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            primary_color: self.primary_color.clone(),
            avatar_icon: self.avatar_icon.clone(),
            avatar_image_url: self.avatar_image_url.clone(),
            position: self.position,
            show_credit: self.show_credit,
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Public widget configuration. Never carries the API key.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSettings {
    /// Whether the widget should be inserted on the requesting page.
    #[serde(default = "display_by_default")]
    pub display: bool,
    pub has_api_key: bool,
    pub history_limit: usize,
    pub proactive_delay_ms: u64,
    pub title: String,
    pub subtitle: String,
    pub primary_color: String,
    pub avatar_icon: String,
    pub avatar_image_url: String,
    pub position: Position,
    pub show_credit: bool,
}

fn display_by_default() -> bool {
    true
}

/// Read-only access to the relay configuration, consulted per request.
pub trait SettingsProvider: Send + Sync {
    /// Current settings snapshot.
    fn settings(&self) -> Settings;

    fn api_key(&self) -> Option<String> {
        let settings = self.settings();
        settings.has_api_key().then(|| settings.api_key.trim().to_string())
    }

    fn system_prompt(&self) -> String {
        self.settings().system_prompt
    }

    fn history_limit(&self) -> usize {
        self.settings().history_limit
    }

    fn proactive_delay(&self) -> Duration {
        self.settings().proactive_delay()
    }
}

/// Fixed in-memory settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub Settings);

impl StaticSettings {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self(Settings {
            api_key: api_key.into(),
            ..Settings::default()
        })
    }
}

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> Settings {
        self.0.clone()
    }
}
