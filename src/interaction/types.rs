//! Raw awesome bar events as delivered by the browser shim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Style tokens marking a suggestion as something other than a bookmark or
/// history entry.
const NON_BOOKMARK_OR_HISTORY_STYLES: [&str; 7] = [
    "switchtab",
    "remotetab",
    "searchengine",
    "visiturl",
    "extension",
    "suggestion",
    "keyword",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Focus,
    Blur,
    KeyDown,
    KeyPress,
    Input,
    SuggestionsHidden,
    SuggestionsUpdated,
    SuggestionSelected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub url: String,
    /// Whitespace separated style tokens.
    #[serde(default)]
    pub style: String,
}

impl Suggestion {
    pub fn new(url: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            style: style.into(),
        }
    }

    pub fn is_bookmark_or_history(&self) -> bool {
        is_bookmark_or_history_style(&self.style)
    }
}

pub fn is_bookmark_or_history_style(style: &str) -> bool {
    !style
        .split_whitespace()
        .any(|token| NON_BOOKMARK_OR_HISTORY_STYLES.contains(&token))
}

/// Popup state attached to focus, blur, input and suggestion events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwesomeBarState {
    #[serde(default)]
    pub search_string: String,
    #[serde(default)]
    pub search_string_length: usize,
    #[serde(default)]
    pub num_suggestions_displayed: usize,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default, deserialize_with = "deserialize_rank")]
    pub rank_selected: Option<usize>,
}

impl AwesomeBarState {
    pub fn contains_url(&self, url: &str) -> bool {
        self.suggestions.iter().any(|suggestion| suggestion.url == url)
    }

    pub fn selected_suggestion(&self) -> Option<&Suggestion> {
        self.rank_selected
            .and_then(|rank| self.suggestions.get(rank))
    }
}

/// Negative ranks are the shim's "nothing selected".
fn deserialize_rank<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|rank| usize::try_from(rank).ok()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_event: Option<KeyEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awesome_bar_state: Option<AwesomeBarState>,
}

impl ObservedEvent {
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            key_event: None,
            awesome_bar_state: None,
        }
    }

    pub fn now(kind: EventKind) -> Self {
        Self::new(kind, Utc::now())
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key_event = Some(KeyEvent { key: key.into() });
        self
    }

    pub fn with_state(mut self, state: AwesomeBarState) -> Self {
        self.awesome_bar_state = Some(state);
        self
    }

    /// The popup state of an event of `kind`, if it carries one.
    pub fn state_of(&self, kind: EventKind) -> Option<&AwesomeBarState> {
        if self.kind == kind {
            self.awesome_bar_state.as_ref()
        } else {
            None
        }
    }

    fn key_is(&self, kind: EventKind, key: &str) -> Option<bool> {
        if self.kind != kind {
            return None;
        }
        self.key_event.as_ref().map(|event| event.key == key)
    }

    /// Key-down events count towards typing effort, except for Enter.
    pub fn is_counted_key_down(&self) -> bool {
        self.key_is(EventKind::KeyDown, "Enter") == Some(false)
    }

    pub fn is_enter_key_press(&self) -> bool {
        self.key_is(EventKind::KeyPress, "Enter") == Some(true)
    }

    pub fn suggests_url(&self, url: &str) -> bool {
        self.awesome_bar_state
            .as_ref()
            .is_some_and(|state| state.contains_url(url))
    }
}
