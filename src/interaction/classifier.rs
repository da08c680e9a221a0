//! Turns a closed session into a single labeled training example.
//!
//! # Outcomes
//!
//! A session ends in exactly one of:
//! 1. a suggestion was selected from the popup
//! 2. suggestions were displayed but none was selected
//! 3. no suggestions were displayed and none was selected
//!
//! Sessions whose focus was not observed (browser startup, or instrumentation
//! enabled mid-interaction) are dropped.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::log::{num_key_down_events, EventLog};
use super::types::{AwesomeBarState, EventKind, ObservedEvent};

const VISIT_URL_ACTION: &str = "moz-action:visiturl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The session's focus predates the observer.
    NoFocus,
    /// No blur closed the session.
    NotClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Dropped(DropReason),
    NoResults,
    UpdatedNoSelection(AwesomeBarState),
    Selected(AwesomeBarState),
}

impl SessionOutcome {
    /// Outcome of a session, by priority: selection, then latest update,
    /// then no results.
    pub fn of(log: &EventLog) -> Self {
        if focus_event(log).is_none() {
            return SessionOutcome::Dropped(DropReason::NoFocus);
        }
        if blur_event(log).is_none() {
            return SessionOutcome::Dropped(DropReason::NotClosed);
        }
        if let Some(state) = latest_state(log, EventKind::SuggestionSelected) {
            return SessionOutcome::Selected(state.clone());
        }
        if let Some(state) = latest_state(log, EventKind::SuggestionsUpdated) {
            return SessionOutcome::UpdatedNoSelection(state.clone());
        }
        SessionOutcome::NoResults
    }
}

/// Features of one interaction. Fields that only apply when a suggestion
/// was selected are `None` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub num_suggestions_displayed: usize,
    pub rank_selected: Option<usize>,
    pub bookmark_history_urls: Vec<String>,
    pub bookmark_history_rank_selected: Option<usize>,
    pub num_key_down_at_first_entry: Option<usize>,
    pub num_key_down_total: usize,
    pub interaction_duration_ms: i64,
    pub time_to_first_entry_ms: Option<i64>,
    pub search_string_length: usize,
    pub selected_style: Option<String>,
    pub url_matched_search_string: Option<bool>,
    pub enter_pressed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Dropped(DropReason),
    Example(TrainingExample),
}

pub struct InteractionClassifier;

impl InteractionClassifier {
    pub fn classify(log: &EventLog) -> Result<Classification, ClassifierError> {
        let outcome = SessionOutcome::of(log);
        let (focus, blur) = match (&outcome, focus_event(log), blur_event(log)) {
            (SessionOutcome::Dropped(reason), _, _) => return Ok(Classification::Dropped(*reason)),
            (_, Some(focus), Some(blur)) => (focus, blur),
            (_, None, _) => return Ok(Classification::Dropped(DropReason::NoFocus)),
            (_, _, None) => return Ok(Classification::Dropped(DropReason::NotClosed)),
        };

        let focus_at = focus.timestamp;
        let interaction_duration_ms = millis_between(focus_at, blur.timestamp);
        let num_key_down_total = num_key_down_events(log.events());
        let enter_pressed = log.events().iter().any(ObservedEvent::is_enter_key_press);

        let example = match outcome {
            SessionOutcome::Selected(state) => {
                let selected = state.selected_suggestion().ok_or(
                    ClassifierError::SelectedRankOutOfRange {
                        rank: state.rank_selected,
                        len: state.suggestions.len(),
                    },
                )?;
                let bookmark_history_urls = bookmark_history_urls(&state);
                let bookmark_history_rank_selected = bookmark_history_urls
                    .iter()
                    .position(|url| *url == selected.url);

                let first_entry = log.events_at_selecteds_first_entry()?;
                let entered_at = first_entry
                    .last()
                    .map(|event| event.timestamp)
                    .ok_or_else(|| ClassifierError::NoFirstEntryFound(selected.url.clone()))?;

                TrainingExample {
                    num_suggestions_displayed: state.num_suggestions_displayed,
                    rank_selected: state.rank_selected,
                    bookmark_history_rank_selected,
                    num_key_down_at_first_entry: Some(num_key_down_events(first_entry)),
                    num_key_down_total,
                    interaction_duration_ms,
                    time_to_first_entry_ms: Some(millis_between(focus_at, entered_at)),
                    search_string_length: state.search_string_length,
                    selected_style: Some(selected.style.clone()),
                    url_matched_search_string: Some(selected_url_was_same_as_search_string(
                        &state.search_string,
                        &selected.url,
                    )),
                    enter_pressed,
                    bookmark_history_urls,
                }
            }
            SessionOutcome::UpdatedNoSelection(state) => TrainingExample {
                num_suggestions_displayed: state.num_suggestions_displayed,
                rank_selected: None,
                bookmark_history_urls: bookmark_history_urls(&state),
                bookmark_history_rank_selected: None,
                num_key_down_at_first_entry: None,
                num_key_down_total,
                interaction_duration_ms,
                time_to_first_entry_ms: None,
                search_string_length: state.search_string_length,
                selected_style: None,
                url_matched_search_string: None,
                enter_pressed,
            },
            SessionOutcome::NoResults => TrainingExample {
                num_suggestions_displayed: 0,
                rank_selected: None,
                bookmark_history_urls: Vec::new(),
                bookmark_history_rank_selected: None,
                num_key_down_at_first_entry: None,
                num_key_down_total,
                interaction_duration_ms,
                time_to_first_entry_ms: None,
                search_string_length: focus
                    .awesome_bar_state
                    .as_ref()
                    .map(|state| state.search_string_length)
                    .unwrap_or(0),
                selected_style: None,
                url_matched_search_string: None,
                enter_pressed,
            },
            SessionOutcome::Dropped(reason) => return Ok(Classification::Dropped(reason)),
        };

        Ok(Classification::Example(example))
    }
}

fn focus_event(log: &EventLog) -> Option<&ObservedEvent> {
    log.most_recent(|event| event.state_of(EventKind::Focus).is_some())
}

fn blur_event(log: &EventLog) -> Option<&ObservedEvent> {
    log.most_recent(|event| event.kind == EventKind::Blur)
}

fn latest_state(log: &EventLog, kind: EventKind) -> Option<&AwesomeBarState> {
    log.most_recent(|event| event.state_of(kind).is_some())
        .and_then(|event| event.awesome_bar_state.as_ref())
}

fn bookmark_history_urls(state: &AwesomeBarState) -> Vec<String> {
    state
        .suggestions
        .iter()
        .filter(|suggestion| suggestion.is_bookmark_or_history())
        .map(|suggestion| suggestion.url.clone())
        .collect()
}

fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}

fn protocol_prefix() -> &'static Regex {
    static PROTOCOL: OnceLock<Regex> = OnceLock::new();
    PROTOCOL.get_or_init(|| Regex::new(r"^(\w+:)?//").expect("valid protocol pattern"))
}

/// Normalizes a search string or URL for comparison: unwraps visit-url
/// actions, drops the protocol and one trailing slash, lowercases.
pub fn normalize_for_comparison(raw: &str) -> String {
    let unwrapped = unwrap_visit_url(raw).unwrap_or_else(|| raw.to_string());
    let without_protocol = protocol_prefix().replace(&unwrapped, "");
    let without_slash = without_protocol
        .strip_suffix('/')
        .unwrap_or(without_protocol.as_ref());
    without_slash.to_lowercase()
}

/// `moz-action:visiturl,{"url":"http%3A%2F%2Fexample.com%2F",...}` carries
/// the URL-encoded target in its JSON payload.
fn unwrap_visit_url(raw: &str) -> Option<String> {
    let metadata = raw.strip_prefix(VISIT_URL_ACTION)?;
    let json = metadata.get(1..)?;
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!("Unparseable visiturl action metadata: {}", err);
            return None;
        }
    };
    let encoded = value.get("url")?.as_str()?;
    urlencoding::decode(encoded).ok().map(|url| url.into_owned())
}

pub fn selected_url_was_same_as_search_string(search_string: &str, selected_url: &str) -> bool {
    normalize_for_comparison(search_string) == normalize_for_comparison(selected_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_and_trailing_slash_are_ignored() {
        assert!(selected_url_was_same_as_search_string("example.com", "http://example.com/"));
        assert!(selected_url_was_same_as_search_string("Example.COM", "https://example.com"));
        assert!(selected_url_was_same_as_search_string("//example.com/", "example.com"));
    }

    #[test]
    fn different_hosts_do_not_match() {
        assert!(!selected_url_was_same_as_search_string("example.com", "http://example.org/"));
        assert!(!selected_url_was_same_as_search_string("example.com/a", "http://example.com/"));
    }

    #[test]
    fn visit_url_action_is_unwrapped() {
        let action = r#"moz-action:visiturl,{"url":"http%3A%2F%2Fexample.com%2F","input":"example.com"}"#;
        assert!(selected_url_was_same_as_search_string("example.com", action));
        assert_eq!(normalize_for_comparison(action), "example.com");
    }

    #[test]
    fn malformed_visit_url_action_is_compared_verbatim() {
        let action = "moz-action:visiturl,not-json";
        assert_eq!(normalize_for_comparison(action), action);
    }

    #[test]
    fn only_one_trailing_slash_is_stripped() {
        assert_eq!(normalize_for_comparison("http://example.com//"), "example.com/");
    }
}
