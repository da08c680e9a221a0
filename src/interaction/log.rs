use super::error::ClassifierError;
use super::types::{EventKind, ObservedEvent};

/// Events observed since the last focus, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ObservedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<ObservedEvent>) -> Self {
        Self { events }
    }

    /// Records `event`. A focus starts a new session, so it clears the log
    /// before being recorded.
    pub fn append(&mut self, event: ObservedEvent) {
        if event.kind == EventKind::Focus {
            self.clear();
        }
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[ObservedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn most_recent<P>(&self, predicate: P) -> Option<&ObservedEvent>
    where
        P: Fn(&ObservedEvent) -> bool,
    {
        self.events.iter().rev().find(|event| predicate(event))
    }

    pub fn all<P>(&self, predicate: P) -> Vec<&ObservedEvent>
    where
        P: Fn(&ObservedEvent) -> bool,
    {
        self.events.iter().filter(|event| predicate(event)).collect()
    }

    /// Index of the first event whose suggestions hold a URL accepted by
    /// `url_predicate`.
    pub fn first_containing<P>(&self, url_predicate: P) -> Result<usize, ClassifierError>
    where
        P: Fn(&str) -> bool,
    {
        self.events
            .iter()
            .position(|event| {
                event.awesome_bar_state.as_ref().is_some_and(|state| {
                    state
                        .suggestions
                        .iter()
                        .any(|suggestion| url_predicate(&suggestion.url))
                })
            })
            .ok_or_else(|| ClassifierError::NotFound("no event lists the URL".to_string()))
    }

    /// The events up to and including the one at which the finally selected
    /// URL first entered the suggestion list.
    pub fn events_at_selecteds_first_entry(&self) -> Result<&[ObservedEvent], ClassifierError> {
        let selection = self
            .most_recent(|event| event.state_of(EventKind::SuggestionSelected).is_some())
            .and_then(|event| event.awesome_bar_state.as_ref())
            .ok_or_else(|| ClassifierError::NotFound("no selection event observed".to_string()))?;

        let selected = selection.selected_suggestion().ok_or(
            ClassifierError::SelectedRankOutOfRange {
                rank: selection.rank_selected,
                len: selection.suggestions.len(),
            },
        )?;

        let index = self
            .first_containing(|url| url == selected.url)
            .map_err(|_| ClassifierError::NoFirstEntryFound(selected.url.clone()))?;
        Ok(&self.events[..=index])
    }
}

/// Key-down events excluding Enter.
pub fn num_key_down_events(events: &[ObservedEvent]) -> usize {
    events
        .iter()
        .filter(|event| event.is_counted_key_down())
        .count()
}
