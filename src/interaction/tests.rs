use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;
use crate::optimization::{FrecencyOptimizer, LocalModelUpdate, SharedWeights, UpdateSink};
use crate::places::PlacesFrecency;
use crate::privacy::PrivacyFlags;
use crate::sync::SyncError;

#[derive(Default)]
struct RecordingSink {
    updates: Mutex<Vec<LocalModelUpdate>>,
}

impl RecordingSink {
    fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    fn last(&self) -> LocalModelUpdate {
        self.updates.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl UpdateSink for RecordingSink {
    async fn on_local_model_update(&self, update: &LocalModelUpdate) -> Result<(), SyncError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap()
}

fn at(ms: i64, kind: EventKind) -> ObservedEvent {
    ObservedEvent::new(kind, base() + Duration::milliseconds(ms))
}

fn bar_state(search: &str, suggestions: Vec<Suggestion>) -> AwesomeBarState {
    AwesomeBarState {
        search_string: search.to_string(),
        search_string_length: search.len(),
        num_suggestions_displayed: suggestions.len(),
        suggestions,
        rank_selected: None,
    }
}

fn mixed_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::new("https://search.test/?q=foo", "action searchengine heuristic"),
        Suggestion::new("https://tab.test/", "action switchtab"),
        Suggestion::new("https://foo.com/", "favicon"),
        Suggestion::new("https://remote.test/", "action remotetab"),
        Suggestion::new("https://ext.test/", "action extension"),
    ]
}

fn selection_session() -> EventLog {
    let mut selected = bar_state("foo.com", mixed_suggestions());
    selected.rank_selected = Some(2);

    EventLog::from_events(vec![
        at(0, EventKind::Focus).with_state(bar_state("", vec![])),
        at(100, EventKind::KeyDown).with_key("f"),
        at(150, EventKind::Input).with_state(bar_state("f", vec![])),
        at(400, EventKind::SuggestionsUpdated).with_state(bar_state("f", mixed_suggestions())),
        at(500, EventKind::KeyDown).with_key("o"),
        at(600, EventKind::KeyDown).with_key("Enter"),
        at(610, EventKind::KeyPress).with_key("Enter"),
        at(700, EventKind::SuggestionSelected).with_state(selected),
        at(1_200, EventKind::Blur).with_state(bar_state("foo.com", vec![])),
    ])
}

fn example_of(log: &EventLog) -> TrainingExample {
    match InteractionClassifier::classify(log).unwrap() {
        Classification::Example(example) => example,
        other => panic!("expected a training example, got {:?}", other),
    }
}

#[test]
fn selection_keeps_only_bookmark_and_history_candidates() {
    let example = example_of(&selection_session());

    assert_eq!(example.num_suggestions_displayed, 5);
    assert_eq!(example.rank_selected, Some(2));
    assert_eq!(example.bookmark_history_urls, vec!["https://foo.com/".to_string()]);
    assert_eq!(example.bookmark_history_rank_selected, Some(0));
    assert_eq!(example.selected_style.as_deref(), Some("favicon"));
    assert_eq!(example.url_matched_search_string, Some(true));
    assert!(example.enter_pressed);
}

#[test]
fn selection_timings_and_key_counts() {
    let example = example_of(&selection_session());

    assert_eq!(example.interaction_duration_ms, 1_200);
    assert_eq!(example.time_to_first_entry_ms, Some(400));
    assert_eq!(example.num_key_down_at_first_entry, Some(1));
    // Enter is not counted as typing effort
    assert_eq!(example.num_key_down_total, 2);
    assert_eq!(example.search_string_length, 7);
}

#[test]
fn selected_non_history_suggestion_has_no_candidate_rank() {
    let mut selected = bar_state("foo", mixed_suggestions());
    selected.rank_selected = Some(0);
    let log = EventLog::from_events(vec![
        at(0, EventKind::Focus).with_state(bar_state("", vec![])),
        at(300, EventKind::SuggestionsUpdated).with_state(bar_state("foo", mixed_suggestions())),
        at(500, EventKind::SuggestionSelected).with_state(selected),
        at(900, EventKind::Blur),
    ]);

    let example = example_of(&log);
    assert_eq!(example.rank_selected, Some(0));
    assert_eq!(example.bookmark_history_rank_selected, None);
    assert_eq!(example.url_matched_search_string, Some(false));
}

#[test]
fn update_without_selection_uses_latest_update() {
    let log = EventLog::from_events(vec![
        at(0, EventKind::Focus).with_state(bar_state("", vec![])),
        at(100, EventKind::KeyDown).with_key("f"),
        at(300, EventKind::SuggestionsUpdated).with_state(bar_state(
            "f",
            vec![Suggestion::new("https://old.test/", "favicon")],
        )),
        at(400, EventKind::KeyDown).with_key("o"),
        at(600, EventKind::SuggestionsUpdated).with_state(bar_state("fo", mixed_suggestions())),
        at(2_000, EventKind::Blur),
    ]);

    let example = example_of(&log);
    assert_eq!(example.num_suggestions_displayed, 5);
    assert_eq!(example.rank_selected, None);
    assert_eq!(example.bookmark_history_urls, vec!["https://foo.com/".to_string()]);
    assert_eq!(example.bookmark_history_rank_selected, None);
    assert_eq!(example.num_key_down_total, 2);
    assert_eq!(example.search_string_length, 2);
    assert_eq!(example.interaction_duration_ms, 2_000);
    assert_eq!(example.time_to_first_entry_ms, None);
    assert!(!example.enter_pressed);
}

#[test]
fn no_results_session() {
    let log = EventLog::from_events(vec![
        at(0, EventKind::Focus).with_state(bar_state("abc", vec![])),
        at(800, EventKind::Blur),
    ]);

    let example = example_of(&log);
    assert_eq!(example.num_suggestions_displayed, 0);
    assert!(example.bookmark_history_urls.is_empty());
    assert_eq!(example.search_string_length, 3);
    assert_eq!(example.interaction_duration_ms, 800);
}

#[test]
fn session_without_focus_is_dropped() {
    let log = EventLog::from_events(vec![
        at(0, EventKind::KeyDown).with_key("f"),
        at(200, EventKind::Blur),
    ]);
    assert_eq!(SessionOutcome::of(&log), SessionOutcome::Dropped(DropReason::NoFocus));
    assert_eq!(
        InteractionClassifier::classify(&log).unwrap(),
        Classification::Dropped(DropReason::NoFocus)
    );
}

#[test]
fn selection_rank_beyond_list_is_an_error() {
    let mut selected = bar_state("foo", vec![]);
    selected.rank_selected = Some(0);
    let log = EventLog::from_events(vec![
        at(0, EventKind::Focus).with_state(bar_state("", vec![])),
        at(500, EventKind::SuggestionSelected).with_state(selected),
        at(900, EventKind::Blur),
    ]);
    assert!(matches!(
        InteractionClassifier::classify(&log),
        Err(ClassifierError::SelectedRankOutOfRange { rank: Some(0), len: 0 })
    ));
}

fn observer_with(flags: Arc<PrivacyFlags>) -> (InteractionObserver, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let optimizer = Arc::new(FrecencyOptimizer::new(
        SharedWeights::default(),
        Arc::new(PlacesFrecency::new()),
        sink.clone(),
        1,
    ));
    (InteractionObserver::new(flags, optimizer, None), sink)
}

#[tokio::test]
async fn observer_trains_once_per_closed_session() {
    let (observer, sink) = observer_with(Arc::new(PrivacyFlags::default()));

    let mut last = EventDisposition::Recorded;
    for event in selection_session().events().iter().cloned() {
        last = observer.on_event(event).await.unwrap();
    }

    assert_eq!(last, EventDisposition::ModelUpdated { loss: 0.0 });
    assert_eq!(sink.count(), 1);
    let update = sink.last();
    assert_eq!(update.example.bookmark_history_rank_selected, Some(0));
    assert_eq!(update.gradient.len(), crate::optimization::FrecencyParam::COUNT);
}

#[tokio::test]
async fn observer_drops_sessions_without_focus() {
    let (observer, sink) = observer_with(Arc::new(PrivacyFlags::default()));

    observer.on_event(at(0, EventKind::KeyDown).with_key("f")).await.unwrap();
    let disposition = observer.on_event(at(100, EventKind::Blur)).await.unwrap();

    assert_eq!(
        disposition,
        EventDisposition::SessionDropped { reason: DropReason::NoFocus }
    );
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn private_browsing_events_are_not_recorded() {
    let flags = Arc::new(PrivacyFlags::default());
    let (observer, sink) = observer_with(flags.clone());

    observer
        .on_event(at(0, EventKind::Focus).with_state(bar_state("", vec![])))
        .await
        .unwrap();
    observer.on_event(at(50, EventKind::KeyDown).with_key("a")).await.unwrap();
    assert_eq!(observer.session_len().await, 2);

    flags.set_private_window_open(true);
    let disposition = observer
        .on_event(at(100, EventKind::Focus).with_state(bar_state("", vec![])))
        .await
        .unwrap();
    assert_eq!(disposition, EventDisposition::DroppedPrivate);
    // the focus still discards the previous session
    assert_eq!(observer.session_len().await, 0);

    let disposition = observer.on_event(at(200, EventKind::Blur)).await.unwrap();
    assert_eq!(disposition, EventDisposition::DroppedPrivate);
    assert_eq!(sink.count(), 0);
}
