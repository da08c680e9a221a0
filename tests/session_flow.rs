use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use frecency_federated::interaction::{
    AwesomeBarState, EventDisposition, EventKind, InteractionObserver, ObservedEvent, Suggestion,
};
use frecency_federated::optimization::{FrecencyOptimizer, FrecencyParam, SharedWeights, WeightVector};
use frecency_federated::places::{PlaceEntry, PlacesFrecency, Visit, VisitType};
use frecency_federated::privacy::PrivacyFlags;
use frecency_federated::study::branch_config;
use frecency_federated::sync::{ArchiveTelemetrySink, ModelSynchronizer, SyncSettings};

fn at(ms: i64, kind: EventKind) -> ObservedEvent {
    let base: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
    ObservedEvent::new(kind, base + chrono::Duration::milliseconds(ms))
}

fn visited(url: &str, visit_type: VisitType) -> PlaceEntry {
    PlaceEntry {
        url: url.to_string(),
        bookmarked: false,
        typed: false,
        visits: vec![Visit {
            visit_type,
            age_days: 1,
        }],
    }
}

fn suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::new("https://a.test/", "favicon"),
        Suggestion::new("https://search.test/?q=b", "action searchengine"),
        Suggestion::new("https://b.test/", "favicon"),
    ]
}

#[tokio::test]
async fn selected_lower_ranked_place_reports_gradient() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("archive.jsonl");

    let places = Arc::new(PlacesFrecency::new());
    places.insert(visited("https://a.test/", VisitType::Typed)).unwrap();
    places.insert(visited("https://b.test/", VisitType::Link)).unwrap();

    let weights = SharedWeights::default();
    let synchronizer = Arc::new(
        ModelSynchronizer::new(
            branch_config("model1").unwrap(),
            SyncSettings {
                request_timeout: Duration::from_secs(1),
                testing: true,
                ..SyncSettings::default()
            },
            weights.clone(),
            places.clone(),
            Arc::new(ArchiveTelemetrySink::new(archive_path.clone())),
        )
        .unwrap(),
    );
    let optimizer = Arc::new(FrecencyOptimizer::new(
        weights.clone(),
        places.clone(),
        synchronizer.clone(),
        1,
    ));
    let observer = InteractionObserver::new(Arc::new(PrivacyFlags::default()), optimizer, None);

    let selected = AwesomeBarState {
        search_string: "b".to_string(),
        search_string_length: 1,
        num_suggestions_displayed: 3,
        suggestions: suggestions(),
        rank_selected: Some(2),
    };
    let updated = AwesomeBarState {
        rank_selected: None,
        ..selected.clone()
    };

    let events = vec![
        at(0, EventKind::Focus).with_state(AwesomeBarState::default()),
        at(100, EventKind::KeyDown).with_key("b"),
        at(300, EventKind::SuggestionsUpdated).with_state(updated),
        at(800, EventKind::SuggestionSelected).with_state(selected),
        at(900, EventKind::Blur),
    ];
    let mut last = EventDisposition::Recorded;
    for event in events {
        last = observer.on_event(event).await.unwrap();
    }
    assert_eq!(last, EventDisposition::ModelUpdated { loss: 1900.0 });

    // stock weights are untouched by the step
    assert_eq!(weights.snapshot().await, WeightVector::default());

    let pings = ArchiveTelemetrySink::new(archive_path).read_all().await.unwrap();
    assert_eq!(pings.len(), 1);
    let ping = &pings[0];
    assert!(ping.testing);

    let payload = &ping.payload;
    assert_eq!(payload.model_version, -1);
    assert_eq!(payload.frecency_scores, vec![2000.0, 100.0]);
    assert_eq!(payload.loss, 1900.0);
    assert_eq!(payload.rank_selected, 2);
    assert_eq!(payload.bookmark_and_history_num_suggestions_displayed, 2);
    assert_eq!(payload.bookmark_and_history_rank_selected, 1);
    assert_eq!(payload.num_key_down_events_at_selecteds_first_entry, 1);
    assert_eq!(payload.time_at_selecteds_first_entry, 300);
    assert_eq!(payload.time_end_interaction, 900);
    assert_eq!(payload.study_variation, "model1");
    assert_eq!(payload.selected_url_was_same_as_search_string, 0);
    assert_eq!(payload.enter_was_pressed, 0);

    let gradient = &payload.update;
    assert_eq!(gradient.len(), FrecencyParam::COUNT);
    assert_eq!(gradient[FrecencyParam::FirstBucketWeight.index()], -19.0);
    assert_eq!(gradient[FrecencyParam::TypedVisitBonus.index()], -1.0);
    assert_eq!(gradient[FrecencyParam::LinkVisitBonus.index()], 1.0);
    assert_eq!(gradient[FrecencyParam::FirstBucketCutoff.index()], 0.0);
}
