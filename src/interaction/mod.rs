//! Awesome bar interaction capture and classification.

mod classifier;
mod error;
mod log;
mod observer;
mod types;

#[cfg(test)]
mod tests;

pub use classifier::{
    normalize_for_comparison, selected_url_was_same_as_search_string, Classification, DropReason,
    InteractionClassifier, SessionOutcome, TrainingExample,
};
pub use error::{ClassifierError, ObserverError};
pub use log::{num_key_down_events, EventLog};
pub use observer::{EventDisposition, InteractionObserver};
pub use types::{
    is_bookmark_or_history_style, AwesomeBarState, EventKind, KeyEvent, ObservedEvent, Suggestion,
};
