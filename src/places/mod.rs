mod frecency;
mod scorer;

pub use frecency::{calculate_frecency, PlaceEntry, PlacesFrecency, Visit, VisitType};
pub use scorer::{FrecencyScorer, ScoreError};
