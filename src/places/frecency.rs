//! Places frecency calculation over an in-memory visit table.
//!
//! Each place keeps its visit list; the score samples the most recent visits,
//! weights each one by its age bucket and its visit-type bonus, and scales the
//! average by the total visit count. Places without visits only earn the
//! unvisited bookmark/typed bonuses.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::scorer::{FrecencyScorer, ScoreError};
use crate::optimization::{FrecencyParam, WeightVector};

/// Number of most recent visits sampled per place.
const MAX_SAMPLED_VISITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    Link,
    Typed,
    Bookmark,
    Embed,
    FramedLink,
    Download,
    RedirectPermanent,
    RedirectTemporary,
    RedirectSource,
    Reload,
    #[serde(other)]
    Other,
}

impl VisitType {
    fn bonus_param(self) -> FrecencyParam {
        match self {
            VisitType::Link => FrecencyParam::LinkVisitBonus,
            VisitType::Typed => FrecencyParam::TypedVisitBonus,
            VisitType::Bookmark => FrecencyParam::BookmarkVisitBonus,
            VisitType::Embed => FrecencyParam::EmbedVisitBonus,
            VisitType::FramedLink => FrecencyParam::FramedLinkVisitBonus,
            VisitType::Download => FrecencyParam::DownloadVisitBonus,
            VisitType::RedirectPermanent => FrecencyParam::PermRedirectVisitBonus,
            VisitType::RedirectTemporary => FrecencyParam::TempRedirectVisitBonus,
            VisitType::RedirectSource => FrecencyParam::RedirectSourceVisitBonus,
            VisitType::Reload => FrecencyParam::ReloadVisitBonus,
            VisitType::Other => FrecencyParam::DefaultVisitBonus,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub visit_type: VisitType,
    /// Age of the visit in days.
    pub age_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceEntry {
    pub url: String,
    #[serde(default)]
    pub bookmarked: bool,
    #[serde(default)]
    pub typed: bool,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

/// Frecency of one place under `weights`.
pub fn calculate_frecency(place: &PlaceEntry, weights: &WeightVector) -> f64 {
    if place.visits.is_empty() {
        // Weights come from the wire unbounded, so sums saturate.
        let mut bonus: i64 = 0;
        if place.bookmarked {
            bonus = bonus.saturating_add(weights.get(FrecencyParam::UnvisitedBookmarkBonus));
        }
        if place.typed {
            bonus = bonus.saturating_add(weights.get(FrecencyParam::UnvisitedTypedBonus));
        }
        let weight = weights.get(FrecencyParam::FirstBucketWeight);
        return (weight as f64 * bonus as f64 / 100.0).ceil();
    }

    let mut sampled: Vec<&Visit> = place.visits.iter().collect();
    sampled.sort_by_key(|visit| visit.age_days);
    sampled.truncate(MAX_SAMPLED_VISITS);

    let points: f64 = sampled
        .iter()
        .map(|visit| {
            let mut bonus = weights.get(visit.visit_type.bonus_param());
            if place.bookmarked && visit.visit_type != VisitType::Bookmark {
                bonus = bonus.saturating_add(weights.get(FrecencyParam::BookmarkVisitBonus));
            }
            bucket_weight(visit.age_days, weights) as f64 * bonus as f64 / 100.0
        })
        .sum();

    let visit_count = place.visits.len() as f64;
    (visit_count * points / sampled.len() as f64).ceil()
}

fn bucket_weight(age_days: u32, weights: &WeightVector) -> i64 {
    let age = i64::from(age_days);
    let buckets = [
        (FrecencyParam::FirstBucketCutoff, FrecencyParam::FirstBucketWeight),
        (FrecencyParam::SecondBucketCutoff, FrecencyParam::SecondBucketWeight),
        (FrecencyParam::ThirdBucketCutoff, FrecencyParam::ThirdBucketWeight),
        (FrecencyParam::FourthBucketCutoff, FrecencyParam::FourthBucketWeight),
    ];
    buckets
        .iter()
        .find(|(cutoff, _)| age <= weights.get(*cutoff))
        .map(|(_, weight)| weights.get(*weight))
        .unwrap_or_else(|| weights.get(FrecencyParam::DefaultBucketWeight))
}

/// Visit table plus the cached frecency column.
#[derive(Default)]
pub struct PlacesFrecency {
    places: RwLock<HashMap<String, PlaceEntry>>,
    cached: RwLock<HashMap<String, f64>>,
}

impl PlacesFrecency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of [`PlaceEntry`]. A missing file yields an empty
    /// table.
    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        let table = Self::new();
        if !path.exists() {
            tracing::info!("No places file at {}, starting empty", path.display());
            return Ok(table);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let entries: Vec<PlaceEntry> = serde_json::from_str(&contents)
            .map_err(|e| ScoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        for entry in entries {
            table.insert(entry)?;
        }
        Ok(table)
    }

    pub fn insert(&self, entry: PlaceEntry) -> Result<(), ScoreError> {
        let mut places = self.places.write().map_err(poisoned)?;
        places.insert(entry.url.clone(), entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.places.read().map(|places| places.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last value written by [`FrecencyScorer::recalculate_all`].
    pub fn cached(&self, url: &str) -> Option<f64> {
        self.cached
            .read()
            .ok()
            .and_then(|cached| cached.get(url).copied())
    }
}

fn poisoned<T>(_: T) -> ScoreError {
    ScoreError::Unavailable("places table lock poisoned".to_string())
}

#[async_trait]
impl FrecencyScorer for PlacesFrecency {
    async fn score(&self, url: &str, weights: &WeightVector) -> Result<f64, ScoreError> {
        let places = self.places.read().map_err(poisoned)?;
        // Unknown URLs have never been visited nor bookmarked.
        Ok(places
            .get(url)
            .map(|place| calculate_frecency(place, weights))
            .unwrap_or(0.0))
    }

    async fn recalculate_all(&self, weights: &WeightVector) -> Result<usize, ScoreError> {
        let fresh: HashMap<String, f64> = {
            let places = self.places.read().map_err(poisoned)?;
            places
                .iter()
                .map(|(url, place)| (url.clone(), calculate_frecency(place, weights)))
                .collect()
        };
        let count = fresh.len();
        *self.cached.write().map_err(poisoned)? = fresh;
        Ok(count)
    }
}
