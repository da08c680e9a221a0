//! Weight-parameter store shared by the optimizer, the scorer and the model
//! synchronizer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use super::params::FrecencyParam;

/// One integer value per [`FrecencyParam`], stored positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightVector {
    values: [i64; FrecencyParam::COUNT],
}

impl Default for WeightVector {
    fn default() -> Self {
        let mut values = [0; FrecencyParam::COUNT];
        for param in FrecencyParam::ALL {
            values[param.index()] = param.default_value();
        }
        Self { values }
    }
}

impl WeightVector {
    /// Builds a vector from a positional model. Returns `None` when the
    /// length does not match the parameter count.
    pub fn from_model(model: &[i64]) -> Option<Self> {
        let values: [i64; FrecencyParam::COUNT] = model.try_into().ok()?;
        Some(Self { values })
    }

    pub fn get(&self, param: FrecencyParam) -> i64 {
        self.values[param.index()]
    }

    pub fn set(&mut self, param: FrecencyParam, value: i64) {
        self.values[param.index()] = value;
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrecencyParam, i64)> + '_ {
        FrecencyParam::ALL
            .into_iter()
            .map(move |param| (param, self.get(param)))
    }

    /// Pref-name keyed view, for status output.
    pub fn to_prefs(&self) -> BTreeMap<String, i64> {
        self.iter()
            .map(|(param, value)| (param.pref_name(), value))
            .collect()
    }
}

/// The live weight store.
///
/// All reads and writes go through one async mutex. A gradient step holds the
/// guard for its whole perturb-measure-restore sequence and a remote apply
/// takes it to overwrite the vector, so the two never interleave.
#[derive(Clone, Default)]
pub struct SharedWeights {
    inner: Arc<Mutex<WeightVector>>,
}

impl SharedWeights {
    pub fn new(initial: WeightVector) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, WeightVector> {
        self.inner.lock().await
    }

    pub async fn snapshot(&self) -> WeightVector {
        *self.inner.lock().await
    }

    pub async fn get(&self, param: FrecencyParam) -> i64 {
        self.inner.lock().await.get(param)
    }

    pub async fn set(&self, param: FrecencyParam, value: i64) {
        self.inner.lock().await.set(param, value);
    }
}

/// Scoped perturbation of a single parameter.
///
/// The original value is captured on creation and written back when the
/// guard is dropped, including on early return through `?`.
pub struct Perturbation<'a> {
    weights: &'a mut WeightVector,
    param: FrecencyParam,
    original: i64,
}

impl<'a> Perturbation<'a> {
    pub fn begin(weights: &'a mut WeightVector, param: FrecencyParam) -> Self {
        let original = weights.get(param);
        Self {
            weights,
            param,
            original,
        }
    }

    /// Sets the parameter to `original + delta`, saturating at the `i64`
    /// bounds.
    pub fn offset(&mut self, delta: i64) {
        self.weights.set(self.param, self.original.saturating_add(delta));
    }

    pub fn weights(&self) -> &WeightVector {
        self.weights
    }

    pub fn original(&self) -> i64 {
        self.original
    }
}

impl Drop for Perturbation<'_> {
    fn drop(&mut self) {
        self.weights.set(self.param, self.original);
    }
}
