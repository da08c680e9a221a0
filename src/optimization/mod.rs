//! Online adaptation of the frecency weights.
//!
//! - `params`: the ordered parameter set and its stock values
//! - `weights`: the shared weight store and the scoped perturbation guard
//! - `loss`: pairwise hinge loss over scored candidates
//! - `optimizer`: finite-difference gradient step per training example

mod error;
mod loss;
mod optimizer;
mod params;
mod weights;

pub use error::OptimizerError;
pub use loss::{hinge_loss, PairwiseLossEstimator};
pub use optimizer::{FrecencyOptimizer, LocalModelUpdate, UpdateSink, DEFAULT_EPSILON};
pub use params::FrecencyParam;
pub use weights::{Perturbation, SharedWeights, WeightVector};
