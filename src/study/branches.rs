//! Study branches and weighted assignment.

use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchConfig {
    pub name: String,
    /// Published model followed by this branch; `None` keeps stock weights.
    pub model_number: Option<u32>,
    pub submit_frecency_update: bool,
    pub weight: f64,
}

impl BranchConfig {
    fn new(name: &str, model_number: Option<u32>, submit_frecency_update: bool, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            model_number,
            submit_frecency_update,
            weight,
        }
    }

    pub fn is_control(&self) -> bool {
        self.model_number.is_none()
    }
}

pub fn branch_configs() -> Vec<BranchConfig> {
    vec![
        BranchConfig::new("control", None, false, 0.2),
        BranchConfig::new("model1", Some(1), true, 0.2),
        BranchConfig::new("model2", Some(2), true, 0.2),
        BranchConfig::new("model3-submitting", Some(3), true, 0.1),
        BranchConfig::new("model3-not-submitting", Some(3), false, 0.1),
        BranchConfig::new("model4-submitting", Some(4), true, 0.1),
        BranchConfig::new("model4-not-submitting", Some(4), false, 0.1),
    ]
}

pub fn branch_config(name: &str) -> Option<BranchConfig> {
    branch_configs().into_iter().find(|branch| branch.name == name)
}

/// Picks the branch whose cumulative weight interval holds `roll`, a number
/// in `[0, 1)` scaled to the total weight.
pub fn pick_weighted(branches: &[BranchConfig], roll: f64) -> Option<&BranchConfig> {
    let total: f64 = branches.iter().map(|branch| branch.weight).sum();
    let target = roll.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    for branch in branches {
        cumulative += branch.weight;
        if target < cumulative {
            return Some(branch);
        }
    }
    branches.last()
}

pub fn choose_variation() -> BranchConfig {
    let branches = branch_configs();
    let roll = rand::rng().random::<f64>();
    pick_weighted(&branches, roll)
        .cloned()
        .unwrap_or_else(|| BranchConfig::new("control", None, false, 1.0))
}
