//! Optimizer and training configuration.

use serde::{Deserialize, Deserializer, Serialize};

/// Step-size and stopping parameters of the gradient ascent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Initial step length, before normalization by the gradient norm.
    pub alpha: f32,
    /// Armijo slope factor: a step must gain at least `alpha * scale * |grad|^2`.
    pub scale: f32,
    /// Step shrink factor per rejected attempt.
    pub decay: f32,
    /// Outer loops stop once a pass gains less than this relative amount.
    pub rel_improve: f64,
    /// Attempts per line search before the step is abandoned.
    pub max_backtracks: usize,
    /// Upper bound on `converge` rounds.
    pub max_rounds: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            scale: 1e-4,
            decay: 0.5,
            rel_improve: 1e-4,
            max_backtracks: 10,
            max_rounds: 50,
        }
    }
}

/// How affinities are initialized before training.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// Uniform draws from a seeded RNG.
    Random,
    /// Egonets of the highest-degree nodes.
    Neighborhood,
    /// Egonets of locally minimal-conductance nodes.
    #[default]
    MinNeighborhood,
}

/// Everything the `train` driver needs besides file paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of communities `k`.
    pub clusters: usize,
    /// Executor lanes.
    pub threads: usize,
    /// Initialization heuristic.
    pub seeding: SeedStrategy,
    /// RNG seed for [`SeedStrategy::Random`].
    pub seed: u64,
    /// Line-search and stopping parameters. Fields missing from a JSON
    /// `optimizer` block take the training defaults, not the library ones.
    #[serde(deserialize_with = "deserialize_training_optimizer")]
    pub optimizer: OptimizerConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            clusters: 100,
            threads: std::thread::available_parallelism().map_or(1, usize::from),
            seeding: SeedStrategy::MinNeighborhood,
            seed: 0,
            optimizer: training_optimizer(),
        }
    }
}

/// Training starts from long normalized steps with a stricter
/// sufficient-gain slope than the library defaults.
fn training_optimizer() -> OptimizerConfig {
    OptimizerConfig {
        alpha: 100.0,
        scale: 1e-3,
        ..OptimizerConfig::default()
    }
}

/// An `optimizer` block in which every field may be absent.
#[derive(Default, Deserialize)]
#[serde(default)]
struct OptimizerOverrides {
    alpha: Option<f32>,
    scale: Option<f32>,
    decay: Option<f32>,
    rel_improve: Option<f64>,
    max_backtracks: Option<usize>,
    max_rounds: Option<usize>,
}

fn deserialize_training_optimizer<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<OptimizerConfig, D::Error> {
    let given = OptimizerOverrides::deserialize(deserializer)?;
    let base = training_optimizer();
    Ok(OptimizerConfig {
        alpha: given.alpha.unwrap_or(base.alpha),
        scale: given.scale.unwrap_or(base.scale),
        decay: given.decay.unwrap_or(base.decay),
        rel_improve: given.rel_improve.unwrap_or(base.rel_improve),
        max_backtracks: given.max_backtracks.unwrap_or(base.max_backtracks),
        max_rounds: given.max_rounds.unwrap_or(base.max_rounds),
    })
}

impl TrainConfig {
    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns the `serde_json` error for malformed documents.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Serializes to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = TrainConfig::from_json(r#"{"clusters": 4, "seeding": "random", "optimizer": {"decay": 0.25}}"#)
            .unwrap();
        assert_eq!(cfg.clusters, 4);
        assert_eq!(cfg.seeding, SeedStrategy::Random);
        assert_eq!(cfg.optimizer.decay, 0.25);
        assert_eq!(cfg.optimizer.max_backtracks, 10);
        assert_eq!(cfg.optimizer.alpha, 100.0);
        assert_eq!(cfg.optimizer.scale, 1e-3);
    }

    #[test]
    fn library_optimizer_defaults_are_unchanged() {
        let opt: OptimizerConfig = serde_json::from_str(r#"{"max_rounds": 3}"#).unwrap();
        assert_eq!(opt.alpha, 1.0);
        assert_eq!(opt.scale, 1e-4);
        assert_eq!(opt.max_rounds, 3);
    }

    #[test]
    fn json_round_trip() {
        let cfg = TrainConfig {
            threads: 3,
            ..TrainConfig::default()
        };
        let back = TrainConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
