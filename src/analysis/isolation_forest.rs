//! Seeded isolation forest.
//!
//! Each tree isolates a random subsample by splitting on a random feature
//! at a random threshold. Points that are isolated after few splits get a
//! high anomaly score. The decision threshold is placed at the
//! `contamination` quantile of the training scores, so the expected share
//! of flagged rows matches the configured rate.

use crate::error::DetectError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Model hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Subsample size per tree (capped at the row count).
    pub max_samples: usize,
    /// Expected fraction of outliers, in `[0.0, 0.5]`.
    pub contamination: f64,
    /// RNG seed; identical seeds give identical models.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), DetectError> {
        if !(0.0..=0.5).contains(&self.contamination) {
            return Err(DetectError::InvalidParameter {
                name: "contamination".to_string(),
                reason: format!("must be in [0.0, 0.5], got {}", self.contamination),
            });
        }
        if self.n_estimators == 0 {
            return Err(DetectError::InvalidParameter {
                name: "n_estimators".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_samples == 0 {
            return Err(DetectError::InvalidParameter {
                name: "max_samples".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted isolation forest.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit a forest on a row-major feature matrix.
    pub fn fit(data: &[Vec<f64>], params: &ForestParams) -> Result<Self, DetectError> {
        params.validate()?;

        let rows = data.len();
        let features = data.first().map_or(0, Vec::len);
        if rows == 0 || features == 0 {
            return Err(DetectError::InsufficientData { rows, features });
        }
        if data.iter().any(|row| row.len() != features) {
            return Err(DetectError::InvalidParameter {
                name: "data".to_string(),
                reason: "rows have differing feature counts".to_string(),
            });
        }

        let sample_size = params.max_samples.min(rows);
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let indices = rand::seq::index::sample(&mut rng, rows, sample_size).into_vec();
                build_tree(data, indices, 0, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };

        let scores = forest.score_samples(data);
        forest.offset = percentile(&scores, params.contamination * 100.0);

        debug!(
            "Fitted isolation forest: {} trees, sample size {}, offset {:.4}",
            forest.trees.len(),
            sample_size,
            forest.offset
        );

        Ok(forest)
    }

    /// Negated anomaly score per row: lower means more anomalous.
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Vec<f64> {
        let normalizer = average_path_length(self.sample_size);
        data.iter()
            .map(|row| {
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|tree| path_length(tree, row, 0))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                let score = if normalizer > 0.0 {
                    2f64.powf(-mean_depth / normalizer)
                } else {
                    0.5
                };
                -score
            })
            .collect()
    }

    /// Shifted scores: negative values are outliers.
    pub fn decision_function(&self, data: &[Vec<f64>]) -> Vec<f64> {
        self.score_samples(data)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }

    /// Outlier flag per row.
    pub fn predict(&self, data: &[Vec<f64>]) -> Vec<bool> {
        self.decision_function(data)
            .into_iter()
            .map(|d| d < 0.0)
            .collect()
    }
}

fn build_tree(
    data: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary inside this node can split it.
    let features = data[indices[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..features)
        .filter_map(|feature| {
            let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &i| {
                (acc.0.min(data[i][feature]), acc.1.max(data[i][feature]))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(min..max);

    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| data[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful search in a binary search tree of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in `[0, 100]`.
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
