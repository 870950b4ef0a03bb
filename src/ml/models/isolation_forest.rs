//! Isolation Forest implementation
//!
//! Anomaly detection using isolation trees. Anomalies are easier to isolate
//! and thus have shorter path lengths in the trees.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{AnomalyModel, ForestParams, Label, Prediction};
use crate::ml::features::{FeatureVector, NUM_FEATURES};

const EULER_GAMMA: f64 = 0.5772156649;

/// Isolation Forest model for anomaly detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Individual isolation trees
    trees: Vec<IsolationTree>,
    /// Hyperparameters the forest was built with
    params: ForestParams,
    /// Effective sub-sample size used per tree
    sample_size: usize,
    /// Threshold subtracted from raw scores so that `contamination` of the
    /// training data falls below zero
    offset: f64,
    /// Whether the model is trained
    trained: bool,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl IsolationForest {
    /// Create a new, untrained Isolation Forest
    pub fn new(params: ForestParams) -> Self {
        Self {
            trees: Vec::new(),
            params,
            sample_size: 0,
            offset: -0.5,
            trained: false,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Average path length of an unsuccessful BST search (c(n) function)
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

    /// Raw score in [-1, 0]; lower is more anomalous
    pub fn score_samples(&self, sample: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return -0.5;
        }

        let total_path_length: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample.as_slice()))
            .sum();
        let avg_path = total_path_length / self.trees.len() as f64;

        let normalizer = Self::average_path_length(self.sample_size);
        let ratio = if normalizer > 0.0 { avg_path / normalizer } else { 1.0 };

        -(2.0_f64.powf(-ratio))
    }

    /// Shifted score; negative values are outliers
    pub fn decision_function(&self, sample: &FeatureVector) -> f64 {
        self.score_samples(sample) - self.offset
    }
}

impl AnomalyModel for IsolationForest {
    fn fit(&mut self, data: &[FeatureVector]) {
        if data.is_empty() {
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let sample_size = self.params.max_samples.clamp(1, data.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        self.trees.clear();
        self.sample_size = sample_size;

        for _ in 0..self.params.n_estimators {
            // Sample without replacement
            let sample: Vec<&[f64]> = index::sample(&mut rng, data.len(), sample_size)
                .iter()
                .map(|idx| data[idx].as_slice())
                .collect();

            self.trees.push(IsolationTree::build(&sample, max_depth, &mut rng));
        }

        let mut scores: Vec<f64> = data.iter().map(|x| self.score_samples(x)).collect();
        self.offset = percentile(&mut scores, 100.0 * self.params.contamination);
        self.trained = true;
    }

    fn predict(&self, sample: &FeatureVector) -> Prediction {
        let decision_score = self.decision_function(sample);
        let label = if decision_score < 0.0 {
            Label::Outlier
        } else {
            Label::Inlier
        };
        Prediction {
            label,
            decision_score,
        }
    }

    fn name(&self) -> &str {
        "IsolationForest"
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

/// Percentile with linear interpolation between closest ranks
fn percentile(values: &mut [f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)
}

/// A single isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Build an isolation tree from a non-empty sample
    fn build<R: Rng>(samples: &[&[f64]], max_depth: usize, rng: &mut R) -> Self {
        Self {
            root: Self::build_node(samples, 0, max_depth, rng),
        }
    }

    /// Recursively build tree nodes
    fn build_node<R: Rng>(
        samples: &[&[f64]],
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> IsolationNode {
        if depth >= max_depth || samples.len() <= 1 {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        // Only features that still vary can split this node
        let candidates: Vec<(usize, f64, f64)> = (0..NUM_FEATURES)
            .filter_map(|idx| {
                let (min_val, max_val) = samples.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), s| (lo.min(s[idx]), hi.max(s[idx])),
                );
                (max_val > min_val).then_some((idx, min_val, max_val))
            })
            .collect();

        if candidates.is_empty() {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        let (feature_idx, min_val, max_val) = candidates[rng.random_range(0..candidates.len())];
        let split_value = rng.random_range(min_val..max_val);

        let (left_samples, right_samples): (Vec<&[f64]>, Vec<&[f64]>) = samples
            .iter()
            .copied()
            .partition(|s| s[feature_idx] <= split_value);

        let left = Self::build_node(&left_samples, depth + 1, max_depth, rng);
        let right = Self::build_node(&right_samples, depth + 1, max_depth, rng);

        IsolationNode::Internal {
            feature_idx,
            split_value,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Path length for a sample, including the expected remainder at the leaf
    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationNode::Leaf { size } => {
                    return depth as f64 + IsolationForest::average_path_length(*size);
                }
                IsolationNode::Internal {
                    feature_idx,
                    split_value,
                    left,
                    right,
                } => {
                    let val = sample.get(*feature_idx).copied().unwrap_or(0.0);
                    node = if val <= *split_value { &**left } else { &**right };
                    depth += 1;
                }
            }
        }
    }
}

/// Node in an isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    /// Internal node with split
    Internal {
        feature_idx: usize,
        split_value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf node
    Leaf { size: usize },
}
