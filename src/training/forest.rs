use crate::error::{Result, TrainingError};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 20,
            min_samples_split: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f32>,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

/// CART tree stored as a flat node list, root at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_distribution(&self, features: &[f32]) -> &[f32] {
        let mut current = 0;
        loop {
            match &self.nodes[current] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    current = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f32>],
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
    params: &'a ForestParams,
    rng: StdRng,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

impl<'a> TreeBuilder<'a> {
    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let distribution = counts
            .iter()
            .map(|&c| c as f32 / total.max(1) as f32)
            .collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn best_split(&mut self, samples: &[usize], parent_counts: &[usize]) -> Option<BestSplit> {
        let n_features = self.x[0].len();
        // Visit features in random order until `max_features` non-constant ones were tried
        let order = index::sample(&mut self.rng, n_features, n_features);
        let total = samples.len();
        let mut best: Option<BestSplit> = None;
        let mut sorted = samples.to_vec();
        let mut visited = 0;

        for feature in order.iter() {
            if visited >= self.max_features {
                break;
            }
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let first = self.x[sorted[0]][feature];
            let last = self.x[sorted[total - 1]][feature];
            if first >= last {
                continue;
            }
            visited += 1;

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = parent_counts.to_vec();

            for position in 0..total - 1 {
                let sample = sorted[position];
                left_counts[self.y[sample]] += 1;
                right_counts[self.y[sample]] -= 1;

                let current = self.x[sample][feature];
                let next = self.x[sorted[position + 1]][feature];
                if current >= next {
                    continue;
                }

                let n_left = position + 1;
                let n_right = total - n_left;
                let impurity = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / total as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = current + (next - current) / 2.0;
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }

        best
    }

    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&samples);
        let total = samples.len();
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        if pure || depth >= self.params.max_depth || total < self.params.min_samples_split {
            return self.leaf(&counts, total);
        }

        let Some(split) = self.best_split(&samples, &counts) else {
            return self.leaf(&counts, total);
        };
        if split.impurity >= gini(&counts, total) {
            return self.leaf(&counts, total);
        }

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        let node = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.build(left, depth + 1);
        let right = self.build(right, depth + 1);
        self.nodes[node] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }
}

fn fit_tree(
    x: &[Vec<f32>],
    y: &[usize],
    n_classes: usize,
    params: &ForestParams,
    seed: u64,
) -> DecisionTree {
    let n_features = x[0].len();
    let mut rng = StdRng::seed_from_u64(seed);
    let bootstrap: Vec<usize> = (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect();

    let mut builder = TreeBuilder {
        x,
        y,
        n_classes,
        max_features: ((n_features as f64).sqrt() as usize).clamp(1, n_features),
        params,
        rng,
        nodes: Vec::new(),
    };
    builder.build(bootstrap, 0);
    DecisionTree {
        nodes: builder.nodes,
    }
}

/// Bagged CART ensemble with Gini splits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit on `x` (rows of equal width) and class indices `y` in `0..n_classes`.
    ///
    /// Per-tree seeds come from the master seed in order, so the result does
    /// not depend on how rayon schedules the trees.
    pub fn fit(x: &[Vec<f32>], y: &[usize], n_classes: usize, params: &ForestParams) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TrainingError::Fit {
                details: format!("{} rows for {} labels", x.len(), y.len()),
            }
            .into());
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(TrainingError::Fit {
                details: "feature rows must be non-empty and of equal width".to_string(),
            }
            .into());
        }
        if let Some(&bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(TrainingError::Fit {
                details: format!("label index {} outside {} classes", bad, n_classes),
            }
            .into());
        }
        if params.n_trees == 0 {
            return Err(TrainingError::Fit {
                details: "forest needs at least one tree".to_string(),
            }
            .into());
        }

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| master.gen()).collect();

        let trees = seeds
            .par_iter()
            .map(|&seed| fit_tree(x, y, n_classes, params, seed))
            .collect();

        Ok(Self {
            params: params.clone(),
            n_features,
            n_classes,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Mean of the leaf class distributions over all trees
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        let mut proba = vec![0.0f32; self.n_classes];
        for tree in &self.trees {
            for (p, leaf) in proba.iter_mut().zip(tree.leaf_distribution(features)) {
                *p += leaf;
            }
        }
        let n = self.trees.len().max(1) as f32;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Most probable class index; ties go to the lowest index
    pub fn predict(&self, features: &[f32]) -> usize {
        argmax(&self.predict_proba(features))
    }
}

pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> (Vec<Vec<f32>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f32 * 0.01;
            x.push(vec![0.1 + jitter, 0.2 - jitter, 0.5]);
            y.push(0);
            x.push(vec![0.9 - jitter, 0.8 + jitter, 0.5]);
            y.push(1);
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_separates_blobs() {
        let (x, y) = two_blobs();
        let forest = RandomForest::fit(&x, &y, 2, &small_params()).unwrap();

        assert_eq!(forest.predict(&[0.12, 0.18, 0.5]), 0);
        assert_eq!(forest.predict(&[0.88, 0.82, 0.5]), 1);

        let proba = forest.predict_proba(&[0.12, 0.18, 0.5]);
        assert!((proba.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!(proba[0] > 0.5);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = two_blobs();
        let a = RandomForest::fit(&x, &y, 2, &small_params()).unwrap();
        let b = RandomForest::fit(&x, &y, 2, &small_params()).unwrap();

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(RandomForest::fit(&[], &[], 2, &small_params()).is_err());
        assert!(RandomForest::fit(&[vec![1.0], vec![1.0, 2.0]], &[0, 1], 2, &small_params()).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[3], 2, &small_params()).is_err());
    }

    #[test]
    fn test_argmax_prefers_lowest_on_tie() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }
}
