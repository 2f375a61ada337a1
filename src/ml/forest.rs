//! Bagged ensemble of CART decision trees.
//!
//! Each tree is grown on a bootstrap sample with Gini impurity, considering
//! `sqrt(n_features)` randomly chosen features per split (more are visited
//! only while no valid split has been found). Leaves store class frequencies;
//! the forest probability is the mean over trees. Feature importance is the
//! mean decrease in impurity, normalized per tree and then across the forest.
//!
//! Per-tree seeds are drawn sequentially from the master seed before the
//! trees are grown in parallel, so a given seed always yields the same forest.

use crate::error::{AppError, Result};
use crate::ml::features::{Label, N_CLASSES};
use crate::ml::models::TrainingConfig;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const IMPURITY_EPSILON: f64 = 1e-12;
const PROBA_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        proba: [f64; N_CLASSES],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single fitted tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_proba(&self, row: ArrayView1<'_, f64>) -> [f64; N_CLASSES] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Random forest binary classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit a forest on `x` (n_samples × n_features) and labels `y`
    pub fn fit(x: &Array2<f64>, y: &[Label], config: &TrainingConfig) -> Result<Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(AppError::Training("empty training set".to_string()));
        }
        if y.len() != n_samples {
            return Err(AppError::Training(format!(
                "{} labels for {} rows",
                y.len(),
                n_samples
            )));
        }
        if let Some(bad) = y.iter().find(|&&label| label >= N_CLASSES) {
            return Err(AppError::Training(format!("label {} is not binary", bad)));
        }
        if config.n_estimators == 0 {
            return Err(AppError::Training("n_estimators must be positive".to_string()));
        }

        let max_features = ((n_features as f64).sqrt() as usize).max(1);
        let mut master = StdRng::seed_from_u64(config.seed);
        let seeds: Vec<u64> = (0..config.n_estimators).map(|_| master.gen()).collect();

        let grown: Vec<(DecisionTree, Vec<f64>)> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut rows: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut builder = TreeBuilder {
                    x,
                    y,
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split.max(2),
                    max_features,
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                };
                builder.build(&mut rows, 0, &mut rng);
                (
                    DecisionTree {
                        nodes: builder.nodes,
                    },
                    builder.importances,
                )
            })
            .collect();

        let mut trees = Vec::with_capacity(grown.len());
        let mut summed = vec![0.0; n_features];
        let mut contributing = 0usize;
        for (tree, raw) in grown {
            let total: f64 = raw.iter().sum();
            if total > 0.0 {
                for (acc, v) in summed.iter_mut().zip(raw.iter()) {
                    *acc += v / total;
                }
                contributing += 1;
            }
            trees.push(tree);
        }

        let feature_importances = if contributing == 0 {
            vec![1.0 / n_features as f64; n_features]
        } else {
            let total: f64 = summed.iter().sum();
            summed.iter().map(|v| v / total).collect()
        };

        Ok(Self {
            n_features,
            trees,
            feature_importances,
        })
    }

    /// Mean leaf class frequencies over all trees
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> Result<[f64; N_CLASSES]> {
        if row.len() != self.n_features {
            return Err(AppError::Prediction(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let mut acc = [0.0; N_CLASSES];
        for tree in &self.trees {
            let proba = tree.leaf_proba(row);
            for (a, p) in acc.iter_mut().zip(proba.iter()) {
                *a += p;
            }
        }
        let n = self.trees.len() as f64;
        for a in acc.iter_mut() {
            *a /= n;
        }
        Ok(acc)
    }

    /// Structural check for a forest that did not come from [`fit`](Self::fit)
    ///
    /// Every child index must point forward within its tree, so traversal
    /// always terminates inside `nodes`.
    pub fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Err(AppError::ArtifactLoad(format!("corrupt forest: {}", msg)));

        if self.n_features == 0 {
            return corrupt("zero features".to_string());
        }
        if self.trees.is_empty() {
            return corrupt("no trees".to_string());
        }
        if self.feature_importances.len() != self.n_features {
            return corrupt(format!(
                "{} importances for {} features",
                self.feature_importances.len(),
                self.n_features
            ));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            let n_nodes = tree.nodes.len();
            if n_nodes == 0 {
                return corrupt(format!("tree {} is empty", t));
            }
            for (idx, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Leaf { proba } => {
                        let sum: f64 = proba.iter().sum();
                        if proba.iter().any(|p| !p.is_finite() || *p < 0.0)
                            || (sum - 1.0).abs() > PROBA_SUM_TOLERANCE
                        {
                            return corrupt(format!("tree {} node {} has invalid leaf {:?}", t, idx, proba));
                        }
                    }
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= self.n_features {
                            return corrupt(format!("tree {} node {} splits on feature {}", t, idx, feature));
                        }
                        if threshold.is_nan() {
                            return corrupt(format!("tree {} node {} has NaN threshold", t, idx));
                        }
                        for &child in [left, right] {
                            if child <= idx || child >= n_nodes {
                                return corrupt(format!(
                                    "tree {} node {} points to child {} of {}",
                                    t, idx, child, n_nodes
                                ));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Normalized mean decrease in impurity, indexed by feature column
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    /// Sum of child impurities weighted by child size
    weighted_impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [Label],
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let counts = self.class_counts(rows);
        let n = rows.len();
        let impurity = gini(&counts, n);

        if depth >= self.max_depth || n < self.min_samples_split || impurity <= IMPURITY_EPSILON {
            return self.push_leaf(&counts, n);
        }

        let Some(split) = self.best_split(rows, &counts, rng) else {
            return self.push_leaf(&counts, n);
        };

        self.importances[split.feature] += n as f64 * impurity - split.weighted_impurity;

        let x = self.x;
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| x[[r, split.feature]] <= split.threshold);
        let mid = left_rows.len();
        rows[..mid].copy_from_slice(&left_rows);
        rows[mid..].copy_from_slice(&right_rows);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            proba: [0.0; N_CLASSES],
        });

        let (left_slice, right_slice) = rows.split_at_mut(mid);
        let left = self.build(left_slice, depth + 1, rng);
        let right = self.build(right_slice, depth + 1, rng);

        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(
        &self,
        rows: &[usize],
        counts: &[usize; N_CLASSES],
        rng: &mut StdRng,
    ) -> Option<Split> {
        let n = rows.len();
        let mut candidates: Vec<usize> = (0..self.importances.len()).collect();
        candidates.shuffle(rng);

        let mut best: Option<Split> = None;
        let mut sorted: Vec<(f64, Label)> = Vec::with_capacity(n);

        for (visited, &feature) in candidates.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }

            sorted.clear();
            sorted.extend(rows.iter().map(|&r| (self.x[[r, feature]], self.y[r])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = [0usize; N_CLASSES];
            for i in 1..n {
                left[sorted[i - 1].1] += 1;
                let (lo, hi) = (sorted[i - 1].0, sorted[i].0);
                if lo >= hi {
                    continue;
                }

                let mut right = [0usize; N_CLASSES];
                for c in 0..N_CLASSES {
                    right[c] = counts[c] - left[c];
                }
                let (n_left, n_right) = (i, n - i);
                let weighted_impurity =
                    n_left as f64 * gini(&left, n_left) + n_right as f64 * gini(&right, n_right);

                if best
                    .as_ref()
                    .map_or(true, |b| weighted_impurity < b.weighted_impurity)
                {
                    best = Some(Split {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        weighted_impurity,
                    });
                }
            }
        }

        best
    }

    fn class_counts(&self, rows: &[usize]) -> [usize; N_CLASSES] {
        let mut counts = [0usize; N_CLASSES];
        for &r in rows {
            counts[self.y[r]] += 1;
        }
        counts
    }

    fn push_leaf(&mut self, counts: &[usize; N_CLASSES], n: usize) -> usize {
        let mut proba = [0.0; N_CLASSES];
        if n > 0 {
            for (p, &c) in proba.iter_mut().zip(counts.iter()) {
                *p = c as f64 / n as f64;
            }
        }
        self.nodes.push(Node::Leaf { proba });
        self.nodes.len() - 1
    }
}

fn gini(counts: &[usize; N_CLASSES], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            seed: 7,
            test_size: 0.2,
            n_estimators: 15,
            max_depth: 6,
            min_samples_split: 2,
        }
    }

    /// Label depends only on the first column
    fn separable() -> (Array2<f64>, Vec<Label>) {
        let mut x = Array2::zeros((80, 2));
        let mut y = Vec::new();
        for i in 0..80 {
            let day = (i % 7 + 1) as f64;
            x[[i, 0]] = day;
            x[[i, 1]] = (10_000 + (i * 37) % 11) as f64;
            y.push(if day >= 5.0 { 1 } else { 0 });
        }
        (x, y)
    }

    fn stump(left: usize, right: usize, feature: usize) -> RandomForest {
        RandomForest {
            n_features: 2,
            trees: vec![DecisionTree {
                nodes: vec![
                    Node::Split {
                        feature,
                        threshold: 4.5,
                        left,
                        right,
                    },
                    Node::Leaf { proba: [0.9, 0.1] },
                    Node::Leaf { proba: [0.2, 0.8] },
                ],
            }],
            feature_importances: vec![1.0, 0.0],
        }
    }

    fn assert_corrupt(forest: &RandomForest) {
        assert!(matches!(forest.validate(), Err(AppError::ArtifactLoad(_))));
    }

    #[test]
    fn test_validate_accepts_fitted_and_wellformed_forests() {
        let (x, y) = separable();
        RandomForest::fit(&x, &y, &small_config())
            .unwrap()
            .validate()
            .unwrap();
        stump(1, 2, 0).validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_child_indices() {
        assert_corrupt(&stump(1, 999_999, 0));
        assert_corrupt(&stump(0, 2, 0));
        assert_corrupt(&stump(1, 3, 0));
    }

    #[test]
    fn test_validate_rejects_unknown_feature() {
        assert_corrupt(&stump(1, 2, 2));
    }

    #[test]
    fn test_validate_rejects_empty_and_bad_leaves() {
        let mut forest = stump(1, 2, 0);
        forest.trees.clear();
        assert_corrupt(&forest);

        let mut forest = stump(1, 2, 0);
        forest.trees[0].nodes.clear();
        assert_corrupt(&forest);

        let mut forest = stump(1, 2, 0);
        forest.trees[0].nodes[1] = Node::Leaf {
            proba: [f64::NAN, 0.5],
        };
        assert_corrupt(&forest);

        let mut forest = stump(1, 2, 0);
        forest.trees[0].nodes[2] = Node::Leaf { proba: [0.7, 0.7] };
        assert_corrupt(&forest);
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[5, 0], 5), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[0, 0], 0), 0.0);
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_config()).unwrap();

        assert_eq!(forest.n_estimators(), 15);
        let friday = forest.predict_proba_row(array![5.0, 10_003.0].view()).unwrap();
        let monday = forest.predict_proba_row(array![1.0, 10_003.0].view()).unwrap();
        assert!(friday[1] > 0.5);
        assert!(monday[0] > 0.5);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_config()).unwrap();

        for day in 1..=7 {
            let p = forest
                .predict_proba_row(array![day as f64, 10_005.0].view())
                .unwrap();
            assert!((p[0] + p[1] - 1.0).abs() < 1e-9);
            assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable();
        let a = RandomForest::fit(&x, &y, &small_config()).unwrap();
        let b = RandomForest::fit(&x, &y, &small_config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_cap_is_respected() {
        let (x, y) = separable();
        let config = TrainingConfig {
            max_depth: 2,
            ..small_config()
        };
        let forest = RandomForest::fit(&x, &y, &config).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_importance_favors_informative_feature() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_config()).unwrap();
        let importances = forest.feature_importances();

        assert_eq!(importances.len(), 2);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances.iter().all(|&v| v >= 0.0));
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_constant_features_give_uniform_importance() {
        let x = Array2::from_elem((10, 2), 1.0);
        let y = vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1];
        let forest = RandomForest::fit(&x, &y, &small_config()).unwrap();

        assert_eq!(forest.feature_importances(), &[0.5, 0.5]);
        let p = forest.predict_proba_row(array![1.0, 1.0].view()).unwrap();
        assert!((p[0] + p[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_input() {
        let x = Array2::<f64>::zeros((0, 2));
        assert!(RandomForest::fit(&x, &[], &small_config()).is_err());

        let x = Array2::<f64>::zeros((2, 2));
        assert!(RandomForest::fit(&x, &[0, 2], &small_config()).is_err());
        assert!(RandomForest::fit(&x, &[0], &small_config()).is_err());
    }

    #[test]
    fn test_wrong_row_width_is_prediction_error() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_config()).unwrap();
        let err = forest.predict_proba_row(array![1.0].view()).unwrap_err();
        assert!(matches!(err, AppError::Prediction(_)));
    }
}
