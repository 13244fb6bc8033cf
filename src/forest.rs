//! Random-forest regressor.
//!
//! Bagged CART trees grown on variance reduction, averaged at prediction
//! time. Each node keeps its training cover so the explainer can integrate
//! unknown features out along the tree.

use anyhow::{ensure, Result};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows until the leaf-size limits stop it.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: Some(14),
            min_samples_split: 2,
            min_samples_leaf: 3,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
        cover: f64,
    },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Leaf { cover, .. } | Node::Split { cover, .. } => *cover,
        }
    }
}

/// Arena of nodes, root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value, .. } => return *value,
                Node::Split { feature, threshold, left, right, .. } => {
                    i = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Expected output when only the features in `known` (bit `f` set for
    /// feature `f`) are taken from `x`; the others follow both branches,
    /// weighted by training cover.
    pub fn conditional_expectation(&self, x: &[f64], known: u32) -> f64 {
        self.expectation_at(0, x, known)
    }

    fn expectation_at(&self, i: usize, x: &[f64], known: u32) -> f64 {
        match &self.nodes[i] {
            Node::Leaf { value, .. } => *value,
            Node::Split { feature, threshold, left, right, .. } => {
                if known & (1u32 << *feature) != 0 {
                    let next = if x[*feature] <= *threshold { *left } else { *right };
                    self.expectation_at(next, x, known)
                } else {
                    let cl = self.nodes[*left].cover();
                    let cr = self.nodes[*right].cover();
                    (cl * self.expectation_at(*left, x, known) + cr * self.expectation_at(*right, x, known))
                        / (cl + cr)
                }
            }
        }
    }

    /// Children must sit after their parent in the arena, so every walk from
    /// the root ends at a leaf.
    fn check(&self, n_features: usize) -> Result<(), String> {
        let n = self.nodes.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !cover.is_finite() || cover <= 0.0 {
                return Err(format!("node {i} has cover {cover}"));
            }
            match *node {
                Node::Leaf { value, .. } if !value.is_finite() => {
                    return Err(format!("leaf {i} has value {value}"));
                }
                Node::Leaf { .. } => {}
                Node::Split { feature, threshold, left, right, .. } => {
                    if feature >= n_features {
                        return Err(format!("split {i} uses feature {feature} of {n_features}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("split {i} has threshold {threshold}"));
                    }
                    if left <= i || right <= i || left >= n || right >= n {
                        return Err(format!("split {i} points to nodes {left}/{right} of {n}"));
                    }
                }
            }
        }
        Ok(())
    }

    fn fit(x: &[Vec<f64>], y: &[f64], rows: Vec<usize>, n_features: usize, params: &ForestParams) -> Self {
        let mut tree = RegressionTree { nodes: Vec::new() };
        tree.grow(x, y, rows, 0, n_features, params);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        rows: Vec<usize>,
        depth: usize,
        n_features: usize,
        params: &ForestParams,
    ) -> usize {
        let n = rows.len();
        let sum: f64 = rows.iter().map(|&r| y[r]).sum();
        let mean = sum / n as f64;
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean, cover: n as f64 });

        let depth_ok = params.max_depth.map_or(true, |d| depth < d);
        let pure = rows.iter().all(|&r| y[r] == y[rows[0]]);
        if !depth_ok || pure || n < params.min_samples_split.max(2) {
            return id;
        }
        let Some(best) = best_split(x, y, &rows, n_features, params.min_samples_leaf.max(1)) else {
            return id;
        };

        let (l_rows, r_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| x[r][best.feature] <= best.threshold);
        let left = self.grow(x, y, l_rows, depth + 1, n_features, params);
        let right = self.grow(x, y, r_rows, depth + 1, n_features, params);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
            cover: n as f64,
        };
        id
    }
}

/// Split maximizing `sum_l^2/n_l + sum_r^2/n_r`, i.e. the largest drop in squared error.
fn best_split(x: &[Vec<f64>], y: &[f64], rows: &[usize], n_features: usize, min_leaf: usize) -> Option<BestSplit> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<BestSplit> = None;
    let mut sorted = rows.to_vec();

    for f in 0..n_features {
        sorted.sort_unstable_by(|&a, &b| x[a][f].total_cmp(&x[b][f]));
        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += y[sorted[k]];
            let n_left = k + 1;
            let n_right = n - n_left;
            let (lo, hi) = (x[sorted[k]][f], x[sorted[k + 1]][f]);
            if lo == hi || n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            if score > parent_score + 1e-12 && best.as_ref().map_or(true, |b| score > b.score) {
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid < hi { mid } else { lo };
                best = Some(BestSplit { feature: f, threshold, score });
            }
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fit on rows `x` (all of width `n_features`) and targets `y`.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self> {
        ensure!(!x.is_empty(), "cannot fit a forest on zero rows");
        ensure!(x.len() == y.len(), "row count {} != target count {}", x.len(), y.len());
        ensure!(params.n_trees > 0, "n_trees must be positive");
        let n_features = x[0].len();
        ensure!(n_features > 0 && n_features < 32, "unsupported feature count {}", n_features);
        ensure!(x.iter().all(|r| r.len() == n_features), "ragged feature rows");
        ensure!(
            x.iter().flatten().chain(y).all(|v| v.is_finite()),
            "training data contains non-finite values"
        );

        let n = x.len();
        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                // per-tree stream so the forest doesn't depend on thread scheduling
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(t as u64));
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, rows, n_features, params)
            })
            .collect();

        Ok(Self { n_features, trees })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Structural check for forests that did not come from `fit`.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.n_features == 0 || self.n_features >= 32 {
            return Err(format!("unsupported feature count {}", self.n_features));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features).map_err(|e| format!("tree {t}: {e}"))?;
        }
        Ok(())
    }

    /// Average of the tree outputs. Row width is checked by the caller.
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }

    /// Cover-weighted expected output, the forest's value with no features known.
    pub fn expected_value(&self) -> f64 {
        self.trees
            .iter()
            .map(|t| t.conditional_expectation(&[], 0))
            .sum::<f64>()
            / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..200 {
            let a = i as f64 / 10.0;
            let b = (i % 3) as f64;
            x.push(vec![a, b]);
            y.push(if a < 10.0 { 5.0 } else { 20.0 } + b);
        }
        (x, y)
    }

    #[test]
    fn test_single_tree_learns_step() {
        let (x, y) = step_data();
        let params = ForestParams { n_trees: 1, max_depth: None, min_samples_leaf: 1, ..Default::default() };
        let tree = RegressionTree::fit(&x, &y, (0..x.len()).collect(), 2, &params);
        assert_eq!(tree.predict(&[3.0, 0.0]), 5.0);
        assert_eq!(tree.predict(&[15.0, 0.0]), 20.0);
        assert_eq!(tree.predict(&[2.0, 2.0]), 7.0);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = step_data();
        let params = ForestParams { n_trees: 8, ..Default::default() };
        let a = RandomForest::fit(&x, &y, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.trees().len(), 8);
    }

    #[test]
    fn test_forest_prediction_close() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &ForestParams { n_trees: 20, ..Default::default() }).unwrap();
        assert!((forest.predict(&[3.0, 1.0]) - 6.0).abs() < 1.0);
        assert!((forest.predict(&[18.0, 0.0]) - 20.0).abs() < 1.0);
    }

    #[test]
    fn test_covers_are_consistent() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &ForestParams { n_trees: 3, ..Default::default() }).unwrap();
        for tree in forest.trees() {
            assert_eq!(tree.nodes()[0].cover(), x.len() as f64);
            for node in tree.nodes() {
                if let Node::Split { left, right, cover, .. } = node {
                    assert_eq!(tree.nodes()[*left].cover() + tree.nodes()[*right].cover(), *cover);
                }
            }
        }
    }

    #[test]
    fn test_expected_value_is_bootstrap_mean() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &ForestParams { n_trees: 5, ..Default::default() }).unwrap();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        // each tree's expectation is its bootstrap sample mean
        assert!((forest.expected_value() - mean).abs() < 2.0);
    }

    #[test]
    fn test_fitted_forest_validates() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &ForestParams { n_trees: 4, ..Default::default() }).unwrap();
        assert_eq!(forest.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let forest: RandomForest = serde_json::from_str(
            r#"{"n_features":2,"trees":[{"nodes":[
                {"Leaf":{"value":1.0,"cover":2.0}},
                {"Split":{"feature":0,"threshold":1.0,"left":0,"right":2,"cover":2.0}},
                {"Leaf":{"value":3.0,"cover":1.0}}]}]}"#,
        )
        .unwrap();
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        let params = ForestParams::default();
        assert!(RandomForest::fit(&[], &[], &params).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[1.0, 2.0], &params).is_err());
        assert!(RandomForest::fit(&[vec![f64::NAN]], &[1.0], &params).is_err());
    }
}
