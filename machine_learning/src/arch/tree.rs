use std::cmp::Ordering;

use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, seq::SliceRandom};

/// Two feature values closer than this are treated as the same split point.
const FEATURE_THRESHOLD: f64 = 1e-7;

/// The growth limits of a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeLimits {
    pub max_features: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        proba: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A CART classification tree grown on weighted samples with the gini criterion.
///
/// Classes are referred to by index (`0..n_classes`), mapping them back to labels is the
/// owner's job.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
    importances: Vec<f64>,
}

/// Weighted class histogram of a node.
struct Histogram {
    weights: Vec<f64>,
    total: f64,
}

impl Histogram {
    fn new(n_classes: usize) -> Self {
        Self {
            weights: vec![0.0; n_classes],
            total: 0.0,
        }
    }

    fn add(&mut self, class: usize, weight: f64) {
        self.weights[class] += weight;
        self.total += weight;
    }

    fn remove(&mut self, class: usize, weight: f64) {
        self.weights[class] -= weight;
        self.total -= weight;
    }

    fn gini(&self) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }

        1.0 - self
            .weights
            .iter()
            .map(|w| (w / self.total).powi(2))
            .sum::<f64>()
    }

    fn proba(&self) -> Vec<f64> {
        if self.total <= 0.0 {
            return vec![0.0; self.weights.len()];
        }

        self.weights.iter().map(|w| w / self.total).collect()
    }
}

/// The best split found for a node.
struct Split {
    feature: usize,
    threshold: f64,
    pos: usize,
    children_impurity: f64,
    left_impurity: f64,
    right_impurity: f64,
    left_weight: f64,
    right_weight: f64,
}

struct Grower<'a, R: Rng> {
    x: ArrayView2<'a, f64>,
    y: &'a [usize],
    weights: &'a [f64],
    limits: TreeLimits,
    rng: &'a mut R,
    tree: DecisionTree,
}

impl DecisionTree {
    /// Grows a new tree.
    ///
    /// # Arguments
    /// * `x` - The `(n_samples, n_features)` feature matrix.
    /// * `y` - The class index of every row.
    /// * `weights` - The weight of every row, rows with zero weight are left out.
    /// * `n_classes` - The amount of distinct classes.
    /// * `limits` - The growth limits.
    /// * `rng` - Drives the random feature selection at every node.
    ///
    /// # Returns
    /// The grown tree, which is a single leaf when no row carries weight.
    pub fn grow<R: Rng>(
        x: ArrayView2<'_, f64>,
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
        limits: TreeLimits,
        rng: &mut R,
    ) -> Self {
        debug_assert_eq!(x.nrows(), y.len());
        debug_assert_eq!(x.nrows(), weights.len());

        let mut indices: Vec<usize> = (0..y.len()).filter(|&i| weights[i] > 0.0).collect();

        let mut grower = Grower {
            x,
            y,
            weights,
            limits,
            rng,
            tree: DecisionTree {
                nodes: Vec::new(),
                n_classes,
                importances: vec![0.0; x.ncols()],
            },
        };

        grower.build(&mut indices, 0);

        let mut tree = grower.tree;
        let total: f64 = tree.importances.iter().sum();
        if total > 0.0 {
            tree.importances.iter_mut().for_each(|imp| *imp /= total);
        }

        tree
    }

    /// Returns the class probabilities of the leaf `x` falls into.
    pub fn predict_proba(&self, x: ArrayView1<'_, f64>) -> &[f64] {
        let mut idx = 0;

        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Returns the normalized impurity decrease attributed to each feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Returns the amount of nodes, leaves included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the length of the longest root to leaf path.
    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }

        depth_of(&self.nodes, 0)
    }
}

impl<R: Rng> Grower<'_, R> {
    fn histogram(&self, indices: &[usize]) -> Histogram {
        let mut hist = Histogram::new(self.tree.n_classes);
        for &i in indices {
            hist.add(self.y[i], self.weights[i]);
        }

        hist
    }

    fn push(&mut self, node: Node) -> usize {
        self.tree.nodes.push(node);
        self.tree.nodes.len() - 1
    }

    fn build(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let hist = self.histogram(indices);
        let impurity = hist.gini();

        let limits = self.limits;
        let depth_reached = limits.max_depth.is_some_and(|max| depth >= max);
        let too_small = indices.len() < limits.min_samples_split
            || indices.len() < 2 * limits.min_samples_leaf;

        if depth_reached || too_small || impurity <= f64::EPSILON {
            return self.push(Node::Leaf {
                proba: hist.proba(),
            });
        }

        let Some(split) = self.best_split(indices, &hist) else {
            return self.push(Node::Leaf {
                proba: hist.proba(),
            });
        };

        self.tree.importances[split.feature] += hist.total * impurity
            - split.left_weight * split.left_impurity
            - split.right_weight * split.right_impurity;

        // Reserve the slot so children land after their parent.
        let idx = self.push(Node::Leaf { proba: Vec::new() });

        let feature = split.feature;
        let x = self.x;
        indices.sort_by(|&a, &b| cmp_f64(x[[a, feature]], x[[b, feature]]));
        let (left_idx, right_idx) = indices.split_at_mut(split.pos);

        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);

        self.tree.nodes[idx] = Node::Split {
            feature,
            threshold: split.threshold,
            left,
            right,
        };

        idx
    }

    /// Visits features in random order until `max_features` non constant ones were evaluated.
    fn best_split(&mut self, indices: &mut [usize], parent: &Histogram) -> Option<Split> {
        let n_features = self.x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<Split> = None;
        let mut visited = 0;

        for feature in features {
            if visited >= self.limits.max_features {
                break;
            }

            let x = self.x;
            indices.sort_by(|&a, &b| cmp_f64(x[[a, feature]], x[[b, feature]]));

            let first = x[[indices[0], feature]];
            let last = x[[indices[indices.len() - 1], feature]];
            if last <= first + FEATURE_THRESHOLD {
                continue;
            }
            visited += 1;

            let Some(candidate) = self.scan_feature(indices, feature, parent) else {
                continue;
            };

            if best
                .as_ref()
                .is_none_or(|b| candidate.children_impurity < b.children_impurity)
            {
                best = Some(candidate);
            }
        }

        best
    }

    /// Sweeps the rows of a node, already sorted by `feature`, for the cheapest split point.
    fn scan_feature(&self, sorted: &[usize], feature: usize, parent: &Histogram) -> Option<Split> {
        let min_leaf = self.limits.min_samples_leaf;
        let mut left = Histogram::new(self.tree.n_classes);
        let mut right = Histogram {
            weights: parent.weights.clone(),
            total: parent.total,
        };

        let mut best: Option<Split> = None;

        for pos in 1..sorted.len() {
            let prev = sorted[pos - 1];
            left.add(self.y[prev], self.weights[prev]);
            right.remove(self.y[prev], self.weights[prev]);

            if pos < min_leaf || sorted.len() - pos < min_leaf {
                continue;
            }

            let lo = self.x[[prev, feature]];
            let hi = self.x[[sorted[pos], feature]];
            if hi <= lo + FEATURE_THRESHOLD {
                continue;
            }

            let (left_impurity, right_impurity) = (left.gini(), right.gini());
            let children_impurity = left.total * left_impurity + right.total * right_impurity;

            if best
                .as_ref()
                .is_none_or(|b| children_impurity < b.children_impurity)
            {
                let mut threshold = lo / 2.0 + hi / 2.0;
                if threshold >= hi || !threshold.is_finite() {
                    threshold = lo;
                }

                best = Some(Split {
                    feature,
                    threshold,
                    pos,
                    children_impurity,
                    left_impurity,
                    right_impurity,
                    left_weight: left.total,
                    right_weight: right.total,
                });
            }
        }

        best
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
