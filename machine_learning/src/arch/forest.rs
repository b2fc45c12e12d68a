use ndarray::ArrayView1;

use super::{Classifier, DecisionTree};

/// A bagged ensemble of decision trees voting with their averaged leaf probabilities.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    classes: Vec<i64>,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Creates a new `RandomForest`.
    ///
    /// # Arguments
    /// * `trees` - The fitted trees, all of them over the same classes.
    /// * `classes` - The sorted labels, `classes[i]` is the label of class index `i`.
    ///
    /// # Returns
    /// A new `RandomForest` instance.
    pub fn new(trees: Vec<DecisionTree>, classes: Vec<i64>) -> Self {
        debug_assert!(trees.iter().all(|t| t.n_classes() == classes.len()));

        let n_features = trees
            .first()
            .map(|t| t.feature_importances().len())
            .unwrap_or_default();

        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            for (acc, imp) in importances.iter_mut().zip(tree.feature_importances()) {
                *acc += imp;
            }
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= total);
        }

        Self {
            trees,
            classes,
            importances,
        }
    }

    /// Averages the class probabilities of every tree.
    ///
    /// # Returns
    /// One probability per entry of `classes()`.
    pub fn predict_proba(&self, x: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        if self.trees.is_empty() {
            return proba;
        }

        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(x)) {
                *acc += p;
            }
        }

        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Returns the mean decrease in impurity of every feature, normalized to sum one.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

impl Classifier for RandomForest {
    fn predict(&self, x: ArrayView1<'_, f64>) -> i64 {
        let proba = self.predict_proba(x);

        // Ties resolve to the lowest label.
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }

        self.classes.get(best).copied().unwrap_or_default()
    }
}
