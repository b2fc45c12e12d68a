use std::num::NonZeroUsize;

use crate::{MlErr, Result};

/// How many features are considered when looking for the best split of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least one.
    Sqrt,
    /// Every feature.
    All,
    /// A fixed amount, capped at the amount of features.
    Fixed(NonZeroUsize),
}

impl MaxFeatures {
    /// Resolves the amount of candidate features for a dataset with `n_features` columns.
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(n) => n.get().min(n_features),
        };

        n.max(1)
    }
}

/// How samples are weighted according to their class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassWeight {
    /// Every sample weighs the same.
    Uniform,
    /// Each class weighs `n_samples / (n_classes * class_count)`, so a skewed label
    /// distribution does not pull the decision boundary towards the majority class.
    Balanced,
}

/// The hyperparameters of a random forest.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestSpec {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestSpec {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::Balanced,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestSpec {
    /// Checks the hyperparameters can grow a forest.
    ///
    /// # Returns
    /// An `InvalidSpec` error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(MlErr::InvalidSpec {
                field: "n_trees",
                reason: "must be positive",
            });
        }

        if self.min_samples_split < 2 {
            return Err(MlErr::InvalidSpec {
                field: "min_samples_split",
                reason: "must be at least 2",
            });
        }

        if self.min_samples_leaf == 0 {
            return Err(MlErr::InvalidSpec {
                field: "min_samples_leaf",
                reason: "must be positive",
            });
        }

        if self.max_depth == Some(0) {
            return Err(MlErr::InvalidSpec {
                field: "max_depth",
                reason: "must be positive when set",
            });
        }

        Ok(())
    }
}
