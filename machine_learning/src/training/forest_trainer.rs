use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use super::{ClassWeight, ForestSpec, Trainer};
use crate::{
    MlErr, Result,
    arch::{DecisionTree, RandomForest, TreeLimits},
    dataset::{COLUMNS, Dataset},
};

/// Grows a `RandomForest` following a `ForestSpec`.
///
/// Trees are grown in parallel, each one from its own seed drawn up front from the spec's
/// seed, so the fitted forest only depends on the spec and the data.
#[derive(Debug, Clone)]
pub struct ForestTrainer {
    spec: ForestSpec,
}

impl ForestTrainer {
    /// Creates a new `ForestTrainer`.
    ///
    /// # Arguments
    /// * `spec` - The forest's hyperparameters.
    ///
    /// # Returns
    /// A new `ForestTrainer` or an error if the spec is invalid.
    pub fn new(spec: ForestSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    fn fit(&self, dataset: &Dataset) -> Result<RandomForest> {
        if dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let x = dataset.features();
        let labels = dataset.labels();

        let classes: Vec<i64> = dataset.label_counts().into_keys().collect();
        let y: Vec<usize> = labels
            .iter()
            .map(|label| classes.partition_point(|c| c < label))
            .collect();

        let class_weights = self.class_weights(&y, classes.len());
        let limits = TreeLimits {
            max_features: self.spec.max_features.resolve(x.ncols()),
            max_depth: self.spec.max_depth,
            min_samples_split: self.spec.min_samples_split,
            min_samples_leaf: self.spec.min_samples_leaf,
        };

        let mut rng = StdRng::seed_from_u64(self.spec.seed);
        let seeds: Vec<u64> = (0..self.spec.n_trees).map(|_| rng.random()).collect();

        let n = y.len();
        let bootstrap = self.spec.bootstrap;
        let trees: Vec<DecisionTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut weights: Vec<f64> = y.iter().map(|&c| class_weights[c]).collect();

                if bootstrap {
                    let mut counts = vec![0u32; n];
                    for _ in 0..n {
                        counts[rng.random_range(0..n)] += 1;
                    }

                    for (w, count) in weights.iter_mut().zip(counts) {
                        *w *= f64::from(count);
                    }
                }

                DecisionTree::grow(x.view(), &y, &weights, classes.len(), limits, &mut rng)
            })
            .collect();

        Ok(RandomForest::new(trees, classes))
    }

    fn class_weights(&self, y: &[usize], n_classes: usize) -> Vec<f64> {
        match self.spec.class_weight {
            ClassWeight::Uniform => vec![1.0; n_classes],
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &c in y {
                    counts[c] += 1;
                }

                let n = y.len() as f64;
                counts
                    .into_iter()
                    .map(|count| {
                        if count == 0 {
                            0.0
                        } else {
                            n / (n_classes as f64 * count as f64)
                        }
                    })
                    .collect()
            }
        }
    }
}

impl Trainer for ForestTrainer {
    type Model = RandomForest;

    fn train(&self, dataset: &Dataset) -> Result<RandomForest> {
        let forest = self.fit(dataset)?;

        for (name, importance) in COLUMNS.iter().zip(forest.feature_importances()) {
            debug!(feature = name, importance = importance; "feature importance");
        }

        info!(
            samples = dataset.len(),
            trees = forest.trees().len(),
            classes = forest.classes().len();
            "model trained successfully"
        );

        Ok(forest)
    }
}
