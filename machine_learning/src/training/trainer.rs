use crate::{Result, arch::Classifier, dataset::Dataset};

/// Fits a `Classifier` over a labeled dataset.
pub trait Trainer {
    type Model: Classifier;

    /// Fits a new model.
    ///
    /// # Arguments
    /// * `dataset` - The training data, must not be empty.
    ///
    /// # Returns
    /// The fitted model or an error if the dataset or the trainer's spec can't produce one.
    fn train(&self, dataset: &Dataset) -> Result<Self::Model>;
}
