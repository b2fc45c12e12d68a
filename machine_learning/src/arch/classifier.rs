use ndarray::{ArrayView1, ArrayView2};

/// A fitted model mapping a feature vector to a class label.
pub trait Classifier: Send + Sync {
    /// Predicts the label of a single feature vector.
    ///
    /// # Arguments
    /// * `x` - The features, in the same column order the model was trained with.
    fn predict(&self, x: ArrayView1<'_, f64>) -> i64;

    /// Predicts the label of every row of `x`.
    fn predict_rows(&self, x: ArrayView2<'_, f64>) -> Vec<i64> {
        x.rows().into_iter().map(|row| self.predict(row)).collect()
    }
}
