use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

/// The column names of a `Dataset`, in feature order followed by the label.
pub const COLUMNS: [&str; 4] = ["temperature", "light", "occupancy", "lightSwitch"];

/// The amount of feature columns, the label is not counted.
pub const NUM_FEATURES: usize = 3;

/// A single labeled historical reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub temperature: f64,
    pub light: f64,
    pub occupancy: i64,
    pub light_switch: i64,
}

impl Sample {
    /// Returns the feature vector of this sample: `(temperature, light, occupancy)`.
    #[inline]
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        [self.temperature, self.light, self.occupancy as f64]
    }
}

/// An ordered, in-memory collection of samples with a fixed four column schema.
///
/// An empty dataset is a valid value, it's the way the telemetry layer signals that no
/// training data could be obtained. Trainers refuse it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `samples` - The samples the dataset is composed of.
    ///
    /// # Returns
    /// A new `Dataset` instance.
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Creates a new empty `Dataset`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends a sample at the end of the dataset.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Builds the `(len, 3)` feature matrix.
    pub fn features(&self) -> Array2<f64> {
        let mut x = Array2::zeros((self.len(), NUM_FEATURES));

        for (mut row, sample) in x.rows_mut().into_iter().zip(&self.samples) {
            row.assign(&Array1::from(sample.features().to_vec()));
        }

        x
    }

    /// Returns the label column.
    pub fn labels(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.light_switch).collect()
    }

    /// Counts how many samples carry each label, ordered by label.
    pub fn label_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            *counts.entry(sample.light_switch).or_insert(0) += 1;
        }

        counts
    }
}

impl FromIterator<Sample> for Dataset {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
