mod forest_trainer;
mod spec;
mod trainer;

pub use forest_trainer::ForestTrainer;
pub use spec::{ClassWeight, ForestSpec, MaxFeatures};
pub use trainer::Trainer;
