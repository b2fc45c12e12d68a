mod classifier;
mod forest;
mod tree;

pub use classifier::Classifier;
pub use forest::RandomForest;
pub use tree::{DecisionTree, TreeLimits};
