use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    EmptyDataset,
    InvalidSpec {
        field: &'static str,
        reason: &'static str,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::EmptyDataset => "Refusing to train on an empty dataset".to_string(),
            MlErr::InvalidSpec { field, reason } => {
                format!("Invalid trainer spec, {field} {reason}")
            }
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {}
