//! Error handling for parameter validation and kinematic chain checks

/// Unified error to report physically meaningless parameter sets and
/// mismatched kinematic chain descriptions.
#[derive(Debug)]
pub enum ParameterError {
    /// A parameter that must be strictly positive (length, inertia, mass) is not.
    NonPositive { field: &'static str, value: f64 },
    /// A parameter is NaN or infinite.
    NonFinite { field: &'static str, value: f64 },
    /// Joint angle and link length sequences do not describe the same chain.
    InvalidLength { expected: usize, found: usize },
}

impl std::fmt::Display for ParameterError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ParameterError::NonPositive { field, value } =>
                write!(f, "Parameter {} must be strictly positive, got {}", field, value),
            ParameterError::NonFinite { field, value } =>
                write!(f, "Parameter {} must be finite, got {}", field, value),
            ParameterError::InvalidLength { expected, found } =>
                write!(f, "Invalid Length: expected {}, found {}", expected, found),
        }
    }
}

impl std::error::Error for ParameterError {}
