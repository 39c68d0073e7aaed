use thiserror::Error;

/// Error raised when a layer or block is constructed with an unusable
/// configuration.
///
/// Construction is atomic: either it succeeds and yields a fully usable
/// value, or it fails with this error and nothing is observable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

impl LayerError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        LayerError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// Check that a dimension-like configuration value is nonzero.
pub(crate) fn require_positive(value: usize, name: &str) -> Result<(), LayerError> {
    if value == 0 {
        return Err(LayerError::invalid(format!("{name} must be positive")));
    }
    Ok(())
}
