/// Crate-wide result alias.
pub type SplitResult<T> = Result<T, SplitError>;

#[derive(thiserror::Error, Debug)]
pub enum SplitError {
    /// A kernel stage could not be resolved for the requested features.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// A dispatch or memory operation failed on the device.
    #[error("device error: {0}")]
    Device(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SplitError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error is fatal for the device session rather than a caller mistake.
    pub fn is_device_fatal(&self) -> bool {
        matches!(self, Self::Device(_) | Self::Unsupported(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
