/// Convenience result type used across fxcache.
pub type FxCacheResult<T> = Result<T, FxCacheError>;

/// Error taxonomy of the filter cache and its collaborators.
///
/// Only [`FxCacheError::Validation`] and [`FxCacheError::Serde`] normally reach callers; the
/// cache manager absorbs the render-time variants and degrades the frame instead.
#[derive(thiserror::Error, Debug)]
pub enum FxCacheError {
    /// Invalid configuration or parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backdrop could not be captured (no bindable surface, snapshot failed).
    #[error("capture error: {0}")]
    Capture(String),

    /// The filter produced no image.
    #[error("filter execution error: {0}")]
    FilterExecution(String),

    /// A cached image belongs to a GPU context that cannot be re-wrapped.
    #[error("context mismatch: {0}")]
    ContextMismatch(String),

    /// The hardware-offload route refused the task.
    #[error("offload error: {0}")]
    Offload(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FxCacheError {
    /// Build a [`FxCacheError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FxCacheError::Capture`] value.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Build a [`FxCacheError::FilterExecution`] value.
    pub fn filter_execution(msg: impl Into<String>) -> Self {
        Self::FilterExecution(msg.into())
    }

    /// Build a [`FxCacheError::ContextMismatch`] value.
    pub fn context_mismatch(msg: impl Into<String>) -> Self {
        Self::ContextMismatch(msg.into())
    }

    /// Build a [`FxCacheError::Offload`] value.
    pub fn offload(msg: impl Into<String>) -> Self {
        Self::Offload(msg.into())
    }

    /// Build a [`FxCacheError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
