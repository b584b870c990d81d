//! Error type shared by the whole crate.

use crate::mapping::MappingKind;

/// Result alias carrying [`LoomError`].
pub type Result<T> = std::result::Result<T, LoomError>;

/// Boxed error returned by user callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum LoomError {
    /// An output of the given kind was requested but no producer is
    /// registered for it.
    #[error("no mapping available for {0:?}")]
    MissingMapping(MappingKind),

    /// A call would put a pattern into a state that cannot be sampled, e.g.
    /// rewriting a continuous pattern or bundling patterns without OSC
    /// messages.
    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    /// A mini-language pattern could not be parsed.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Tune text could not be imported.
    #[error("notation error on line {line}: {message}")]
    Notation { line: usize, message: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("osc error: {0}")]
    Osc(String),

    /// A user callback reported a failure.
    #[error("callback failed: {0}")]
    Callback(String),
}

impl LoomError {
    pub fn composition<T: Into<String>>(msg: T) -> Self {
        Self::InvalidComposition(msg.into())
    }

    pub fn pattern<T: Into<String>>(msg: T) -> Self {
        Self::InvalidPattern(msg.into())
    }
}

impl From<CallbackError> for LoomError {
    fn from(err: CallbackError) -> Self {
        Self::Callback(err.to_string())
    }
}

impl From<rosc::OscError> for LoomError {
    fn from(err: rosc::OscError) -> Self {
        Self::Osc(err.to_string())
    }
}
