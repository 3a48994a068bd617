use thiserror::Error;

/// Canonical result for every rangesplit crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors are `Clone` so a failed iterator can hand the same error back on
/// every later call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    // Any round-trip to the statistics provider, row counter, or sub-range
    // splitter that failed.
    #[error("query failed: {0}")]
    Query(String),

    #[error("malformed bucket bound: {0}")]
    MalformedBound(String),

    #[error("invalid checkpoint: {0}")]
    Checkpoint(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("chunk production cancelled")]
    Cancelled,

    #[error("chunk producer: {0}")]
    Producer(String),
}

impl Error {
    /// Prefix the message with the operation that failed, keeping the variant.
    pub fn context(self, what: impl std::fmt::Display) -> Self {
        match self {
            Error::NotFound(m) => Error::NotFound(format!("{what}: {m}")),
            Error::Query(m) => Error::Query(format!("{what}: {m}")),
            Error::MalformedBound(m) => Error::MalformedBound(format!("{what}: {m}")),
            Error::Checkpoint(m) => Error::Checkpoint(format!("{what}: {m}")),
            Error::Config(m) => Error::Config(format!("{what}: {m}")),
            Error::Producer(m) => Error::Producer(format!("{what}: {m}")),
            Error::Cancelled => Error::Cancelled,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Checkpoint(e.to_string())
    }
}
