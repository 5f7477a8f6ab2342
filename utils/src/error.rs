use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Workspace-level error returned by the binary, the CLI and the run loop.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("Configuration lock poisoned")]
    ConfigLock,

    #[error("{0}")]
    Message(String),

    #[error("{message}: {source}")]
    WithSource {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Wraps a foreign error with a short description of what was being attempted.
    pub fn with_source(
        message: impl Into<String>, source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Error::WithSource {
            message: message.into(),
            source,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::ConfigLock
    }
}
