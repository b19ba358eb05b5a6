use biblio_core::config::ConfigError;
use biblio_core::{ApiError, ErrorInfo, ErrorKind, StoreError};

/// The front end error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration from the environment or the command line is unusable
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The HTTP client could not be set up
    #[error("Failed to set up the API client: {0}")]
    Client(#[from] ApiError),
    /// A store operation handed its failure back
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A store operation recorded its failure instead of returning it
    #[error("{store}: {} ({:?})", .info.message, .info.kind)]
    Recorded { store: &'static str, info: ErrorInfo },
    /// The server did not send back what was asked for
    #[error("{0}")]
    Missing(String),
    /// Results could not be rendered as JSON
    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl Error {
    /// Process exit status: 2 when the server rejected the input, 1 otherwise
    pub const fn exit_status(&self) -> u8 {
        let kind = match *self {
            Self::Store(ref error) => error.kind(),
            Self::Recorded { ref info, .. } => info.kind,
            Self::Config(_) | Self::Client(_) | Self::Missing(_) | Self::Output(_) => return 1,
        };
        if matches!(kind, ErrorKind::ValidationFailure) {
            2
        } else {
            1
        }
    }
}
