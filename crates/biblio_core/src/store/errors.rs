use crate::api::errors::{ApiError, ErrorInfo, ErrorKind};

/// Failure of a store operation that is reported to the caller.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{collection} record {id} is not in the local cache")]
    NotFound {
        collection: &'static str,
        id: String,
    },
}

impl StoreError {
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        match *self {
            Self::Api(ref error) => error.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

impl From<&StoreError> for ErrorInfo {
    #[inline]
    fn from(error: &StoreError) -> Self {
        match *error {
            StoreError::Api(ref api) => Self::from(api),
            StoreError::NotFound { .. } => Self::new(ErrorKind::NotFound, None, error.to_string()),
        }
    }
}
