//! Errors raised by the cache layer.

use thiserror::Error;

/// Errors that can occur while constructing or operating a [`crate::Cache`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Options(#[from] sessionflow_pool::OptionsError),

    #[error(transparent)]
    Pool(#[from] sessionflow_pool::PoolError),

    #[error("failed to (de)serialize a cached response: {0}")]
    Serde(String),

    #[error(transparent)]
    Response(#[from] sessionflow_response::ResponseError),
}

impl<E> From<CacheError> for sessionflow_core::SessionError<E> {
    fn from(err: CacheError) -> Self {
        sessionflow_core::SessionError::unknown(err)
    }
}
