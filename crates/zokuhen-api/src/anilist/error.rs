use thiserror::Error;

use crate::transport::TransportError;

/// Errors from the catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The target user does not exist upstream. Surfaced separately so
    /// callers can map it to a 404-class response.
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// GraphQL-level errors in an otherwise successful response.
    #[error("API returned errors: {0}")]
    Api(String),

    #[error("parse error: {0}")]
    Parse(String),
}
