use thiserror::Error;

use zokuhen_api::CatalogError;

#[derive(Debug, Error)]
pub enum ZokuhenError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ZokuhenError {
    /// Whether this failure should surface as a 404-class condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Catalog(CatalogError::UserNotFound(_)))
    }
}
