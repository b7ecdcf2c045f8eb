//! AniList access layer: GraphQL transport with rate-limit handling,
//! a TTL response cache, and the typed catalog client.

pub mod anilist;
pub mod cache;
pub mod traits;
pub mod transport;

pub use anilist::AniListClient;
pub use anilist::CatalogError;
pub use cache::Cache;
pub use transport::{GraphQlTransport, TransportError};
