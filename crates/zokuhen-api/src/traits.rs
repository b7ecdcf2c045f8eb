//! Catalog service trait and shared domain types.
//!
//! The traversal engine is written against [`CatalogService`], so it
//! can run over the real AniList client or an in-process fake.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::anilist::CatalogError;

/// A user-assigned tracking bucket for catalog items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaListStatus {
    Completed,
    Current,
    Planning,
    Paused,
    Dropped,
}

impl MediaListStatus {
    /// Every status fetched when building the known set.
    pub const ALL: [MediaListStatus; 5] = [
        Self::Completed,
        Self::Current,
        Self::Planning,
        Self::Paused,
        Self::Dropped,
    ];

    /// GraphQL `MediaListStatus` enum value; also used in cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Current => "CURRENT",
            Self::Planning => "PLANNING",
            Self::Paused => "PAUSED",
            Self::Dropped => "DROPPED",
        }
    }
}

impl std::fmt::Display for MediaListStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog media format. Anything that is not an anime format (manga,
/// novels, one-shots) deserializes to `Other` and is filtered out of
/// discovery results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaFormat {
    Tv,
    TvShort,
    Movie,
    Special,
    Ova,
    Ona,
    Music,
    #[serde(other)]
    Other,
}

impl MediaFormat {
    pub fn is_anime(self) -> bool {
        self != Self::Other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tv => "TV",
            Self::TvShort => "TV_SHORT",
            Self::Movie => "MOVIE",
            Self::Special => "SPECIAL",
            Self::Ova => "OVA",
            Self::Ona => "ONA",
            Self::Music => "MUSIC",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Title {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

impl Title {
    /// Preferred display form: romaji, then english.
    pub fn display(&self) -> Option<&str> {
        self.romaji.as_deref().or(self.english.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverImage {
    pub large: Option<String>,
}

/// Relation edge kind. Only SEQUEL drives discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    Sequel,
    #[serde(other)]
    Other,
}

/// A directed relation to another catalog item. The node is partial
/// (id/title/format/cover) and may be missing entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    pub relation_type: Option<RelationKind>,
    pub node: Option<Media>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relations {
    #[serde(default)]
    pub edges: Vec<RelationEdge>,
}

/// A catalog item as returned by AniList. All fields except `id` are
/// optional; the remote schema tolerates partial data and so do we.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: u64,
    #[serde(default)]
    pub title: Title,
    #[serde(default)]
    pub format: Option<MediaFormat>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub cover_image: Option<CoverImage>,
    #[serde(default)]
    pub relations: Relations,
}

impl Media {
    pub fn cover_url(&self) -> Option<&str> {
        self.cover_image.as_ref().and_then(|c| c.large.as_deref())
    }
}

/// One entry of a user's list: a media item plus the user's score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    pub media: Media,
    pub score: Option<f64>,
}

/// A single page of a status-partitioned list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    pub has_next_page: bool,
}

/// An AniList user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    pub name: String,
    pub avatar: Option<String>,
}

/// Result of a SaveMediaListEntry mutation.
#[derive(Debug, Clone)]
pub struct MutationResult {
    pub entry_id: u64,
    pub status: Option<MediaListStatus>,
}

/// Typed operations against the remote catalog.
pub trait CatalogService: Send + Sync {
    /// Fetch a user's public profile. Reports
    /// [`CatalogError::UserNotFound`] when the user does not exist.
    fn get_profile(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Profile, CatalogError>> + Send;

    /// Fetch one page of a status-partitioned list. Pagination is the
    /// caller's responsibility.
    fn get_list(
        &self,
        username: &str,
        status: MediaListStatus,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<ListPage, CatalogError>> + Send;

    /// Fetch a single item with its relations.
    fn get_media_details(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Media, CatalogError>> + Send;

    /// Cache-first batch fetch. Result order is not guaranteed to match
    /// the input order; callers re-associate by id.
    fn get_media_details_batch(
        &self,
        ids: &[u64],
    ) -> impl Future<Output = Result<Vec<Media>, CatalogError>> + Send;

    /// Submit a list mutation. On success the caller is responsible for
    /// invalidating the acting user's cached list pages.
    fn add_to_list(
        &self,
        media_id: u64,
        status: MediaListStatus,
    ) -> impl Future<Output = Result<MutationResult, CatalogError>> + Send;

    /// Drop every cached list page for `username`.
    fn invalidate_user_lists(&self, username: &str);
}
