//! Wire types mirroring the AniList GraphQL response shapes.

use serde::Deserialize;

use crate::traits::{Media, MediaListStatus, Profile};

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub has_next_page: bool,
}

// ── User list page ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListPageData {
    #[serde(rename = "Page")]
    pub page: ListPageBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPageBody {
    #[serde(default)]
    pub page_info: PageInfo,
    #[serde(default)]
    pub media_list: Vec<WireListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WireListEntry {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub media: Option<Media>,
}

// ── Media details ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MediaData {
    #[serde(rename = "Media")]
    pub media: Option<Media>,
}

#[derive(Debug, Deserialize)]
pub struct BatchPageData {
    #[serde(rename = "Page")]
    pub page: BatchPageBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPageBody {
    #[serde(default)]
    pub page_info: PageInfo,
    #[serde(default)]
    pub media: Vec<Media>,
}

// ── User profile ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserData {
    #[serde(rename = "User")]
    pub user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<WireAvatar>,
}

#[derive(Debug, Deserialize)]
pub struct WireAvatar {
    #[serde(default)]
    pub large: Option<String>,
}

impl WireUser {
    pub fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            name: self.name,
            avatar: self.avatar.and_then(|a| a.large),
        }
    }
}

// ── Mutations ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SaveEntryData {
    #[serde(rename = "SaveMediaListEntry")]
    pub save_media_list_entry: WireSavedEntry,
}

#[derive(Debug, Deserialize)]
pub struct WireSavedEntry {
    pub id: u64,
    #[serde(default)]
    pub status: Option<MediaListStatus>,
}
