use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::error::CatalogError;
use super::types::{
    BatchPageData, GraphQlResponse, ListPageData, MediaData, SaveEntryData, UserData,
};
use crate::cache::Cache;
use crate::traits::{
    CatalogService, ListEntry, ListPage, Media, MediaListStatus, MutationResult, Profile,
};
use crate::transport::{GraphQlTransport, TransportError};

/// List pages change whenever the user edits their list; keep them
/// fresh-ish.
const USER_LIST_TTL: Duration = Duration::from_secs(30 * 60);

/// Relation graphs change rarely; cache details for a day.
const MEDIA_DETAILS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// AniList caps Page queries at 50 items.
const BATCH_PAGE_SIZE: usize = 50;

const PROFILE_QUERY: &str = r#"
query ($name: String) {
    User(name: $name) {
        id
        name
        avatar { large }
    }
}
"#;

const LIST_QUERY: &str = r#"
query ($username: String, $status: MediaListStatus, $page: Int, $perPage: Int) {
    Page(page: $page, perPage: $perPage) {
        pageInfo { currentPage hasNextPage }
        mediaList(userName: $username, type: ANIME, status: $status) {
            score(format: POINT_10_DECIMAL)
            media {
                id
                title { romaji english }
                format
                episodes
                duration
                coverImage { large }
                relations {
                    edges {
                        relationType
                        node { id title { romaji english } format coverImage { large } }
                    }
                }
            }
        }
    }
}
"#;

const MEDIA_DETAILS_QUERY: &str = r#"
query ($id: Int) {
    Media(id: $id, type: ANIME) {
        id
        title { romaji english }
        format
        episodes
        duration
        coverImage { large }
        relations {
            edges {
                relationType
                node { id title { romaji english } format coverImage { large } }
            }
        }
    }
}
"#;

const MEDIA_BATCH_QUERY: &str = r#"
query ($ids: [Int], $perPage: Int) {
    Page(page: 1, perPage: $perPage) {
        pageInfo { hasNextPage }
        media(id_in: $ids, type: ANIME) {
            id
            title { romaji english }
            format
            episodes
            duration
            coverImage { large }
            relations {
                edges {
                    relationType
                    node { id title { romaji english } format coverImage { large } }
                }
            }
        }
    }
}
"#;

const ADD_TO_LIST_MUTATION: &str = r#"
mutation ($mediaId: Int!, $status: MediaListStatus!) {
    SaveMediaListEntry(mediaId: $mediaId, status: $status) {
        id
        status
    }
}
"#;

/// AniList catalog client: typed operations over the GraphQL transport,
/// each with its own cache policy. The client is stateless about whose
/// cache entries exist; per-user invalidation is driven by callers.
pub struct AniListClient {
    transport: GraphQlTransport,
    cache: Arc<Cache>,
    token: Option<String>,
    list_ttl: Duration,
    media_ttl: Duration,
}

impl AniListClient {
    pub fn new(transport: GraphQlTransport, cache: Arc<Cache>) -> Self {
        Self {
            transport,
            cache,
            token: None,
            list_ttl: USER_LIST_TTL,
            media_ttl: MEDIA_DETAILS_TTL,
        }
    }

    /// Attach a bearer token for authenticated operations.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_ttls(mut self, list_ttl: Duration, media_ttl: Duration) -> Self {
        self.list_ttl = list_ttl;
        self.media_ttl = media_ttl;
        self
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, CatalogError> {
        tracing::debug!(operation, "AniList GraphQL request");
        let value = self
            .transport
            .request(query, variables, self.token.as_deref())
            .await?;

        if let Some(errors) = value.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                tracing::warn!(operation, "GraphQL errors in response");
                return Err(CatalogError::Api(
                    serde_json::Value::Array(errors.clone()).to_string(),
                ));
            }
        }

        serde_json::from_value(value).map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

fn user_list_key(username: &str, status: MediaListStatus, page: u32, per_page: u32) -> String {
    format!("user_list:{username}:{status}:{page}:{per_page}")
}

/// Prefix covering every cached list page of one user.
pub fn user_list_prefix(username: &str) -> String {
    format!("user_list:{username}:")
}

fn media_details_key(id: u64) -> String {
    format!("media_details:{id}")
}

/// AniList sometimes reports a missing user as a 500 whose error body
/// mentions "not found" instead of a proper 404. Best-effort guesswork,
/// not an upstream contract.
fn classify_profile_error(username: &str, err: CatalogError) -> CatalogError {
    match &err {
        CatalogError::Transport(TransportError::Api { status: 404, .. }) => {
            CatalogError::UserNotFound(username.to_owned())
        }
        CatalogError::Transport(TransportError::Api { status: 500, body })
            if body.to_lowercase().contains("not found") =>
        {
            CatalogError::UserNotFound(username.to_owned())
        }
        _ => err,
    }
}

impl CatalogService for AniListClient {
    async fn get_profile(&self, username: &str) -> Result<Profile, CatalogError> {
        let result: Result<GraphQlResponse<UserData>, CatalogError> = self
            .execute(
                "Profile",
                PROFILE_QUERY,
                serde_json::json!({ "name": username }),
            )
            .await;

        match result {
            Ok(resp) => resp
                .data
                .user
                .map(|u| u.into_profile())
                .ok_or_else(|| CatalogError::UserNotFound(username.to_owned())),
            Err(e) => Err(classify_profile_error(username, e)),
        }
    }

    async fn get_list(
        &self,
        username: &str,
        status: MediaListStatus,
        page: u32,
        per_page: u32,
    ) -> Result<ListPage, CatalogError> {
        let key = user_list_key(username, status, page, per_page);
        if let Some(cached) = self.cache.get::<ListPage>(&key) {
            return Ok(cached);
        }

        let resp: GraphQlResponse<ListPageData> = self
            .execute(
                "UserList",
                LIST_QUERY,
                serde_json::json!({
                    "username": username,
                    "status": status.as_str(),
                    "page": page,
                    "perPage": per_page,
                }),
            )
            .await?;

        let body = resp.data.page;
        let entries = body
            .media_list
            .into_iter()
            .filter_map(|e| {
                e.media.map(|media| ListEntry {
                    media,
                    score: e.score,
                })
            })
            .collect();
        let list_page = ListPage {
            entries,
            has_next_page: body.page_info.has_next_page,
        };

        self.cache.set(&key, &list_page, self.list_ttl);
        Ok(list_page)
    }

    async fn get_media_details(&self, id: u64) -> Result<Media, CatalogError> {
        let key = media_details_key(id);
        if let Some(cached) = self.cache.get::<Media>(&key) {
            return Ok(cached);
        }

        let resp: GraphQlResponse<MediaData> = self
            .execute(
                "MediaDetails",
                MEDIA_DETAILS_QUERY,
                serde_json::json!({ "id": id }),
            )
            .await?;

        let media = resp
            .data
            .media
            .ok_or_else(|| CatalogError::Parse(format!("media {id} missing from response")))?;

        self.cache.set(&key, &media, self.media_ttl);
        Ok(media)
    }

    async fn get_media_details_batch(&self, ids: &[u64]) -> Result<Vec<Media>, CatalogError> {
        let mut found = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();
        for &id in ids {
            match self.cache.get::<Media>(&media_details_key(id)) {
                Some(media) => found.push(media),
                None => misses.push(id),
            }
        }
        tracing::debug!(
            hits = found.len(),
            misses = misses.len(),
            "media batch cache partition"
        );

        for chunk in misses.chunks(BATCH_PAGE_SIZE) {
            let resp: GraphQlResponse<BatchPageData> = self
                .execute(
                    "MediaBatch",
                    MEDIA_BATCH_QUERY,
                    serde_json::json!({ "ids": chunk, "perPage": BATCH_PAGE_SIZE }),
                )
                .await?;

            for media in resp.data.page.media {
                self.cache
                    .set(&media_details_key(media.id), &media, self.media_ttl);
                found.push(media);
            }
        }

        Ok(found)
    }

    async fn add_to_list(
        &self,
        media_id: u64,
        status: MediaListStatus,
    ) -> Result<MutationResult, CatalogError> {
        let resp: GraphQlResponse<SaveEntryData> = self
            .execute(
                "AddToList",
                ADD_TO_LIST_MUTATION,
                serde_json::json!({
                    "mediaId": media_id,
                    "status": status.as_str(),
                }),
            )
            .await?;

        let saved = resp.data.save_media_list_entry;
        tracing::info!(media_id, entry_id = saved.id, "added media to list");
        Ok(MutationResult {
            entry_id: saved.id,
            status: saved.status,
        })
    }

    fn invalidate_user_lists(&self, username: &str) {
        self.cache.delete_by_prefix(&user_list_prefix(username));
    }
}
