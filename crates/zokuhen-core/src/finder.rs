//! Missing-sequel discovery: build the known set from the user's five
//! tracked lists, then walk SEQUEL edges breadth-first.

use std::collections::{HashMap, HashSet, VecDeque};

use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use zokuhen_api::traits::{
    CatalogService, ListEntry, Media, MediaListStatus, MutationResult, RelationEdge, RelationKind,
};
use zokuhen_api::CatalogError;

use crate::report::{MissingSequel, SequelReport};

/// Tuning knobs for one discovery run.
#[derive(Debug, Clone)]
pub struct FinderOptions {
    /// List page size requested from the remote service.
    pub per_page: u32,
    /// How many queued ids one deep-search batch fetch covers.
    pub batch_size: usize,
    /// Simultaneous list-fetch pagination streams.
    pub list_concurrency: usize,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            per_page: 50,
            batch_size: 50,
            list_concurrency: 2,
        }
    }
}

/// A queued deep-search candidate. The score of the tracked item that
/// started the chain rides along for provenance.
struct QueueItem {
    id: u64,
    depth: u32,
    origin_score: Option<f64>,
}

/// Statuses whose items are traversal roots. Paused and dropped items
/// still count as known but their sequels are not worth suggesting.
const ROOT_STATUSES: [MediaListStatus; 3] = [
    MediaListStatus::Completed,
    MediaListStatus::Current,
    MediaListStatus::Planning,
];

/// Find every sequel reachable from the user's tracked items that the
/// user does not already track, with default options.
pub async fn find_missing_sequels<C: CatalogService>(
    catalog: &C,
    username: &str,
    force_refresh: bool,
) -> Result<SequelReport, CatalogError> {
    find_missing_sequels_with(catalog, username, force_refresh, &FinderOptions::default()).await
}

pub async fn find_missing_sequels_with<C: CatalogService>(
    catalog: &C,
    username: &str,
    force_refresh: bool,
    opts: &FinderOptions,
) -> Result<SequelReport, CatalogError> {
    if force_refresh {
        catalog.invalidate_user_lists(username);
    }

    let user = catalog.get_profile(username).await?;
    info!(user = %user.name, "fetching tracked lists");

    // Fan out over the five statuses; each pagination stream runs to
    // completion, and any list-fetch failure aborts the whole run.
    let limiter = Semaphore::new(opts.list_concurrency);
    let fetches = MediaListStatus::ALL.iter().map(|&status| {
        let limiter = &limiter;
        async move {
            let _permit = limiter.acquire().await.expect("semaphore is never closed");
            let entries = fetch_all_pages(catalog, username, status, opts.per_page).await?;
            Ok::<_, CatalogError>((status, entries))
        }
    });
    let lists: Vec<(MediaListStatus, Vec<ListEntry>)> = try_join_all(fetches).await?;

    let count = |wanted: MediaListStatus| {
        lists
            .iter()
            .find(|(s, _)| *s == wanted)
            .map_or(0, |(_, e)| e.len())
    };
    info!(
        completed = count(MediaListStatus::Completed),
        current = count(MediaListStatus::Current),
        planning = count(MediaListStatus::Planning),
        paused = count(MediaListStatus::Paused),
        dropped = count(MediaListStatus::Dropped),
        "tracked lists fetched"
    );

    let mut known_ids: HashSet<u64> = lists
        .iter()
        .flat_map(|(_, entries)| entries.iter().map(|e| e.media.id))
        .collect();

    let mut missing: Vec<MissingSequel> = Vec::new();
    let mut queue: VecDeque<QueueItem> = VecDeque::new();

    // Depth 1: immediate sequels of the root items.
    for wanted in ROOT_STATUSES {
        let Some((_, entries)) = lists.iter().find(|(s, _)| *s == wanted) else {
            continue;
        };
        for entry in entries {
            for edge in &entry.media.relations.edges {
                let Some(node) = sequel_node(edge) else { continue };
                let Some(format) = node.format.filter(|f| f.is_anime()) else {
                    continue;
                };
                if !known_ids.insert(node.id) {
                    continue;
                }
                missing.push(MissingSequel {
                    base_id: entry.media.id,
                    base_title: entry.media.title.display().map(str::to_owned),
                    base_score: entry.score,
                    missing_id: node.id,
                    missing_title: node.title.display().map(str::to_owned),
                    missing_cover: node.cover_url().map(str::to_owned),
                    format,
                    depth: 1,
                });
                queue.push_back(QueueItem {
                    id: node.id,
                    depth: 2,
                    origin_score: entry.score,
                });
            }
        }
    }

    // Deep search: chains of sequels beyond the direct ones. Batches
    // are best-effort; a failed fetch loses that batch's expansions but
    // never the run.
    while !queue.is_empty() {
        let batch: Vec<QueueItem> = (0..opts.batch_size)
            .map_while(|_| queue.pop_front())
            .collect();
        let ids: Vec<u64> = batch.iter().map(|item| item.id).collect();

        let fetched = match catalog.get_media_details_batch(&ids).await {
            Ok(media) => media,
            Err(e) => {
                warn!(error = %e, batch_len = ids.len(), "deep-search batch failed, skipping");
                continue;
            }
        };
        // Remote result order is unspecified; re-associate by id so the
        // output stays in queue order.
        let by_id: HashMap<u64, Media> = fetched.into_iter().map(|m| (m.id, m)).collect();

        for item in batch {
            let Some(media) = by_id.get(&item.id) else {
                debug!(id = item.id, "queued sequel has no resolvable details, skipping");
                continue;
            };
            for edge in &media.relations.edges {
                let Some(node) = sequel_node(edge) else { continue };
                let Some(format) = node.format.filter(|f| f.is_anime()) else {
                    continue;
                };
                if !known_ids.insert(node.id) {
                    continue;
                }
                missing.push(MissingSequel {
                    base_id: media.id,
                    base_title: media.title.display().map(str::to_owned),
                    base_score: item.origin_score,
                    missing_id: node.id,
                    missing_title: node.title.display().map(str::to_owned),
                    missing_cover: node.cover_url().map(str::to_owned),
                    format,
                    depth: item.depth,
                });
                queue.push_back(QueueItem {
                    id: node.id,
                    depth: item.depth + 1,
                    origin_score: item.origin_score,
                });
            }
        }
    }

    info!(found = missing.len(), "discovery complete");
    Ok(SequelReport {
        user,
        missing_sequels: missing,
    })
}

/// Submit a list mutation and, on success, force freshness for the
/// acting user's cached list pages.
pub async fn add_to_list<C: CatalogService>(
    catalog: &C,
    username: &str,
    media_id: u64,
    status: MediaListStatus,
) -> Result<MutationResult, CatalogError> {
    let result = catalog.add_to_list(media_id, status).await?;
    catalog.invalidate_user_lists(username);
    Ok(result)
}

/// Fetch every page of one status, in strictly increasing page order.
async fn fetch_all_pages<C: CatalogService>(
    catalog: &C,
    username: &str,
    status: MediaListStatus,
    per_page: u32,
) -> Result<Vec<ListEntry>, CatalogError> {
    let mut entries = Vec::new();
    let mut page = 1u32;
    loop {
        let list_page = catalog.get_list(username, status, page, per_page).await?;
        entries.extend(list_page.entries);
        if !list_page.has_next_page {
            break;
        }
        page += 1;
    }
    debug!(status = %status, count = entries.len(), "status list fetched");
    Ok(entries)
}

fn sequel_node(edge: &RelationEdge) -> Option<&Media> {
    if edge.relation_type == Some(RelationKind::Sequel) {
        edge.node.as_ref()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use zokuhen_api::traits::{ListPage, MediaFormat, Profile, Relations, Title};

    use super::*;

    struct FakeCatalog {
        profile: Option<Profile>,
        pages: HashMap<MediaListStatus, Vec<Vec<ListEntry>>>,
        details: HashMap<u64, Media>,
        fail_batches: bool,
        batch_calls: Mutex<Vec<Vec<u64>>>,
        invalidations: Mutex<Vec<String>>,
        mutations: Mutex<Vec<(u64, MediaListStatus)>>,
    }

    impl FakeCatalog {
        fn new() -> Self {
            Self {
                profile: Some(Profile {
                    id: 1,
                    name: "alice".to_string(),
                    avatar: None,
                }),
                pages: HashMap::new(),
                details: HashMap::new(),
                fail_batches: false,
                batch_calls: Mutex::new(Vec::new()),
                invalidations: Mutex::new(Vec::new()),
                mutations: Mutex::new(Vec::new()),
            }
        }

        fn with_list(mut self, status: MediaListStatus, entries: Vec<ListEntry>) -> Self {
            self.pages.insert(status, vec![entries]);
            self
        }

        fn with_paged_list(mut self, status: MediaListStatus, pages: Vec<Vec<ListEntry>>) -> Self {
            self.pages.insert(status, pages);
            self
        }

        fn with_details(mut self, media: Media) -> Self {
            self.details.insert(media.id, media);
            self
        }
    }

    impl CatalogService for FakeCatalog {
        async fn get_profile(&self, username: &str) -> Result<Profile, CatalogError> {
            self.profile
                .clone()
                .ok_or_else(|| CatalogError::UserNotFound(username.to_owned()))
        }

        async fn get_list(
            &self,
            _username: &str,
            status: MediaListStatus,
            page: u32,
            _per_page: u32,
        ) -> Result<ListPage, CatalogError> {
            let pages = self.pages.get(&status).cloned().unwrap_or_default();
            let index = (page - 1) as usize;
            Ok(ListPage {
                entries: pages.get(index).cloned().unwrap_or_default(),
                has_next_page: (index + 1) < pages.len(),
            })
        }

        async fn get_media_details(&self, id: u64) -> Result<Media, CatalogError> {
            self.details
                .get(&id)
                .cloned()
                .ok_or_else(|| CatalogError::Parse(format!("no details for {id}")))
        }

        async fn get_media_details_batch(&self, ids: &[u64]) -> Result<Vec<Media>, CatalogError> {
            self.batch_calls.lock().unwrap().push(ids.to_vec());
            if self.fail_batches {
                return Err(CatalogError::Api("batch fetch failed".to_string()));
            }
            // Scrambled on purpose: callers must re-associate by id.
            Ok(ids
                .iter()
                .rev()
                .filter_map(|id| self.details.get(id).cloned())
                .collect())
        }

        async fn add_to_list(
            &self,
            media_id: u64,
            status: MediaListStatus,
        ) -> Result<MutationResult, CatalogError> {
            self.mutations.lock().unwrap().push((media_id, status));
            Ok(MutationResult {
                entry_id: 1000 + media_id,
                status: Some(status),
            })
        }

        fn invalidate_user_lists(&self, username: &str) {
            self.invalidations.lock().unwrap().push(username.to_owned());
        }
    }

    fn anime(id: u64, title: &str) -> Media {
        Media {
            id,
            title: Title {
                romaji: Some(title.to_string()),
                english: None,
            },
            format: Some(MediaFormat::Tv),
            episodes: None,
            duration: None,
            cover_image: None,
            relations: Relations::default(),
        }
    }

    fn with_format(mut media: Media, format: Option<MediaFormat>) -> Media {
        media.format = format;
        media
    }

    fn with_sequel(mut media: Media, node: Media) -> Media {
        media.relations.edges.push(RelationEdge {
            relation_type: Some(RelationKind::Sequel),
            node: Some(node),
        });
        media
    }

    fn entry(media: Media) -> ListEntry {
        ListEntry { media, score: None }
    }

    fn scored(media: Media, score: f64) -> ListEntry {
        ListEntry {
            media,
            score: Some(score),
        }
    }

    #[tokio::test]
    async fn test_empty_lists_give_empty_report() {
        let catalog = FakeCatalog::new();
        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        assert_eq!(report.user.name, "alice");
        assert!(report.missing_sequels.is_empty());
    }

    #[tokio::test]
    async fn test_direct_missing_sequel_found() {
        let catalog = FakeCatalog::new()
            .with_list(
                MediaListStatus::Completed,
                vec![entry(with_sequel(anime(1, "Anime A"), anime(2, "Anime B")))],
            )
            .with_details(anime(2, "Anime B"));

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();

        assert_eq!(report.missing_sequels.len(), 1);
        let record = &report.missing_sequels[0];
        assert_eq!(record.base_id, 1);
        assert_eq!(record.missing_id, 2);
        assert_eq!(record.missing_title.as_deref(), Some("Anime B"));
        assert_eq!(record.depth, 1);
        assert_eq!(record.format, MediaFormat::Tv);

        let calls = catalog.batch_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[vec![2]]);
    }

    #[tokio::test]
    async fn test_tracked_sequel_not_reported() {
        let catalog = FakeCatalog::new()
            .with_list(
                MediaListStatus::Completed,
                vec![entry(with_sequel(anime(1, "Anime A"), anime(2, "Anime B")))],
            )
            .with_list(MediaListStatus::Planning, vec![entry(anime(2, "Anime B"))]);

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        assert!(report.missing_sequels.is_empty());
        assert!(catalog.batch_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chain_discovered_breadth_first() {
        let catalog = FakeCatalog::new()
            .with_list(
                MediaListStatus::Completed,
                vec![scored(
                    with_sequel(anime(1, "Anime A"), anime(2, "Anime B")),
                    9.0,
                )],
            )
            .with_details(with_sequel(anime(2, "Anime B"), anime(3, "Anime C")))
            .with_details(anime(3, "Anime C"));

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();

        assert_eq!(report.missing_sequels.len(), 2);
        let b = &report.missing_sequels[0];
        assert_eq!((b.base_id, b.missing_id, b.depth), (1, 2, 1));
        let c = &report.missing_sequels[1];
        assert_eq!((c.base_id, c.missing_id, c.depth), (2, 3, 2));
        // Deeper records descend from a prior missing_id, and the
        // origin score rides the whole chain.
        assert_eq!(c.base_id, b.missing_id);
        assert_eq!(b.base_score, Some(9.0));
        assert_eq!(c.base_score, Some(9.0));
    }

    #[tokio::test]
    async fn test_non_anime_formats_filtered() {
        let manga = with_format(anime(20, "Some Manga"), Some(MediaFormat::Other));
        let unknown = with_format(anime(21, "No Format"), None);
        let base = with_sequel(with_sequel(anime(1, "Anime A"), manga), unknown);
        let catalog = FakeCatalog::new().with_list(MediaListStatus::Completed, vec![entry(base)]);

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        assert!(report.missing_sequels.is_empty());
    }

    #[tokio::test]
    async fn test_shared_sequel_reported_once() {
        let catalog = FakeCatalog::new()
            .with_list(
                MediaListStatus::Completed,
                vec![
                    entry(with_sequel(anime(1, "Anime A1"), anime(3, "Anime B"))),
                    entry(with_sequel(anime(2, "Anime A2"), anime(3, "Anime B"))),
                ],
            )
            .with_details(anime(3, "Anime B"));

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        assert_eq!(report.missing_sequels.len(), 1);
        assert_eq!(report.missing_sequels[0].base_id, 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_distinguished() {
        let mut catalog = FakeCatalog::new();
        catalog.profile = None;
        let err = find_missing_sequels(&catalog, "ghost", false)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UserNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_failed_batch_skipped_not_fatal() {
        let mut catalog = FakeCatalog::new().with_list(
            MediaListStatus::Completed,
            vec![entry(with_sequel(anime(1, "Anime A"), anime(2, "Anime B")))],
        );
        catalog.fail_batches = true;

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();

        // The depth-1 discovery survives; only its expansion is lost.
        assert_eq!(report.missing_sequels.len(), 1);
        assert_eq!(report.missing_sequels[0].missing_id, 2);
    }

    #[tokio::test]
    async fn test_paused_and_dropped_known_but_not_roots() {
        let catalog = FakeCatalog::new()
            .with_list(
                MediaListStatus::Completed,
                vec![entry(with_sequel(anime(1, "Anime A"), anime(4, "Dropped One")))],
            )
            .with_list(
                MediaListStatus::Paused,
                vec![entry(with_sequel(anime(5, "Paused One"), anime(6, "Anime Q")))],
            )
            .with_list(MediaListStatus::Dropped, vec![entry(anime(4, "Dropped One"))]);

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        // 4 is dropped, hence known; 6 is only reachable from a paused
        // root, which is not traversed.
        assert!(report.missing_sequels.is_empty());
    }

    #[tokio::test]
    async fn test_pagination_exhausts_all_pages() {
        let catalog = FakeCatalog::new().with_paged_list(
            MediaListStatus::Completed,
            vec![
                vec![entry(with_sequel(anime(1, "Anime A"), anime(2, "Anime B")))],
                vec![entry(anime(2, "Anime B"))],
            ],
        );

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        // Page 2 put the sequel into the known set before scanning.
        assert!(report.missing_sequels.is_empty());
    }

    #[tokio::test]
    async fn test_insertion_order_depth_one_first() {
        let catalog = FakeCatalog::new()
            .with_list(
                MediaListStatus::Completed,
                vec![
                    entry(with_sequel(anime(1, "Anime A1"), anime(10, "Anime B"))),
                    entry(with_sequel(anime(2, "Anime A2"), anime(11, "Anime C"))),
                ],
            )
            .with_details(with_sequel(anime(10, "Anime B"), anime(12, "Anime D")))
            .with_details(anime(11, "Anime C"))
            .with_details(anime(12, "Anime D"));

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        let order: Vec<(u64, u32)> = report
            .missing_sequels
            .iter()
            .map(|r| (r.missing_id, r.depth))
            .collect();
        assert_eq!(order, vec![(10, 1), (11, 1), (12, 2)]);
    }

    #[tokio::test]
    async fn test_force_refresh_invalidates_before_fetch() {
        let catalog = FakeCatalog::new();
        find_missing_sequels(&catalog, "alice", true).await.unwrap();
        assert_eq!(
            catalog.invalidations.lock().unwrap().as_slice(),
            &["alice".to_string()]
        );
    }

    #[tokio::test]
    async fn test_add_to_list_invalidates_user_lists() {
        let catalog = FakeCatalog::new();
        let result = add_to_list(&catalog, "alice", 42, MediaListStatus::Planning)
            .await
            .unwrap();
        assert_eq!(result.entry_id, 1042);
        assert_eq!(
            catalog.mutations.lock().unwrap().as_slice(),
            &[(42, MediaListStatus::Planning)]
        );
        assert_eq!(
            catalog.invalidations.lock().unwrap().as_slice(),
            &["alice".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unresolvable_relation_node_skipped() {
        let mut base = anime(1, "Anime A");
        base.relations.edges.push(RelationEdge {
            relation_type: Some(RelationKind::Sequel),
            node: None,
        });
        let catalog = FakeCatalog::new().with_list(MediaListStatus::Completed, vec![entry(base)]);

        let report = find_missing_sequels(&catalog, "alice", false).await.unwrap();
        assert!(report.missing_sequels.is_empty());
    }
}
