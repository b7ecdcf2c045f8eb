use serde::{Deserialize, Serialize};

use zokuhen_api::traits::{MediaFormat, Profile};

/// One discovered sequel the user does not track. Immutable once
/// created; the finder only ever appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingSequel {
    /// The item whose SEQUEL edge led here. At depth 1 this is a
    /// tracked item; deeper, it is itself a previously missing sequel.
    pub base_id: u64,
    pub base_title: Option<String>,
    /// The user's score for the tracked item that started this chain.
    pub base_score: Option<f64>,
    pub missing_id: u64,
    pub missing_title: Option<String>,
    pub missing_cover: Option<String>,
    pub format: MediaFormat,
    /// 1 = direct sequel of a tracked item; >1 = found via deep search.
    pub depth: u32,
}

/// Final result of one discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequelReport {
    pub user: Profile,
    pub missing_sequels: Vec<MissingSequel>,
}
