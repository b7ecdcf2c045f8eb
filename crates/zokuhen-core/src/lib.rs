//! Sequel-discovery engine: given an AniList username, find every
//! sequel reachable over SEQUEL relation edges that the user does not
//! already track.

pub mod config;
pub mod error;
pub mod finder;
pub mod report;

pub use config::AppConfig;
pub use error::ZokuhenError;
pub use finder::{add_to_list, find_missing_sequels, find_missing_sequels_with, FinderOptions};
pub use report::{MissingSequel, SequelReport};
