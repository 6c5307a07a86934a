pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod report;
pub mod store;

pub use catalog::{fetch_column_classifications, fetch_column_occurrences, Scope};
pub use config::Config;
pub use error::{Result, SchemaGraphError};
pub use matcher::{match_candidates, MatchingMode, RelationshipCandidate};
pub use store::{RelationshipRecord, RelationshipStore};
