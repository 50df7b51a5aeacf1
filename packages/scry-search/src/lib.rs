pub mod client;
pub mod error;
pub mod mapping;
pub mod query;

pub use client::{
	BulkReport, ChunkRecord, IndexStats, SearchHit, SearchIndex, SearchResults, apply_min_score,
};
pub use error::{Error, Result};
pub use query::{QueryOptions, build_query};
