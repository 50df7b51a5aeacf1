use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub chunking: Chunking,
	pub search: Search,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Chunking {
	/// Window size in words.
	pub chunk_size: u32,
	/// Words shared between adjacent windows. Must stay below `chunk_size`.
	pub overlap_size: u32,
	/// Documents shorter than this become a single chunk.
	pub min_chunk_size: u32,
	/// Prefer section-based chunking when a section map is available.
	pub use_sections: bool,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub engine: Engine,
}

#[derive(Debug, Deserialize)]
pub struct Engine {
	pub endpoint: String,
	pub index: String,
	pub vector_dim: u32,
	pub rrf_pipeline: String,
	pub hybrid_size_multiplier: u32,
	pub min_score: f32,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub judge: LlmProviderConfig,
	pub generator: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	/// Search/rewrite/regenerate budget per user turn. Hard-capped at 3.
	pub max_attempts: u32,
	/// Scope guardrail pass mark on the 0-100 scale.
	pub scope_threshold: u32,
	/// Utility pass mark on the 1-10 scale.
	pub utility_threshold: u32,
	/// Relevance filter drops hits the judge scores below this confidence.
	pub filter_confidence_floor: f32,
}
