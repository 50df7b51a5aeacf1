mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, EmbeddingProviderConfig, Engine, LlmProviderConfig, Postgres, Providers,
	Retrieval, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.chunking.chunk_size == 0 {
		return Err(Error::Validation {
			message: "chunking.chunk_size must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.min_chunk_size == 0 {
		return Err(Error::Validation {
			message: "chunking.min_chunk_size must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.overlap_size >= cfg.chunking.chunk_size {
		return Err(Error::Validation {
			message: "chunking.overlap_size must be less than chunking.chunk_size.".to_string(),
		});
	}

	if cfg.search.engine.endpoint.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.engine.endpoint must be non-empty.".to_string(),
		});
	}
	if cfg.search.engine.index.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.engine.index must be non-empty.".to_string(),
		});
	}
	if cfg.search.engine.rrf_pipeline.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.engine.rrf_pipeline must be non-empty.".to_string(),
		});
	}
	if cfg.search.engine.vector_dim == 0 {
		return Err(Error::Validation {
			message: "search.engine.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.search.engine.vector_dim != cfg.providers.embedding.dimensions {
		return Err(Error::Validation {
			message: "search.engine.vector_dim must match providers.embedding.dimensions."
				.to_string(),
		});
	}
	if cfg.search.engine.hybrid_size_multiplier == 0 {
		return Err(Error::Validation {
			message: "search.engine.hybrid_size_multiplier must be at least one.".to_string(),
		});
	}
	if !cfg.search.engine.min_score.is_finite() || cfg.search.engine.min_score < 0.0 {
		return Err(Error::Validation {
			message: "search.engine.min_score must be zero or greater.".to_string(),
		});
	}

	if !(1..=3).contains(&cfg.retrieval.max_attempts) {
		return Err(Error::Validation {
			message: "retrieval.max_attempts must be between 1 and 3.".to_string(),
		});
	}
	if cfg.retrieval.scope_threshold > 100 {
		return Err(Error::Validation {
			message: "retrieval.scope_threshold must be 100 or less.".to_string(),
		});
	}
	if !(1..=10).contains(&cfg.retrieval.utility_threshold) {
		return Err(Error::Validation {
			message: "retrieval.utility_threshold must be between 1 and 10.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.filter_confidence_floor) {
		return Err(Error::Validation {
			message: "retrieval.filter_confidence_floor must be in the range 0.0-1.0.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("judge", &cfg.providers.judge.api_key),
		("generator", &cfg.providers.generator.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	Ok(())
}
