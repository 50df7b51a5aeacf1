pub mod evaluate;
pub mod ingest;
pub mod retrieval;
pub mod rewrite;
pub mod search;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use evaluate::{
	GradeVerdict, RelevanceLabel, RelevanceVerdict, RetrievalDecision, ScopeVerdict, SupportLevel,
	SupportVerdict, UtilityVerdict,
};
pub use ingest::{IngestReport, SetupReport};
pub use retrieval::{AttemptOutcome, RetrievalOutcome, RetrievalRequest, RetryReason};
pub use rewrite::RewriteOutcome;
pub use search::SearchRequest;

use scry_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use scry_feedback::FeedbackStore;
use scry_providers::{chat, embedding, judge};
use scry_search::SearchIndex;

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// Judge calls return a JSON verdict object; the shape depends on the prompt.
pub trait JudgeProvider
where
	Self: Send + Sync,
{
	fn judge<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

pub trait GeneratorProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	Provider { message: String },
	Storage { message: String },
	Search { message: String },
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub judge: Arc<dyn JudgeProvider>,
	pub generator: Arc<dyn GeneratorProvider>,
}

pub struct Service {
	pub cfg: Config,
	pub index: SearchIndex,
	pub feedback: FeedbackStore,
	pub providers: Providers,
}

struct DefaultProviders;

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
			Self::Search { message } => write!(f, "Search error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<scry_feedback::Error> for ServiceError {
	fn from(err: scry_feedback::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<scry_search::Error> for ServiceError {
	fn from(err: scry_search::Error) -> Self {
		Self::Search { message: err.to_string() }
	}
}

impl From<scry_chunking::Error> for ServiceError {
	fn from(err: scry_chunking::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl JudgeProvider for DefaultProviders {
	fn judge<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(judge::invoke(cfg, messages))
	}
}

impl GeneratorProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(chat::complete(cfg, messages))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		judge: Arc<dyn JudgeProvider>,
		generator: Arc<dyn GeneratorProvider>,
	) -> Self {
		Self { embedding, judge, generator }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { embedding: provider.clone(), judge: provider.clone(), generator: provider }
	}
}

impl Service {
	pub fn new(cfg: Config, index: SearchIndex, feedback: FeedbackStore) -> Self {
		Self { cfg, index, feedback, providers: Providers::default() }
	}

	pub fn with_providers(
		cfg: Config,
		index: SearchIndex,
		feedback: FeedbackStore,
		providers: Providers,
	) -> Self {
		Self { cfg, index, feedback, providers }
	}

	pub(crate) fn chunker(&self) -> ServiceResult<scry_chunking::Chunker> {
		let cfg = &self.cfg.chunking;

		Ok(scry_chunking::Chunker::new(scry_chunking::ChunkerConfig {
			chunk_size: cfg.chunk_size as usize,
			overlap_size: cfg.overlap_size as usize,
			min_chunk_size: cfg.min_chunk_size as usize,
			use_sections: cfg.use_sections,
		})?)
	}

	/// Embed texts and check the dimension the index was built with.
	pub(crate) async fn embed_checked(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, texts).await?;

		if vectors.len() != texts.len() {
			return Err(ServiceError::Provider {
				message: "Embedding provider returned the wrong number of vectors.".to_string(),
			});
		}

		let expected = self.cfg.search.engine.vector_dim as usize;

		if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected) {
			return Err(ServiceError::Provider {
				message: format!(
					"Embedding vector dimension mismatch: got {}, expected {expected}.",
					vector.len()
				),
			});
		}

		Ok(vectors)
	}
}
