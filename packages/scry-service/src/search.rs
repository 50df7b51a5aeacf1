use scry_search::{QueryOptions, SearchResults};

use crate::{Service, ServiceResult};

#[derive(Debug, Clone)]
pub struct SearchRequest {
	pub query: String,
	pub size: u32,
	pub categories: Vec<String>,
	/// Fuse lexical and vector legs when an embedding can be produced.
	pub use_hybrid: bool,
	pub latest_first: bool,
}

impl SearchRequest {
	pub fn new(query: &str, size: u32) -> Self {
		Self {
			query: query.to_string(),
			size,
			categories: Vec::new(),
			use_hybrid: true,
			latest_first: false,
		}
	}
}

impl Service {
	/// Embed, search, then re-weight by feedback history. The embedding and
	/// feedback stages degrade rather than fail: a dead embedding provider
	/// falls back to lexical search and a dead feedback store leaves engine
	/// order untouched.
	pub async fn search_chunks(&self, req: &SearchRequest) -> ServiceResult<SearchResults> {
		let embedding = if req.use_hybrid && !req.query.trim().is_empty() {
			match self.embed_checked(&[req.query.clone()]).await {
				Ok(mut vectors) => vectors.pop(),
				Err(err) => {
					tracing::warn!(error = %err, "Query embedding failed; using lexical search.");

					None
				},
			}
		} else {
			None
		};
		let opts = QueryOptions {
			categories: req.categories.clone(),
			latest_first: req.latest_first,
			..QueryOptions::chunks(&req.query, req.size)
		};
		let mut results = self.index.search(embedding.as_deref(), &opts).await;

		if let Err(err) = self.feedback.adjust_scores(&req.query, &mut results.hits).await {
			tracing::warn!(error = %err, "Feedback adjustment failed; keeping engine order.");
		}

		Ok(results)
	}
}
