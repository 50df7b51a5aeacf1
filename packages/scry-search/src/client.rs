use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
	Error, Result,
	mapping::{chunk_index_mapping, fusion_pipeline_body},
	query::{QueryOptions, build_query},
};

/// One chunk document as stored in the engine.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
	pub chunk_text: String,
	pub title: String,
	#[serde(rename = "abstract")]
	pub abstract_text: String,
	pub external_id: String,
	pub document_id: String,
	pub chunk_index: i32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub section_title: Option<String>,
	pub categories: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub published_date: Option<String>,
	pub word_count: usize,
	pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
	pub chunk_id: String,
	pub chunk_text: String,
	pub title: String,
	pub abstract_text: String,
	pub external_id: String,
	pub document_id: String,
	pub chunk_index: i64,
	pub section_title: Option<String>,
	pub score: f64,
	pub highlights: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
	pub total: u64,
	pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Copy)]
pub struct BulkReport {
	pub success: usize,
	pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct IndexStats {
	pub index: String,
	pub exists: bool,
	pub document_count: u64,
	pub size_in_bytes: Option<u64>,
}

/// HTTP client for the search engine's JSON API. Search failures degrade to
/// empty result sets so a flaky engine slows retrieval down instead of
/// breaking it; indexing and setup failures propagate.
pub struct SearchIndex {
	http: Client,
	endpoint: String,
	index: String,
	pipeline: String,
	hybrid_size_multiplier: u32,
	min_score: f64,
	vector_dim: u32,
}

impl SearchIndex {
	pub fn new(cfg: &scry_config::Engine) -> Result<Self> {
		let http = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			http,
			endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
			index: cfg.index.clone(),
			pipeline: cfg.rrf_pipeline.clone(),
			hybrid_size_multiplier: cfg.hybrid_size_multiplier,
			min_score: f64::from(cfg.min_score),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn index_name(&self) -> &str {
		&self.index
	}

	pub async fn health(&self) -> bool {
		let url = format!("{}/_cluster/health", self.endpoint);

		match self.get_json(&url).await {
			Ok(body) => matches!(body["status"].as_str(), Some("green") | Some("yellow")),
			Err(err) => {
				tracing::warn!(error = %err, "Engine health check failed.");

				false
			},
		}
	}

	pub async fn stats(&self) -> Result<IndexStats> {
		if !self.index_exists().await? {
			return Ok(IndexStats {
				index: self.index.clone(),
				exists: false,
				document_count: 0,
				size_in_bytes: None,
			});
		}

		let url = format!("{}/{}/_stats", self.endpoint, self.index);
		let body = self.get_json(&url).await?;
		let total = &body["indices"][&self.index]["total"];

		Ok(IndexStats {
			index: self.index.clone(),
			exists: true,
			document_count: total["docs"]["count"].as_u64().unwrap_or(0),
			size_in_bytes: total["store"]["size_in_bytes"].as_u64(),
		})
	}

	/// Create the chunk index if missing. `force` drops and recreates it.
	/// Returns whether the index was (re)created.
	pub async fn ensure_index(&self, force: bool) -> Result<bool> {
		let exists = self.index_exists().await?;
		let url = format!("{}/{}", self.endpoint, self.index);

		if force && exists {
			expect_ok(self.http.delete(&url).send().await?).await?;
			tracing::info!(index = %self.index, "Deleted existing chunk index.");
		}

		if exists && !force {
			tracing::info!(index = %self.index, "Chunk index already exists.");

			return Ok(false);
		}

		let mapping = chunk_index_mapping(self.vector_dim);

		expect_ok(self.http.put(&url).json(&mapping).send().await?).await?;
		tracing::info!(index = %self.index, "Created chunk index.");

		Ok(true)
	}

	/// Install the fusion pipeline if missing. Returns whether it was created.
	pub async fn ensure_pipeline(&self, force: bool) -> Result<bool> {
		let url = format!("{}/_search/pipeline/{}", self.endpoint, self.pipeline);

		if force {
			// Missing pipeline on delete is fine.
			let _ = self.http.delete(&url).send().await;
		} else if self.http.get(&url).send().await?.status().is_success() {
			tracing::info!(pipeline = %self.pipeline, "Fusion pipeline already exists.");

			return Ok(false);
		}

		expect_ok(self.http.put(&url).json(&fusion_pipeline_body()).send().await?).await?;
		tracing::info!(pipeline = %self.pipeline, "Created fusion pipeline.");

		Ok(true)
	}

	/// Lexical-only search. Engine failures log and return an empty set.
	pub async fn search_lexical(&self, opts: &QueryOptions) -> SearchResults {
		let url = format!("{}/{}/_search", self.endpoint, self.index);
		let body = build_query(opts);

		match self.post_json(&url, &body).await {
			Ok(response) => parse_search_results(&response),
			Err(err) => {
				tracing::warn!(error = %err, "Lexical search failed; returning empty results.");

				SearchResults::default()
			},
		}
	}

	/// Vector-only k-NN search with an optional category filter.
	pub async fn search_vector(
		&self,
		embedding: &[f32],
		size: u32,
		categories: &[String],
	) -> SearchResults {
		let url = format!("{}/{}/_search", self.endpoint, self.index);
		let knn = json!({ "knn": { "embedding": { "vector": embedding, "k": size } } });
		let query = if categories.is_empty() {
			knn
		} else {
			json!({
				"bool": {
					"must": [knn],
					"filter": [{ "terms": { "categories": categories } }],
				},
			})
		};
		let body = json!({
			"size": size,
			"query": query,
			"_source": { "excludes": ["embedding"] },
		});

		match self.post_json(&url, &body).await {
			Ok(response) => parse_search_results(&response),
			Err(err) => {
				tracing::warn!(error = %err, "Vector search failed; returning empty results.");

				SearchResults::default()
			},
		}
	}

	/// Hybrid search: one lexical and one k-NN sub-query, fused engine-side by
	/// the search pipeline. Both legs over-fetch so fusion has enough
	/// candidates, then the final page is cut back to `size` and filtered by
	/// the configured score floor.
	pub async fn search_hybrid(
		&self,
		query: &str,
		embedding: &[f32],
		size: u32,
		categories: &[String],
	) -> SearchResults {
		let fetch = size * self.hybrid_size_multiplier;
		let lexical_opts = QueryOptions {
			categories: categories.to_vec(),
			..QueryOptions::chunks(query, fetch)
		};
		let lexical_body = build_query(&lexical_opts);
		let body = json!({
			"size": size,
			"query": {
				"hybrid": {
					"queries": [
						lexical_body["query"],
						{ "knn": { "embedding": { "vector": embedding, "k": fetch } } },
					],
				},
			},
			"_source": lexical_body["_source"],
			"highlight": lexical_body["highlight"],
		});
		let url = format!(
			"{}/{}/_search?search_pipeline={}",
			self.endpoint, self.index, self.pipeline
		);

		match self.post_json(&url, &body).await {
			Ok(response) => {
				let mut results = parse_search_results(&response);

				apply_min_score(&mut results, self.min_score);
				tracing::debug!(
					query = %truncate(query, 50),
					total = results.total,
					"Hybrid search completed."
				);

				results
			},
			Err(err) => {
				tracing::warn!(error = %err, "Hybrid search failed; returning empty results.");

				SearchResults::default()
			},
		}
	}

	/// Hybrid when an embedding is available, lexical otherwise.
	pub async fn search(&self, embedding: Option<&[f32]>, opts: &QueryOptions) -> SearchResults {
		match embedding {
			Some(vector) => {
				self.search_hybrid(&opts.query, vector, opts.size, &opts.categories).await
			},
			None => self.search_lexical(opts).await,
		}
	}

	/// Index one chunk, refreshing so it is searchable immediately.
	pub async fn index_chunk(&self, record: &ChunkRecord) -> Result<bool> {
		let url = format!("{}/{}/_doc?refresh=true", self.endpoint, self.index);
		let response = self.post_json(&url, &serde_json::to_value(record)?).await?;

		Ok(matches!(response["result"].as_str(), Some("created") | Some("updated")))
	}

	/// Bulk-index chunks via the NDJSON endpoint, counting per-item failures.
	pub async fn bulk_index(&self, records: &[ChunkRecord]) -> Result<BulkReport> {
		if records.is_empty() {
			return Ok(BulkReport { success: 0, failed: 0 });
		}

		let mut payload = String::new();

		for record in records {
			payload.push_str(&serde_json::to_string(
				&json!({ "index": { "_index": self.index } }),
			)?);
			payload.push('\n');
			payload.push_str(&serde_json::to_string(record)?);
			payload.push('\n');
		}

		let url = format!("{}/_bulk?refresh=true", self.endpoint);
		let response = expect_ok(
			self.http
				.post(&url)
				.header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
				.body(payload)
				.send()
				.await?,
		)
		.await?;
		let body: Value = response.json().await?;
		let failed = body["items"]
			.as_array()
			.map(|items| {
				items.iter().filter(|item| !item["index"]["error"].is_null()).count()
			})
			.unwrap_or(0);
		let report = BulkReport { success: records.len() - failed, failed };

		tracing::info!(success = report.success, failed = report.failed, "Bulk indexed chunks.");

		Ok(report)
	}

	/// Delete every chunk of a document, keyed by its public identifier.
	/// Returns the number of chunks removed.
	pub async fn delete_document(&self, external_id: &str) -> Result<u64> {
		let url = format!("{}/{}/_delete_by_query?refresh=true", self.endpoint, self.index);
		let body = json!({ "query": { "term": { "external_id": external_id } } });
		let response = self.post_json(&url, &body).await?;
		let deleted = response["deleted"].as_u64().unwrap_or(0);

		tracing::info!(external_id = %external_id, deleted, "Deleted document chunks.");

		Ok(deleted)
	}

	/// Fetch a document's chunks in index order.
	pub async fn chunks_for_document(&self, external_id: &str) -> Result<Vec<SearchHit>> {
		let url = format!("{}/{}/_search", self.endpoint, self.index);
		let body = json!({
			"query": { "term": { "external_id": external_id } },
			"size": 1000,
			"sort": [{ "chunk_index": "asc" }],
			"_source": { "excludes": ["embedding"] },
		});
		let response = self.post_json(&url, &body).await?;

		Ok(parse_search_results(&response).hits)
	}

	async fn index_exists(&self) -> Result<bool> {
		let url = format!("{}/{}", self.endpoint, self.index);
		let status = self.http.head(&url).send().await?.status();

		Ok(status.is_success())
	}

	async fn get_json(&self, url: &str) -> Result<Value> {
		let response = expect_ok(self.http.get(url).send().await?).await?;

		Ok(response.json().await?)
	}

	async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
		let response = expect_ok(self.http.post(url).json(body).send().await?).await?;

		Ok(response.json().await?)
	}
}

async fn expect_ok(response: Response) -> Result<Response> {
	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();

	Err(Error::Engine { status: status.as_u16(), body })
}

pub(crate) fn parse_search_results(response: &Value) -> SearchResults {
	let hits = response["hits"]["hits"]
		.as_array()
		.map(|hits| hits.iter().map(parse_hit).collect())
		.unwrap_or_default();
	let total = response["hits"]["total"]["value"]
		.as_u64()
		.or_else(|| response["hits"]["total"].as_u64())
		.unwrap_or_else(|| {
			response["hits"]["hits"].as_array().map(|h| h.len() as u64).unwrap_or(0)
		});

	SearchResults { total, hits }
}

fn parse_hit(hit: &Value) -> SearchHit {
	let source = &hit["_source"];

	SearchHit {
		chunk_id: hit["_id"].as_str().unwrap_or_default().to_string(),
		chunk_text: source["chunk_text"].as_str().unwrap_or_default().to_string(),
		title: source["title"].as_str().unwrap_or_default().to_string(),
		abstract_text: source["abstract"].as_str().unwrap_or_default().to_string(),
		external_id: source["external_id"].as_str().unwrap_or_default().to_string(),
		document_id: source["document_id"].as_str().unwrap_or_default().to_string(),
		chunk_index: source["chunk_index"].as_i64().unwrap_or(0),
		section_title: source["section_title"].as_str().map(str::to_string),
		score: hit["_score"].as_f64().unwrap_or(0.0),
		highlights: hit.get("highlight").filter(|h| !h.is_null()).cloned(),
	}
}

/// Drop hits under the score floor and recompute the total to match.
pub fn apply_min_score(results: &mut SearchResults, min_score: f64) {
	if min_score <= 0.0 {
		return;
	}

	results.hits.retain(|hit| hit.score >= min_score);
	results.total = results.hits.len() as u64;
}

fn truncate(text: &str, max: usize) -> &str {
	match text.char_indices().nth(max) {
		Some((offset, _)) => &text[..offset],
		None => text,
	}
}
