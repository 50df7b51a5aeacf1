use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	index: usize,
	embedding: Vec<f32>,
}

/// Batch-embed texts. Vectors come back in input order no matter how the
/// provider ordered them, and every vector is checked against the configured
/// dimension so a misconfigured model fails here instead of at indexing time.
pub async fn embed(
	cfg: &scry_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let response: EmbeddingResponse = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;

	collect_vectors(response, texts.len(), cfg.dimensions)
}

fn collect_vectors(
	mut response: EmbeddingResponse,
	expected: usize,
	dimensions: u32,
) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected {
		return Err(eyre::eyre!(
			"Embedding response carries {} vectors for {expected} inputs.",
			response.data.len()
		));
	}

	response.data.sort_by_key(|item| item.index);

	if let Some(item) =
		response.data.iter().find(|item| item.embedding.len() != dimensions as usize)
	{
		return Err(eyre::eyre!(
			"Embedding dimension mismatch: got {}, expected {dimensions}.",
			item.embedding.len()
		));
	}

	Ok(response.data.into_iter().map(|item| item.embedding).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(index: usize, embedding: Vec<f32>) -> EmbeddingItem {
		EmbeddingItem { index, embedding }
	}

	#[test]
	fn vectors_come_back_in_input_order() {
		let response =
			EmbeddingResponse { data: vec![item(1, vec![2.0, 3.0]), item(0, vec![0.5, 1.5])] };
		let parsed = collect_vectors(response, 2, 2).expect("parse failed");

		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn missing_vectors_are_an_error() {
		let response = EmbeddingResponse { data: vec![item(0, vec![0.5, 1.5])] };

		assert!(collect_vectors(response, 2, 2).is_err());
	}

	#[test]
	fn wrong_dimension_is_an_error() {
		let response = EmbeddingResponse { data: vec![item(0, vec![0.5, 1.5, 2.5])] };

		assert!(collect_vectors(response, 1, 2).is_err());
	}
}
