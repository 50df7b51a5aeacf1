//! Index mapping and search-pipeline bodies sent to the engine at setup.

use serde_json::{Value, json};

/// Chunk index mapping: text fields for lexical scoring plus an HNSW vector
/// field for k-NN, cosine space on the Lucene engine.
pub fn chunk_index_mapping(vector_dim: u32) -> Value {
	json!({
		"settings": {
			"index": {
				"knn": true,
				"knn.space_type": "cosinesimil",
			},
			"analysis": {
				"analyzer": { "default": { "type": "standard" } },
			},
		},
		"mappings": {
			"properties": {
				"chunk_text": { "type": "text", "analyzer": "standard" },
				"title": {
					"type": "text",
					"analyzer": "standard",
					"fields": { "keyword": { "type": "keyword", "ignore_above": 512 } },
				},
				"abstract": { "type": "text", "analyzer": "standard" },
				"section_title": {
					"type": "text",
					"analyzer": "standard",
					"fields": { "keyword": { "type": "keyword", "ignore_above": 256 } },
				},
				"external_id": { "type": "keyword" },
				"document_id": { "type": "keyword" },
				"chunk_index": { "type": "integer" },
				"word_count": { "type": "integer" },
				"categories": { "type": "keyword" },
				"published_date": {
					"type": "date",
					"format": "yyyy-MM-dd||yyyy-MM-dd'T'HH:mm:ss||epoch_millis",
				},
				"embedding": {
					"type": "knn_vector",
					"dimension": vector_dim,
					"method": {
						"name": "hnsw",
						"space_type": "cosinesimil",
						"engine": "lucene",
						"parameters": { "ef_construction": 128, "m": 16 },
					},
				},
				"metadata": { "type": "object", "enabled": false },
			},
		},
	})
}

/// Fusion pipeline installed server-side: min-max normalization, then a
/// weighted arithmetic mean of the lexical and vector sub-query scores.
pub fn fusion_pipeline_body() -> Value {
	json!({
		"description": "Hybrid search pipeline fusing lexical and vector scores.",
		"phase_results_processors": [{
			"normalization-processor": {
				"normalization": { "technique": "min_max" },
				"combination": {
					"technique": "arithmetic_mean",
					"parameters": { "weights": [0.4, 0.6] },
				},
			},
		}],
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mapping_carries_the_configured_dimension() {
		let mapping = chunk_index_mapping(768);

		assert_eq!(mapping["mappings"]["properties"]["embedding"]["dimension"], 768);
		assert_eq!(mapping["settings"]["index"]["knn"], true);
	}

	#[test]
	fn pipeline_weights_favor_the_vector_leg() {
		let body = fusion_pipeline_body();
		let weights = &body["phase_results_processors"][0]["normalization-processor"]
			["combination"]["parameters"]["weights"];

		assert_eq!(weights[0], 0.4);
		assert_eq!(weights[1], 0.6);
	}
}
