use serde_json::{Value, json};

/// Knobs for one lexical search request against the chunk index.
#[derive(Debug, Clone)]
pub struct QueryOptions {
	pub query: String,
	pub size: u32,
	pub from: u32,
	/// Override the default boosted field set.
	pub fields: Option<Vec<String>>,
	pub categories: Vec<String>,
	pub track_total_hits: bool,
	/// Sort by publication date instead of relevance.
	pub latest_first: bool,
	/// Chunk-level search; `false` targets paper-level metadata fields.
	pub search_chunks: bool,
}

impl QueryOptions {
	pub fn chunks(query: &str, size: u32) -> Self {
		Self { query: query.to_string(), size, ..Self::default() }
	}
}

impl Default for QueryOptions {
	fn default() -> Self {
		Self {
			query: String::new(),
			size: 10,
			from: 0,
			fields: None,
			categories: Vec::new(),
			track_total_hits: true,
			latest_first: false,
			search_chunks: true,
		}
	}
}

/// Assemble the full request body: bool query with fuzzy multi-match and
/// category filter, a `_source` policy that never returns embeddings, field
/// highlighting, and date sorting when relevance is unavailable or unwanted.
pub fn build_query(opts: &QueryOptions) -> Value {
	let mut body = json!({
		"query": build_bool_query(opts),
		"size": opts.size,
		"from": opts.from,
		"track_total_hits": opts.track_total_hits,
		"_source": build_source(opts),
		"highlight": build_highlight(opts),
	});

	// Empty queries have no relevance signal; fall back to recency.
	if opts.latest_first || opts.query.trim().is_empty() {
		body["sort"] = json!([
			{ "published_date": { "order": "desc" } },
			{ "_score": { "order": "desc" } },
		]);
	}

	body
}

fn build_bool_query(opts: &QueryOptions) -> Value {
	let must = if opts.query.trim().is_empty() {
		json!([{ "match_all": {} }])
	} else {
		json!([{
			"multi_match": {
				"query": opts.query,
				"fields": query_fields(opts),
				"type": "best_fields",
				"operator": "or",
				"fuzziness": "AUTO",
				"prefix_length": 2,
			},
		}])
	};
	let mut bool_query = json!({ "must": must });

	if !opts.categories.is_empty() {
		bool_query["filter"] = json!([{ "terms": { "categories": opts.categories } }]);
	}

	json!({ "bool": bool_query })
}

fn query_fields(opts: &QueryOptions) -> Vec<String> {
	if let Some(fields) = &opts.fields {
		return fields.clone();
	}
	if opts.search_chunks {
		vec!["chunk_text^3".to_string(), "title^2".to_string(), "abstract^1".to_string()]
	} else {
		vec!["title^3".to_string(), "abstract^2".to_string()]
	}
}

fn build_source(opts: &QueryOptions) -> Value {
	if opts.search_chunks {
		json!({ "excludes": ["embedding"] })
	} else {
		json!(["external_id", "title", "abstract", "categories", "published_date"])
	}
}

fn build_highlight(opts: &QueryOptions) -> Value {
	if opts.search_chunks {
		json!({
			"fields": {
				"chunk_text": {
					"fragment_size": 150,
					"number_of_fragments": 2,
					"pre_tags": ["<mark>"],
					"post_tags": ["</mark>"],
				},
				"title": {
					"fragment_size": 0,
					"number_of_fragments": 0,
					"pre_tags": ["<mark>"],
					"post_tags": ["</mark>"],
				},
				"abstract": {
					"fragment_size": 150,
					"number_of_fragments": 1,
					"pre_tags": ["<mark>"],
					"post_tags": ["</mark>"],
				},
			},
			"require_field_match": false,
		})
	} else {
		json!({
			"fields": {
				"title": { "fragment_size": 0, "number_of_fragments": 0 },
				"abstract": {
					"fragment_size": 150,
					"number_of_fragments": 3,
					"pre_tags": ["<mark>"],
					"post_tags": ["</mark>"],
				},
			},
			"require_field_match": false,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chunk_query_uses_boosted_fields_with_fuzziness() {
		let body = build_query(&QueryOptions::chunks("transformer attention", 5));
		let multi_match = &body["query"]["bool"]["must"][0]["multi_match"];

		assert_eq!(multi_match["query"], "transformer attention");
		assert_eq!(multi_match["fields"][0], "chunk_text^3");
		assert_eq!(multi_match["fuzziness"], "AUTO");
		assert_eq!(multi_match["prefix_length"], 2);
		assert_eq!(body["size"], 5);
		assert!(body.get("sort").is_none());
	}

	#[test]
	fn empty_query_matches_all_and_sorts_by_date() {
		let body = build_query(&QueryOptions::chunks("  ", 10));

		assert!(body["query"]["bool"]["must"][0].get("match_all").is_some());
		assert_eq!(body["sort"][0]["published_date"]["order"], "desc");
	}

	#[test]
	fn categories_become_a_terms_filter() {
		let opts = QueryOptions {
			categories: vec!["cs.IR".to_string(), "cs.CL".to_string()],
			..QueryOptions::chunks("retrieval", 10)
		};
		let body = build_query(&opts);

		assert_eq!(body["query"]["bool"]["filter"][0]["terms"]["categories"][1], "cs.CL");
	}

	#[test]
	fn chunk_source_excludes_embedding() {
		let body = build_query(&QueryOptions::chunks("retrieval", 10));

		assert_eq!(body["_source"]["excludes"][0], "embedding");
	}

	#[test]
	fn paper_mode_uses_metadata_fields_and_source_list() {
		let opts =
			QueryOptions { search_chunks: false, ..QueryOptions::chunks("diffusion models", 10) };
		let body = build_query(&opts);

		assert_eq!(body["query"]["bool"]["must"][0]["multi_match"]["fields"][0], "title^3");
		assert_eq!(body["_source"][0], "external_id");
	}

	#[test]
	fn explicit_fields_override_defaults() {
		let opts = QueryOptions {
			fields: Some(vec!["abstract^5".to_string()]),
			..QueryOptions::chunks("fusion", 10)
		};
		let body = build_query(&opts);

		assert_eq!(body["query"]["bool"]["must"][0]["multi_match"]["fields"][0], "abstract^5");
	}
}
