/// Lowercase, trim, and collapse runs of whitespace so equivalent queries
/// aggregate under one feedback key.
pub fn normalize_query(query: &str) -> String {
	let mut out = String::with_capacity(query.len());

	for token in query.split_whitespace() {
		if !out.is_empty() {
			out.push(' ');
		}
		out.push_str(&token.to_lowercase());
	}

	out
}

/// Stable short hash of the normalized query, used as the feedback lookup key.
pub fn query_hash(query: &str) -> String {
	let normalized = normalize_query(query);
	let digest = blake3::hash(normalized.as_bytes());

	digest.to_hex()[..16].to_string()
}
