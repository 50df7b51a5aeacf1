use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One titled span of a paper's body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
	pub title: String,
	pub content: String,
}

/// Section input as upstream extractors actually deliver it: an ordered list,
/// a title-to-content map, or a JSON string serializing either. Each shape is
/// an explicit variant; `normalize` is the only way consumers should read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sections {
	List(Vec<Value>),
	Map(serde_json::Map<String, Value>),
	Serialized(String),
}

impl Sections {
	/// Flatten any input shape into an ordered `{title, content}` list.
	/// Unparseable input yields an empty list rather than an error; the
	/// chunker treats that as "no sections" and falls back to word windows.
	pub fn normalize(&self) -> Vec<Section> {
		match self {
			Self::List(entries) => normalize_list(entries),
			Self::Map(map) => normalize_map(map),
			Self::Serialized(raw) => match serde_json::from_str::<Value>(raw) {
				Ok(Value::Array(entries)) => normalize_list(&entries),
				Ok(Value::Object(map)) => normalize_map(&map),
				_ => Vec::new(),
			},
		}
	}
}

fn normalize_list(entries: &[Value]) -> Vec<Section> {
	let mut out = Vec::with_capacity(entries.len());

	for (i, entry) in entries.iter().enumerate() {
		match entry {
			Value::Object(fields) => {
				let title = string_field(fields, &["title", "heading"])
					.unwrap_or_else(|| format!("Section {}", i + 1));
				let content = string_field(fields, &["content", "text"]).unwrap_or_default();

				out.push(Section { title, content });
			},
			Value::String(text) => {
				out.push(Section { title: format!("Section {}", i + 1), content: text.clone() });
			},
			other => {
				out.push(Section {
					title: format!("Section {}", i + 1),
					content: other.to_string(),
				});
			},
		}
	}

	out
}

fn normalize_map(map: &serde_json::Map<String, Value>) -> Vec<Section> {
	map.iter()
		.map(|(title, content)| Section {
			title: title.clone(),
			content: match content {
				Value::String(text) => text.clone(),
				other => other.to_string(),
			},
		})
		.collect()
}

fn string_field(fields: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|key| fields.get(*key).and_then(Value::as_str).map(str::to_string))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_object_list() {
		let sections = Sections::List(vec![
			serde_json::json!({ "title": "Introduction", "content": "We study retrieval." }),
			serde_json::json!({ "heading": "Methods", "text": "We use fusion." }),
		]);
		let normalized = sections.normalize();

		assert_eq!(normalized.len(), 2);
		assert_eq!(normalized[0].title, "Introduction");
		assert_eq!(normalized[1].title, "Methods");
		assert_eq!(normalized[1].content, "We use fusion.");
	}

	#[test]
	fn titles_untitled_entries_by_position() {
		let sections = Sections::List(vec![serde_json::json!("Bare text body.")]);
		let normalized = sections.normalize();

		assert_eq!(normalized[0].title, "Section 1");
		assert_eq!(normalized[0].content, "Bare text body.");
	}

	#[test]
	fn parses_serialized_map() {
		let sections =
			Sections::Serialized(r#"{"Introduction": "Intro body.", "Results": "Numbers."}"#.to_string());
		let normalized = sections.normalize();

		assert_eq!(normalized.len(), 2);
	}

	#[test]
	fn garbage_string_normalizes_to_empty() {
		let sections = Sections::Serialized("not json at all {".to_string());

		assert!(sections.normalize().is_empty());
	}
}
