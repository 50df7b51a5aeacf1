pub mod query;
pub mod sections;

pub use query::{normalize_query, query_hash};
pub use sections::{Section, Sections};

use serde::{Deserialize, Serialize};

/// A paper handed to the ingestion pipeline. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
	pub title: String,
	pub abstract_text: String,
	pub full_text: String,
	/// Public identifier, e.g. an arXiv id. Index deletions key on this.
	pub external_id: String,
	/// Internal row identifier.
	pub document_id: String,
	#[serde(default)]
	pub categories: Vec<String>,
	#[serde(default)]
	pub published_date: Option<String>,
	#[serde(default)]
	pub sections: Option<Sections>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
	Positive,
	Negative,
}

impl Rating {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Positive => "positive",
			Self::Negative => "negative",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"positive" => Some(Self::Positive),
			"negative" => Some(Self::Negative),
			_ => None,
		}
	}
}
