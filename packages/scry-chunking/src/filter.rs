//! Drops sections that carry paper metadata instead of content: author
//! blocks, contact lines, and restated abstracts.

use std::sync::LazyLock;

use regex::Regex;

use scry_domain::Section;

static EMAIL_DOMAIN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("Pattern must compile."));

const METADATA_TITLES: &[&str] = &[
	"authors",
	"author",
	"affiliations",
	"affiliation",
	"email",
	"emails",
	"contact",
	"header",
	"metadata",
	"arxiv",
	"preprint",
	"submitted",
	"received",
	"accepted",
	"doi",
	"keywords",
	"acknowledgments",
	"acknowledgements",
	"references",
	"bibliography",
];

const METADATA_INDICATORS: &[&str] =
	&["@", "arxiv:", "university", "institute", "department", "college", "preprint"];

pub(crate) fn filter_sections<'a>(sections: &'a [Section], abstract_text: &str) -> Vec<&'a Section> {
	let abstract_lower = abstract_text.to_lowercase();
	let abstract_words: Vec<&str> = abstract_lower.split_whitespace().collect();

	sections
		.iter()
		.filter(|section| {
			!is_metadata_title(&section.title)
				&& !is_metadata_content(&section.content)
				&& !duplicates_abstract(&section.content, &abstract_lower, &abstract_words)
		})
		.collect()
}

fn is_metadata_title(title: &str) -> bool {
	let normalized = title.trim().to_lowercase();

	if normalized.len() < 5 {
		return true;
	}
	if METADATA_TITLES.contains(&normalized.as_str()) {
		return true;
	}

	// Short titles that merely contain an indicator ("Author List",
	// "Contact Info") are still metadata; long titles get the benefit
	// of the doubt.
	normalized.len() < 20 && METADATA_TITLES.iter().any(|word| normalized.contains(word))
}

/// Short blocks dense with contact or publication markers are metadata even
/// under an innocuous title.
fn is_metadata_content(content: &str) -> bool {
	let lower = content.to_lowercase();

	if lower.split_whitespace().count() >= 20 {
		return false;
	}

	let mut hits = METADATA_INDICATORS.iter().filter(|marker| lower.contains(*marker)).count();

	if EMAIL_DOMAIN.is_match(&lower) {
		hits += 1;
	}

	hits >= 2
}

/// Extractors often emit the abstract again as the first body section. Catch
/// both verbatim containment and near-duplicates by word overlap.
fn duplicates_abstract(content: &str, abstract_lower: &str, abstract_words: &[&str]) -> bool {
	if abstract_words.len() <= 10 {
		return false;
	}

	let lower = content.to_lowercase();

	if lower.contains(abstract_lower) || abstract_lower.contains(lower.trim()) {
		return true;
	}

	let matched = abstract_words.iter().filter(|word| lower.contains(*word)).count();

	matched as f64 / abstract_words.len() as f64 > 0.8
}

#[cfg(test)]
mod tests {
	use super::*;

	fn section(title: &str, content: &str) -> Section {
		Section { title: title.to_string(), content: content.to_string() }
	}

	#[test]
	fn drops_metadata_titles() {
		assert!(is_metadata_title("Authors"));
		assert!(is_metadata_title("references"));
		assert!(is_metadata_title("Author List"));
		assert!(is_metadata_title("ack"));
		assert!(!is_metadata_title("Introduction"));
		assert!(!is_metadata_title("Methodology and Experimental Setup"));
	}

	#[test]
	fn drops_contact_blocks_but_keeps_short_prose() {
		assert!(is_metadata_content("alice@example.edu, University of Somewhere"));
		assert!(is_metadata_content("arXiv:2401.00001 preprint under review"));
		assert!(!is_metadata_content("We propose a new fusion method for retrieval."));
	}

	#[test]
	fn long_content_is_never_metadata() {
		let long = "university institute department ".repeat(10);

		assert!(!is_metadata_content(&long));
	}

	#[test]
	fn drops_restated_abstract() {
		let abstract_text =
			"we study hybrid retrieval over chunked academic papers and show reciprocal rank fusion improves recall";
		let sections = vec![
			section("Overview", abstract_text),
			section("Introduction", "Retrieval systems face a vocabulary mismatch problem."),
		];
		let abstract_lower = abstract_text.to_lowercase();
		let kept = filter_sections(&sections, &abstract_lower);

		assert_eq!(kept.len(), 1);
		assert_eq!(kept[0].title, "Introduction");
	}

	#[test]
	fn short_abstract_never_triggers_duplicate_check() {
		let sections = vec![section("Overview", "short text")];
		let kept = filter_sections(&sections, "short text");

		assert_eq!(kept.len(), 1);
	}
}
