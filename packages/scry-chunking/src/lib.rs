mod filter;

use scry_domain::{Document, Section};

/// Word budget above which a section gets split by the sliding window.
const MAX_SECTION_WORDS: usize = 800;
/// Word budget below which adjacent sections are buffered and combined.
const MIN_SECTION_WORDS: usize = 100;
/// Combined small sections below this total are appended to the previous
/// chunk instead of becoming their own chunk.
const MERGE_INTO_PREVIOUS_WORDS: usize = 200;

#[derive(Clone, Debug)]
pub struct ChunkerConfig {
	/// Window size in words.
	pub chunk_size: usize,
	/// Words shared between adjacent windows.
	pub overlap_size: usize,
	/// Documents shorter than this become a single chunk.
	pub min_chunk_size: usize,
	/// Try section-based chunking before the word window.
	pub use_sections: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Overlap size ({overlap_size}) must be less than chunk size ({chunk_size}).")]
	OverlapTooLarge { overlap_size: usize, chunk_size: usize },
}

/// An overlapping slice of a document, the unit of indexing and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
	pub text: String,
	/// Sequential within a document, starting at zero.
	pub index: i32,
	/// Character offsets into the whitespace-stitched text.
	pub start_offset: usize,
	pub end_offset: usize,
	pub word_count: usize,
	pub overlap_with_previous: usize,
	pub overlap_with_next: usize,
	pub section_title: Option<String>,
	pub document_id: String,
	pub external_id: String,
}

pub struct Chunker {
	cfg: ChunkerConfig,
}

impl Chunker {
	pub fn new(cfg: ChunkerConfig) -> Result<Self, Error> {
		if cfg.overlap_size >= cfg.chunk_size {
			return Err(Error::OverlapTooLarge {
				overlap_size: cfg.overlap_size,
				chunk_size: cfg.chunk_size,
			});
		}

		Ok(Self { cfg })
	}

	/// Chunk a whole paper, preferring section-based chunking when a section
	/// map is present and usable, otherwise falling back to word windows over
	/// the full text.
	pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
		if self.cfg.use_sections
			&& let Some(sections) = doc.sections.as_ref()
		{
			let normalized = sections.normalize();
			let chunks = self.chunk_by_sections(
				&doc.title,
				&doc.abstract_text,
				&normalized,
				&doc.external_id,
				&doc.document_id,
			);

			if !chunks.is_empty() {
				tracing::debug!(
					external_id = %doc.external_id,
					count = chunks.len(),
					"Created section-based chunks."
				);

				return chunks;
			}
		}

		tracing::debug!(external_id = %doc.external_id, "Using word-based chunking.");

		self.chunk_text(&doc.full_text, &doc.external_id, &doc.document_id)
	}

	/// Slide a fixed word window with overlap over the text.
	pub fn chunk_text(&self, text: &str, external_id: &str, document_id: &str) -> Vec<Chunk> {
		let words: Vec<&str> = text.split_whitespace().collect();

		if words.is_empty() {
			tracing::warn!(external_id = %external_id, "Empty text provided; no chunks created.");

			return Vec::new();
		}

		if words.len() < self.cfg.min_chunk_size {
			let joined = words.join(" ");
			let end_offset = joined.len();

			return vec![Chunk {
				text: joined,
				index: 0,
				start_offset: 0,
				end_offset,
				word_count: words.len(),
				overlap_with_previous: 0,
				overlap_with_next: 0,
				section_title: None,
				document_id: document_id.to_string(),
				external_id: external_id.to_string(),
			}];
		}

		// stitched[k] is the length of the first k words joined by single spaces.
		let mut stitched = Vec::with_capacity(words.len() + 1);
		stitched.push(0_usize);
		for (i, word) in words.iter().enumerate() {
			let separator = usize::from(i > 0);
			stitched.push(stitched[i] + separator + word.len());
		}

		let step = self.cfg.chunk_size - self.cfg.overlap_size;
		let mut chunks = Vec::new();
		let mut position = 0_usize;
		let mut index = 0_i32;

		loop {
			let end = (position + self.cfg.chunk_size).min(words.len());
			let start_offset = if position > 0 { stitched[position] + 1 } else { 0 };
			let overlap_with_previous = self.cfg.overlap_size.min(position);
			let overlap_with_next = if end < words.len() { self.cfg.overlap_size } else { 0 };

			chunks.push(Chunk {
				text: words[position..end].join(" "),
				index,
				start_offset,
				end_offset: stitched[end],
				word_count: end - position,
				overlap_with_previous,
				overlap_with_next,
				section_title: None,
				document_id: document_id.to_string(),
				external_id: external_id.to_string(),
			});

			if end >= words.len() {
				break;
			}

			position += step;
			index += 1;
		}

		tracing::debug!(
			external_id = %external_id,
			words = words.len(),
			chunks = chunks.len(),
			"Chunked text."
		);

		chunks
	}

	fn chunk_by_sections(
		&self,
		title: &str,
		abstract_text: &str,
		sections: &[Section],
		external_id: &str,
		document_id: &str,
	) -> Vec<Chunk> {
		let kept = filter::filter_sections(sections, abstract_text);

		if kept.is_empty() {
			tracing::warn!(
				external_id = %external_id,
				"No meaningful sections after filtering."
			);

			return Vec::new();
		}

		let header = format!("{title}\n\nAbstract: {abstract_text}\n\n");
		let header_words = header.split_whitespace().count();
		let mut chunks: Vec<Chunk> = Vec::new();
		let mut small: Vec<(&Section, usize)> = Vec::new();

		for (i, &section) in kept.iter().enumerate() {
			let word_count = section.content.split_whitespace().count();

			if word_count < MIN_SECTION_WORDS {
				small.push((section, word_count));

				let next_is_large = kept
					.get(i + 1)
					.map(|next| next.content.split_whitespace().count() >= MIN_SECTION_WORDS)
					.unwrap_or(true);

				if next_is_large {
					self.flush_small_sections(
						&header,
						header_words,
						&mut small,
						&mut chunks,
						external_id,
						document_id,
					);
				}
			} else if word_count <= MAX_SECTION_WORDS {
				let text = format!("{header}Section: {}\n\n{}", section.title, section.content);
				let index = chunks.len() as i32;

				chunks.push(section_chunk(text, &section.title, index, external_id, document_id));
			} else {
				self.split_large_section(section, &header, &mut chunks, external_id, document_id);
			}
		}

		chunks
	}

	/// Drain the buffered small sections into either an appended tail on the
	/// previous chunk or one combined chunk. This is the only place an already
	/// emitted chunk is mutated, and it happens before the list is returned.
	fn flush_small_sections(
		&self,
		header: &str,
		header_words: usize,
		small: &mut Vec<(&Section, usize)>,
		chunks: &mut Vec<Chunk>,
		external_id: &str,
		document_id: &str,
	) {
		if small.is_empty() {
			return;
		}

		let bodies: Vec<String> = small
			.iter()
			.map(|(section, _)| format!("Section: {}\n\n{}", section.title, section.content))
			.collect();
		let total_words: usize = small.iter().map(|(_, word_count)| word_count).sum();

		if merges_into_previous(total_words, header_words, !chunks.is_empty())
			&& let Some(previous) = chunks.last_mut()
		{
			previous.text.push_str("\n\n");
			previous.text.push_str(&bodies.join("\n\n"));
			previous.word_count = previous.text.split_whitespace().count();
			previous.section_title = Some(format!(
				"{} + Combined",
				previous.section_title.as_deref().unwrap_or_default()
			));
			small.clear();

			return;
		}

		let mut combined_title = small
			.iter()
			.take(3)
			.map(|(section, _)| section.title.as_str())
			.collect::<Vec<_>>()
			.join(" + ");
		if small.len() > 3 {
			combined_title.push_str(&format!(" + {} more", small.len() - 3));
		}

		let text = format!("{header}{}", bodies.join("\n\n"));
		let index = chunks.len() as i32;

		chunks.push(section_chunk(text, &combined_title, index, external_id, document_id));
		small.clear();
	}

	/// Oversized sections reuse the word window on the section body alone,
	/// then carry the header and a `(Part N)` label on every piece.
	fn split_large_section(
		&self,
		section: &Section,
		header: &str,
		chunks: &mut Vec<Chunk>,
		external_id: &str,
		document_id: &str,
	) {
		let body = format!("Section: {}\n\n{}", section.title, section.content);
		let header_words = header.split_whitespace().count();
		let base_index = chunks.len() as i32;

		for (part, piece) in self.chunk_text(&body, external_id, document_id).into_iter().enumerate()
		{
			chunks.push(Chunk {
				text: format!("{header}{}", piece.text),
				index: base_index + part as i32,
				start_offset: piece.start_offset,
				end_offset: piece.end_offset + header.len(),
				word_count: piece.word_count + header_words,
				overlap_with_previous: piece.overlap_with_previous,
				overlap_with_next: piece.overlap_with_next,
				section_title: Some(format!("{} (Part {})", section.title, part + 1)),
				document_id: document_id.to_string(),
				external_id: external_id.to_string(),
			});
		}
	}
}

/// Named merge predicate: a combined buffer small enough that header plus
/// bodies stay under the floor rides along with the chunk before it.
fn merges_into_previous(total_words: usize, header_words: usize, has_previous: bool) -> bool {
	has_previous && total_words + header_words < MERGE_INTO_PREVIOUS_WORDS
}

fn section_chunk(
	text: String,
	section_title: &str,
	index: i32,
	external_id: &str,
	document_id: &str,
) -> Chunk {
	let word_count = text.split_whitespace().count();
	let end_offset = text.len();

	Chunk {
		text,
		index,
		start_offset: 0,
		end_offset,
		word_count,
		overlap_with_previous: 0,
		overlap_with_next: 0,
		section_title: Some(section_title.to_string()),
		document_id: document_id.to_string(),
		external_id: external_id.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use scry_domain::Sections;

	use super::*;

	fn chunker(chunk_size: usize, overlap_size: usize, min_chunk_size: usize) -> Chunker {
		Chunker::new(ChunkerConfig {
			chunk_size,
			overlap_size,
			min_chunk_size,
			use_sections: true,
		})
		.expect("Config must be valid.")
	}

	fn words(n: usize) -> String {
		(0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
	}

	fn doc(full_text: &str, sections: Option<Sections>) -> Document {
		Document {
			title: "A Study of Retrieval".to_string(),
			abstract_text: "We examine hybrid retrieval over paper chunks.".to_string(),
			full_text: full_text.to_string(),
			external_id: "2401.00001".to_string(),
			document_id: "doc-1".to_string(),
			categories: vec!["cs.IR".to_string()],
			published_date: None,
			sections,
		}
	}

	#[test]
	fn rejects_overlap_at_or_above_chunk_size() {
		for (chunk_size, overlap_size) in [(200, 200), (200, 300), (1, 1)] {
			let result = Chunker::new(ChunkerConfig {
				chunk_size,
				overlap_size,
				min_chunk_size: 20,
				use_sections: false,
			});

			assert!(matches!(result, Err(Error::OverlapTooLarge { .. })));
		}
	}

	#[test]
	fn windows_a_400_word_document_into_three_chunks() {
		let chunker = chunker(200, 50, 20);
		let chunks = chunker.chunk_text(&words(400), "2401.00001", "doc-1");

		assert_eq!(chunks.len(), 3);
		assert_eq!(chunks[0].word_count, 200);
		assert_eq!(chunks[1].word_count, 200);
		assert_eq!(chunks[2].word_count, 100);
		assert_eq!(chunks[0].overlap_with_previous, 0);
		assert_eq!(chunks[0].overlap_with_next, 50);
		assert_eq!(chunks[1].overlap_with_previous, 50);
		assert_eq!(chunks[1].overlap_with_next, 50);
		assert_eq!(chunks[2].overlap_with_previous, 50);
		assert_eq!(chunks[2].overlap_with_next, 0);
		assert!(chunks[1].text.starts_with("w150"));
		assert!(chunks[2].text.starts_with("w300"));
		assert!(chunks[2].text.ends_with("w399"));
	}

	#[test]
	fn indexes_are_contiguous_and_offsets_consistent() {
		let chunker = chunker(100, 25, 20);
		let text = words(1_000);
		let chunks = chunker.chunk_text(&text, "2401.00001", "doc-1");

		for (i, chunk) in chunks.iter().enumerate() {
			assert_eq!(chunk.index, i as i32);
			assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.text);

			let expected_next = if i + 1 == chunks.len() { 0 } else { 25 };

			assert_eq!(chunk.overlap_with_next, expected_next);
		}
	}

	#[test]
	fn short_document_becomes_a_single_chunk() {
		let chunker = chunker(200, 50, 20);
		let chunks = chunker.chunk_text(&words(15), "2401.00001", "doc-1");

		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].index, 0);
		assert_eq!(chunks[0].word_count, 15);
	}

	#[test]
	fn empty_document_produces_no_chunks() {
		let chunker = chunker(200, 50, 20);

		assert!(chunker.chunk_text("", "2401.00001", "doc-1").is_empty());
		assert!(chunker.chunk_text(" \n\t ", "2401.00001", "doc-1").is_empty());
	}

	#[test]
	fn authors_section_never_reaches_output() {
		let chunker = chunker(200, 50, 20);
		let sections = Sections::List(vec![
			serde_json::json!({ "title": "Authors", "content": "Alice Example, Bob Sample, affiliations redacted for anonymity during peer review of this manuscript." }),
			serde_json::json!({ "title": "Introduction", "content": words(150) }),
		]);
		let chunks = chunker.chunk_document(&doc(&words(150), Some(sections)));

		assert!(!chunks.is_empty());
		for chunk in &chunks {
			assert!(!chunk.text.contains("Alice Example"));
		}
	}

	#[test]
	fn all_metadata_sections_fall_back_to_word_chunking() {
		let chunker = chunker(200, 50, 20);
		let sections = Sections::List(vec![
			serde_json::json!({ "title": "Authors", "content": "a@b.edu university" }),
			serde_json::json!({ "title": "Email", "content": "c@d.edu department" }),
			serde_json::json!({ "title": "Arxiv", "content": "arxiv:2401.00001 preprint" }),
		]);
		let chunks = chunker.chunk_document(&doc(&words(250), Some(sections)));

		// Word-window chunks carry no section labels.
		assert!(!chunks.is_empty());
		assert!(chunks.iter().all(|chunk| chunk.section_title.is_none()));
	}

	#[test]
	fn mid_sized_section_emits_one_labeled_chunk() {
		let chunker = chunker(200, 50, 20);
		let sections = Sections::List(vec![
			serde_json::json!({ "title": "Methodology", "content": words(300) }),
		]);
		let chunks = chunker.chunk_document(&doc(&words(300), Some(sections)));

		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].section_title.as_deref(), Some("Methodology"));
		assert!(chunks[0].text.starts_with("A Study of Retrieval\n\nAbstract:"));
		assert!(chunks[0].text.contains("Section: Methodology"));
	}

	#[test]
	fn oversized_section_splits_into_labeled_parts() {
		let chunker = chunker(200, 50, 20);
		let sections = Sections::List(vec![
			serde_json::json!({ "title": "Experiments", "content": words(900) }),
		]);
		let chunks = chunker.chunk_document(&doc(&words(900), Some(sections)));

		assert!(chunks.len() > 1);
		for (i, chunk) in chunks.iter().enumerate() {
			assert_eq!(chunk.index, i as i32);
			assert_eq!(
				chunk.section_title.as_deref(),
				Some(format!("Experiments (Part {})", i + 1).as_str())
			);
			assert!(chunk.text.starts_with("A Study of Retrieval"));
		}
	}

	#[test]
	fn trailing_small_sections_merge_into_previous_chunk() {
		let chunker = chunker(200, 50, 20);
		let sections = Sections::List(vec![
			serde_json::json!({ "title": "Methodology", "content": words(300) }),
			serde_json::json!({ "title": "Acknowledgements Note", "content": "We thank the reviewers for their careful reading and many helpful suggestions on earlier drafts." }),
		]);
		let chunks = chunker.chunk_document(&doc(&words(300), Some(sections)));

		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].section_title.as_deref(), Some("Methodology + Combined"));
		assert!(chunks[0].text.contains("Section: Acknowledgements Note"));
	}

	#[test]
	fn small_sections_combine_into_one_chunk_without_previous() {
		let chunker = chunker(200, 50, 20);
		// Each section is under 100 words and there is no previous chunk to
		// merge into, so the buffer becomes one combined chunk.
		let sections = Sections::List(vec![
			serde_json::json!({ "title": "Background Notes", "content": words(90) }),
			serde_json::json!({ "title": "Related Efforts", "content": words(90) }),
		]);
		let chunks = chunker.chunk_document(&doc(&words(180), Some(sections)));

		assert_eq!(chunks.len(), 1);
		assert_eq!(
			chunks[0].section_title.as_deref(),
			Some("Background Notes + Related Efforts")
		);
	}
}
