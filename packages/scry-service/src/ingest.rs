use scry_chunking::Chunk;
use scry_domain::Document;
use scry_search::ChunkRecord;

use crate::{Service, ServiceResult};

/// Per-document ingestion counts. Stage failures inside the pipeline land in
/// `errors` instead of aborting the call; the caller decides what a partial
/// ingest is worth.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
	pub external_id: String,
	pub chunks_created: usize,
	pub chunks_indexed: usize,
	pub chunks_failed: usize,
	pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SetupReport {
	pub index_created: bool,
	pub pipeline_created: bool,
}

impl Service {
	/// Create the chunk index and fusion pipeline, plus the feedback schema.
	pub async fn setup(&self, force: bool) -> ServiceResult<SetupReport> {
		let index_created = self.index.ensure_index(force).await?;
		let pipeline_created = self.index.ensure_pipeline(force).await?;

		self.feedback.ensure_schema().await?;

		Ok(SetupReport { index_created, pipeline_created })
	}

	/// Chunk a paper, embed every chunk in one batch, and bulk-index the lot.
	pub async fn ingest_document(&self, doc: &Document) -> ServiceResult<IngestReport> {
		let chunks = self.chunker()?.chunk_document(doc);

		if chunks.is_empty() {
			tracing::warn!(external_id = %doc.external_id, "Document produced no chunks.");

			return Ok(IngestReport { external_id: doc.external_id.clone(), ..Default::default() });
		}

		let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
		let embeddings = match self.embed_checked(&texts).await {
			Ok(embeddings) => embeddings,
			Err(err) => {
				tracing::warn!(external_id = %doc.external_id, error = %err, "Embedding failed; nothing indexed.");

				return Ok(failed_report(doc, chunks.len(), &err));
			},
		};
		let records = chunk_records(doc, &chunks, embeddings);
		let report = match self.index.bulk_index(&records).await {
			Ok(report) => report,
			Err(err) => {
				tracing::warn!(external_id = %doc.external_id, error = %err, "Bulk index failed; nothing indexed.");

				return Ok(failed_report(doc, chunks.len(), &err));
			},
		};

		tracing::info!(
			external_id = %doc.external_id,
			created = chunks.len(),
			indexed = report.success,
			"Ingested document."
		);

		Ok(IngestReport {
			external_id: doc.external_id.clone(),
			chunks_created: chunks.len(),
			chunks_indexed: report.success,
			chunks_failed: report.failed,
			errors: Vec::new(),
		})
	}

	/// Drop a document's chunks and ingest it again from scratch.
	pub async fn reindex_document(&self, doc: &Document) -> ServiceResult<IngestReport> {
		let deleted = self.index.delete_document(&doc.external_id).await?;

		tracing::info!(external_id = %doc.external_id, deleted, "Cleared old chunks for reindex.");

		self.ingest_document(doc).await
	}

	pub async fn delete_document(&self, external_id: &str) -> ServiceResult<u64> {
		Ok(self.index.delete_document(external_id).await?)
	}
}

fn failed_report(doc: &Document, created: usize, err: &impl std::fmt::Display) -> IngestReport {
	IngestReport {
		external_id: doc.external_id.clone(),
		chunks_created: created,
		chunks_indexed: 0,
		chunks_failed: created,
		errors: vec![err.to_string()],
	}
}

fn chunk_records(doc: &Document, chunks: &[Chunk], embeddings: Vec<Vec<f32>>) -> Vec<ChunkRecord> {
	chunks
		.iter()
		.zip(embeddings)
		.map(|(chunk, embedding)| ChunkRecord {
			chunk_text: chunk.text.clone(),
			title: doc.title.clone(),
			abstract_text: doc.abstract_text.clone(),
			external_id: doc.external_id.clone(),
			document_id: doc.document_id.clone(),
			chunk_index: chunk.index,
			section_title: chunk.section_title.clone(),
			categories: doc.categories.clone(),
			published_date: doc.published_date.clone(),
			word_count: chunk.word_count,
			embedding,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn records_pair_chunks_with_embeddings_in_order() {
		let doc = Document {
			title: "A Study".to_string(),
			abstract_text: "Abstract.".to_string(),
			full_text: String::new(),
			external_id: "2401.00001".to_string(),
			document_id: "doc-1".to_string(),
			categories: vec!["cs.IR".to_string()],
			published_date: Some("2024-01-01".to_string()),
			sections: None,
		};
		let chunks = vec![
			Chunk {
				text: "first".to_string(),
				index: 0,
				start_offset: 0,
				end_offset: 5,
				word_count: 1,
				overlap_with_previous: 0,
				overlap_with_next: 0,
				section_title: Some("Intro".to_string()),
				document_id: "doc-1".to_string(),
				external_id: "2401.00001".to_string(),
			},
			Chunk {
				text: "second".to_string(),
				index: 1,
				start_offset: 6,
				end_offset: 12,
				word_count: 1,
				overlap_with_previous: 0,
				overlap_with_next: 0,
				section_title: None,
				document_id: "doc-1".to_string(),
				external_id: "2401.00001".to_string(),
			},
		];
		let records = chunk_records(&doc, &chunks, vec![vec![0.1], vec![0.2]]);

		assert_eq!(records.len(), 2);
		assert_eq!(records[0].chunk_index, 0);
		assert_eq!(records[0].section_title.as_deref(), Some("Intro"));
		assert_eq!(records[1].embedding, vec![0.2]);
		assert_eq!(records[1].published_date.as_deref(), Some("2024-01-01"));
	}
}
