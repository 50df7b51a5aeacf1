pub mod error;

pub use error::{Error, Result};

use std::collections::HashMap;

use sqlx::{PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

use scry_domain::{Rating, query_hash};
use scry_search::SearchHit;

/// Multiplier floor: heavily down-voted documents keep a tenth of their
/// engine score rather than vanishing.
const MULTIPLIER_FLOOR: f64 = 0.1;
/// Score weight of one net vote.
const VOTE_WEIGHT: f64 = 0.1;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS feedback (
	id         UUID PRIMARY KEY,
	query      TEXT NOT NULL,
	query_hash TEXT NOT NULL,
	chunk_id   TEXT NOT NULL,
	rating     TEXT NOT NULL,
	user_id    TEXT,
	session_id TEXT,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_feedback_query_hash ON feedback (query_hash);
CREATE INDEX IF NOT EXISTS idx_feedback_chunk_id ON feedback (chunk_id)";

/// Per-chunk vote tally for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackStats {
	pub chunk_id: String,
	pub positive_count: i64,
	pub negative_count: i64,
	pub net_score: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateStats {
	pub total_feedback: usize,
	pub positive_count: usize,
	pub negative_count: usize,
	pub top_rated: Vec<FeedbackStats>,
	pub worst_rated: Vec<FeedbackStats>,
}

pub struct FeedbackStore {
	pub pool: PgPool,
}

impl FeedbackStore {
	pub async fn connect(cfg: &scry_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		for statement in SCHEMA.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	/// Record one vote on a chunk for a query. Returns the row id.
	pub async fn collect(
		&self,
		query: &str,
		chunk_id: &str,
		rating: Rating,
		user_id: Option<&str>,
		session_id: Option<&str>,
	) -> Result<Uuid> {
		let id = Uuid::new_v4();

		sqlx::query(
			"\
INSERT INTO feedback (id, query, query_hash, chunk_id, rating, user_id, session_id)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
		)
		.bind(id)
		.bind(query)
		.bind(query_hash(query))
		.bind(chunk_id)
		.bind(rating.as_str())
		.bind(user_id)
		.bind(session_id)
		.execute(&self.pool)
		.await?;

		tracing::info!(rating = rating.as_str(), chunk_id, "Collected feedback.");

		Ok(id)
	}

	/// Per-chunk tallies for every vote recorded under this query's hash.
	pub async fn load_stats(&self, query: &str) -> Result<Vec<FeedbackStats>> {
		let rows: Vec<(String, String)> =
			sqlx::query_as("SELECT chunk_id, rating FROM feedback WHERE query_hash = $1")
				.bind(query_hash(query))
				.fetch_all(&self.pool)
				.await?;

		Ok(tally(rows))
	}

	/// Re-weight hit scores by the query's vote history and re-sort. Hits
	/// without feedback pass through untouched.
	pub async fn adjust_scores(&self, query: &str, hits: &mut Vec<SearchHit>) -> Result<()> {
		let stats = self.load_stats(query).await?;

		if stats.is_empty() {
			return Ok(());
		}

		apply_adjustments(hits, &stats);
		tracing::debug!(documents = stats.len(), "Applied feedback adjustments.");

		Ok(())
	}

	/// Corpus-wide tallies with the ten best and worst rated chunks.
	pub async fn aggregate_stats(&self) -> Result<AggregateStats> {
		let rows: Vec<(String, String)> =
			sqlx::query_as("SELECT chunk_id, rating FROM feedback")
				.fetch_all(&self.pool)
				.await?;

		Ok(summarize(rows))
	}
}

/// Multiply each hit's score by `max(0.1, 1 + net * 0.1)` where feedback
/// exists, then re-sort descending.
pub fn apply_adjustments(hits: &mut [SearchHit], stats: &[FeedbackStats]) {
	let by_chunk: HashMap<&str, i64> =
		stats.iter().map(|s| (s.chunk_id.as_str(), s.net_score)).collect();

	for hit in hits.iter_mut() {
		let Some(net) = by_chunk.get(hit.chunk_id.as_str()) else {
			continue;
		};
		let multiplier = (1.0 + *net as f64 * VOTE_WEIGHT).max(MULTIPLIER_FLOOR);

		hit.score *= multiplier;
	}

	hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

fn tally(rows: Vec<(String, String)>) -> Vec<FeedbackStats> {
	let mut stats: HashMap<String, FeedbackStats> = HashMap::new();

	for (chunk_id, rating) in rows {
		let entry = stats.entry(chunk_id.clone()).or_insert_with(|| FeedbackStats {
			chunk_id,
			..FeedbackStats::default()
		});

		match Rating::parse(&rating) {
			Some(Rating::Positive) => entry.positive_count += 1,
			Some(Rating::Negative) => entry.negative_count += 1,
			None => continue,
		}

		entry.net_score = entry.positive_count - entry.negative_count;
	}

	stats.into_values().collect()
}

fn summarize(rows: Vec<(String, String)>) -> AggregateStats {
	let total_feedback = rows.len();
	let positive_count =
		rows.iter().filter(|(_, rating)| Rating::parse(rating) == Some(Rating::Positive)).count();
	let mut all = tally(rows);

	all.sort_by(|a, b| b.net_score.cmp(&a.net_score));

	let top_rated = all.iter().take(10).cloned().collect();
	let worst_rated = all.iter().rev().take(10).cloned().collect();

	AggregateStats {
		total_feedback,
		positive_count,
		negative_count: total_feedback - positive_count,
		top_rated,
		worst_rated,
	}
}
