use std::{fs, path::PathBuf};

use clap::{
	Parser, Subcommand,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use scry_config::Config;
use scry_domain::{Document, Rating};
use scry_feedback::FeedbackStore;
use scry_search::SearchIndex;
use scry_service::{RetrievalOutcome, RetrievalRequest, SearchRequest, Service};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(version = VERSION, rename_all = "kebab", styles = styles())]
pub struct Args {
	#[arg(long, short, value_name = "FILE", default_value = "scry.toml")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Create the chunk index, fusion pipeline, and feedback schema.
	Setup {
		/// Drop and recreate existing index and pipeline.
		#[arg(long)]
		force: bool,
	},
	/// Chunk, embed, and index papers from a JSON file.
	Ingest {
		/// A JSON array of documents, or a single document object.
		#[arg(value_name = "FILE")]
		file: PathBuf,
		/// Delete existing chunks for each paper before indexing.
		#[arg(long)]
		reindex: bool,
	},
	/// Search the chunk index.
	Search {
		query: String,
		#[arg(long, default_value_t = 10)]
		size: u32,
		#[arg(long, value_name = "CATEGORY")]
		categories: Vec<String>,
		/// Skip the vector leg and search lexically only.
		#[arg(long)]
		lexical: bool,
	},
	/// Ask a question through the self-correcting retrieval loop.
	Ask {
		query: String,
		#[arg(long, default_value_t = 10)]
		size: u32,
		#[arg(long, value_name = "CATEGORY")]
		categories: Vec<String>,
	},
	/// Record a vote on a search result for a query.
	Feedback {
		query: String,
		chunk_id: String,
		/// "positive" or "negative".
		rating: String,
		#[arg(long)]
		user: Option<String>,
		#[arg(long)]
		session: Option<String>,
	},
	/// Corpus-wide feedback statistics.
	Stats,
	/// Engine health and chunk index statistics.
	Status,
	/// Delete a paper's chunks from the index.
	Delete { external_id: String },
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = scry_config::load(&args.config)?;

	init_tracing(&cfg.service.log_level);

	let service = build_service(cfg).await?;

	match args.command {
		Command::Setup { force } => {
			let report = service.setup(force).await?;

			println!("index created: {}", report.index_created);
			println!("pipeline created: {}", report.pipeline_created);
		},
		Command::Ingest { file, reindex } => {
			for doc in read_documents(&file)? {
				let report = if reindex {
					service.reindex_document(&doc).await?
				} else {
					service.ingest_document(&doc).await?
				};

				println!(
					"{}: {} chunks, {} indexed, {} failed",
					report.external_id,
					report.chunks_created,
					report.chunks_indexed,
					report.chunks_failed
				);

				for error in &report.errors {
					println!("  error: {error}");
				}
			}
		},
		Command::Search { query, size, categories, lexical } => {
			let req = SearchRequest {
				categories,
				use_hybrid: !lexical,
				..SearchRequest::new(&query, size)
			};
			let results = service.search_chunks(&req).await?;

			println!("{} hits", results.total);
			for (i, hit) in results.hits.iter().enumerate() {
				println!(
					"{:>2}. [{:.3}] {} ({}) chunk {}",
					i + 1,
					hit.score,
					hit.title,
					hit.external_id,
					hit.chunk_index
				);
			}
		},
		Command::Ask { query, size, categories } => {
			let req = RetrievalRequest { categories, size, ..RetrievalRequest::new(&query) };
			let outcome = service.answer(&req).await?;

			print_outcome(outcome);
		},
		Command::Feedback { query, chunk_id, rating, user, session } => {
			let rating = Rating::parse(&rating)
				.ok_or_else(|| eyre::eyre!("Rating must be \"positive\" or \"negative\"."))?;
			let id = service
				.feedback
				.collect(&query, &chunk_id, rating, user.as_deref(), session.as_deref())
				.await?;

			println!("recorded {id}");
		},
		Command::Stats => {
			let stats = service.feedback.aggregate_stats().await?;

			println!(
				"{} votes ({} positive, {} negative)",
				stats.total_feedback, stats.positive_count, stats.negative_count
			);
			for entry in &stats.top_rated {
				println!("  +{:<4} {}", entry.net_score, entry.chunk_id);
			}
			for entry in &stats.worst_rated {
				println!("  {:<5} {}", entry.net_score, entry.chunk_id);
			}
		},
		Command::Status => {
			let healthy = service.index.health().await;
			let stats = service.index.stats().await?;

			println!("engine healthy: {healthy}");
			println!("index {} exists: {}", stats.index, stats.exists);
			println!("documents: {}", stats.document_count);
			if let Some(bytes) = stats.size_in_bytes {
				println!("size: {bytes} bytes");
			}
		},
		Command::Delete { external_id } => {
			let deleted = service.delete_document(&external_id).await?;

			println!("deleted {deleted} chunks");
		},
	}

	Ok(())
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Red.on_default() | Effects::BOLD)
		.usage(AnsiColor::Red.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

fn init_tracing(level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_service(cfg: Config) -> color_eyre::Result<Service> {
	let index = SearchIndex::new(&cfg.search.engine)?;
	let feedback = FeedbackStore::connect(&cfg.storage.postgres).await?;

	Ok(Service::new(cfg, index, feedback))
}

fn read_documents(path: &std::path::Path) -> color_eyre::Result<Vec<Document>> {
	let raw = fs::read_to_string(path)?;
	let parsed: serde_json::Value = serde_json::from_str(&raw)?;

	if parsed.is_array() {
		Ok(serde_json::from_value(parsed)?)
	} else {
		Ok(vec![serde_json::from_value(parsed)?])
	}
}

fn print_outcome(outcome: RetrievalOutcome) {
	match outcome {
		RetrievalOutcome::AnswerDirect { answer, reasoning } => {
			println!("{answer}");
			println!("\n(no retrieval: {reasoning})");
		},
		RetrievalOutcome::OutOfScope { verdict } => {
			println!("Query is out of scope (score {}): {}", verdict.score, verdict.reason);
		},
		RetrievalOutcome::Accepted { answer, attempts, caveat, support, utility, sources } => {
			println!("{answer}");
			if caveat {
				println!("\nNote: answer accepted below the utility threshold.");
			}
			println!(
				"\n({} attempt(s), support {}, utility {}/10)",
				attempts,
				support.level.as_str(),
				utility.score
			);
			for (i, hit) in sources.iter().enumerate() {
				println!("  [{}] {} ({})", i + 1, hit.title, hit.external_id);
			}
		},
		RetrievalOutcome::GaveUp { attempts, reason } => {
			println!("No answer after {attempts} attempt(s): {reason}.");
		},
	}
}
