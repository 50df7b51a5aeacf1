//! Self-correcting retrieval loop: decide whether to retrieve at all, gate
//! off-topic queries, then search, grade, generate, and verify under one
//! bounded attempt budget shared by query rewrites and regenerations.

use serde_json::{Value, json};

use scry_search::SearchHit;

use crate::{
	BoxFuture, Service, ServiceError, ServiceResult,
	evaluate::{
		self, GradeVerdict, RelevanceLabel, RetrievalDecision, ScopeVerdict, SupportLevel,
		SupportVerdict, UtilityVerdict,
	},
	search::SearchRequest,
};

/// Hard cap on the attempt budget, regardless of configuration.
const MAX_ATTEMPT_CAP: u32 = 3;

#[derive(Debug, Clone)]
pub struct RetrievalRequest {
	pub query: String,
	pub size: u32,
	pub categories: Vec<String>,
}

impl RetrievalRequest {
	pub fn new(query: &str) -> Self {
		Self { query: query.to_string(), size: 10, categories: Vec::new() }
	}
}

/// Terminal state of one retrieval turn.
#[derive(Debug)]
pub enum RetrievalOutcome {
	/// The judge decided no retrieval was needed; answered from the model.
	AnswerDirect { answer: String, reasoning: String },
	/// The scope gate rejected the query before any search ran.
	OutOfScope { verdict: ScopeVerdict },
	Accepted {
		answer: String,
		attempts: u32,
		/// Set when the budget ran out and a below-threshold answer was
		/// accepted rather than discarded.
		caveat: bool,
		support: SupportVerdict,
		utility: UtilityVerdict,
		sources: Vec<SearchHit>,
	},
	GaveUp { attempts: u32, reason: String },
}

/// Result of grading and answering over one set of hits.
#[derive(Debug)]
pub enum AttemptOutcome {
	Accepted {
		answer: String,
		support: SupportVerdict,
		utility: UtilityVerdict,
		sources: Vec<SearchHit>,
	},
	Retry(RetryReason),
}

#[derive(Debug)]
pub enum RetryReason {
	NoHits,
	NoRelevantContext,
	NotRelevant { reasoning: String },
	NotSupported { reasoning: String },
	/// Carries the candidate so an exhausted budget can still accept it
	/// with a caveat.
	LowUtility {
		answer: String,
		support: SupportVerdict,
		utility: UtilityVerdict,
		sources: Vec<SearchHit>,
	},
}

impl RetryReason {
	fn describe(&self) -> &'static str {
		match self {
			Self::NoHits => "search returned no hits",
			Self::NoRelevantContext => "no retrieved chunk was graded relevant",
			Self::NotRelevant { .. } => "combined context was graded irrelevant to the query",
			Self::NotSupported { .. } => "generated answer was not supported by the context",
			Self::LowUtility { .. } => "generated answer scored below the utility threshold",
		}
	}
}

impl Service {
	/// Run one full retrieval turn for a user query.
	pub async fn answer(&self, req: &RetrievalRequest) -> ServiceResult<RetrievalOutcome> {
		let (decision, reasoning) = self.decide_retrieval(&req.query).await;

		if decision == RetrievalDecision::NoRetrieval {
			tracing::info!(query = %req.query, "Answering without retrieval.");

			let answer = self.generate_direct(&req.query).await?;

			return Ok(RetrievalOutcome::AnswerDirect { answer, reasoning });
		}

		let scope = self.validate_scope(&req.query).await;

		if !scope.in_scope {
			tracing::info!(score = scope.score, reason = %scope.reason, "Query is out of scope.");

			return Ok(RetrievalOutcome::OutOfScope { verdict: scope });
		}

		self.run_attempts(req, |search_req| {
			Box::pin(async move { Ok(self.search_chunks(&search_req).await?.hits) })
		})
		.await
	}

	/// The bounded attempt loop over any hit source; `answer` wires it to the
	/// chunk index.
	pub async fn run_attempts<'s, F>(
		&'s self,
		req: &RetrievalRequest,
		mut source: F,
	) -> ServiceResult<RetrievalOutcome>
	where
		F: FnMut(SearchRequest) -> BoxFuture<'s, ServiceResult<Vec<SearchHit>>>,
	{
		let budget = self.cfg.retrieval.max_attempts.min(MAX_ATTEMPT_CAP);
		let mut query = req.query.clone();
		let mut fallback: Option<AttemptOutcome> = None;
		let mut last_reason = "search returned no hits";

		for attempt in 1..=budget {
			tracing::debug!(attempt, query = %query, "Starting retrieval attempt.");

			let search_req = SearchRequest {
				categories: req.categories.clone(),
				..SearchRequest::new(&query, req.size)
			};
			let hits = source(search_req).await?;

			match self.attempt_answer(&req.query, &hits).await? {
				AttemptOutcome::Accepted { answer, support, utility, sources } => {
					return Ok(RetrievalOutcome::Accepted {
						answer,
						attempts: attempt,
						caveat: false,
						support,
						utility,
						sources,
					});
				},
				AttemptOutcome::Retry(reason) => {
					tracing::info!(attempt, reason = reason.describe(), "Attempt failed.");
					last_reason = reason.describe();

					if let RetryReason::LowUtility { .. } = &reason {
						fallback = Some(AttemptOutcome::Retry(reason));
					}

					if attempt < budget {
						let rewrite = self.rewrite_query(&query).await;

						tracing::info!(rewritten = %rewrite.rewritten, "Retrying with rewritten query.");
						query = rewrite.rewritten;
					}
				},
			}
		}

		if let Some(AttemptOutcome::Retry(RetryReason::LowUtility {
			answer,
			support,
			utility,
			sources,
		})) = fallback
		{
			tracing::info!(
				utility = utility.score,
				"Budget exhausted; accepting below-threshold answer with caveat."
			);

			return Ok(RetrievalOutcome::Accepted {
				answer,
				attempts: budget,
				caveat: true,
				support,
				utility,
				sources,
			});
		}

		Ok(RetrievalOutcome::GaveUp { attempts: budget, reason: last_reason.to_string() })
	}

	/// Grade the hits, generate from the relevant ones, and verify the
	/// answer. Public so callers with their own hit source get the same
	/// grading pipeline.
	pub async fn attempt_answer(
		&self,
		query: &str,
		hits: &[SearchHit],
	) -> ServiceResult<AttemptOutcome> {
		if hits.is_empty() {
			return Ok(AttemptOutcome::Retry(RetryReason::NoHits));
		}

		let relevant = self.filter_relevant(query, hits).await;

		if relevant.is_empty() {
			return Ok(AttemptOutcome::Retry(RetryReason::NoRelevantContext));
		}

		let context = build_context(&relevant);
		let grade = self.grade_context(query, &context).await;

		if !grade.relevant {
			return Ok(AttemptOutcome::Retry(RetryReason::NotRelevant {
				reasoning: grade.reasoning,
			}));
		}

		let answer = self.generate_answer(query, &context).await?;
		let support = self.assess_support(&answer, &context).await;

		if support.level == SupportLevel::NotSupported {
			return Ok(AttemptOutcome::Retry(RetryReason::NotSupported {
				reasoning: support.reasoning,
			}));
		}

		let utility = self.rate_utility(&answer, query).await;

		if utility.score >= self.cfg.retrieval.utility_threshold {
			return Ok(AttemptOutcome::Accepted { answer, support, utility, sources: relevant });
		}

		Ok(AttemptOutcome::Retry(RetryReason::LowUtility {
			answer,
			support,
			utility,
			sources: relevant,
		}))
	}

	/// Keep hits the judge grades relevant with enough confidence. A failed
	/// judge call keeps the hit; dropping context on infrastructure errors
	/// only makes answers worse.
	pub async fn filter_relevant(&self, query: &str, hits: &[SearchHit]) -> Vec<SearchHit> {
		let floor = self.cfg.retrieval.filter_confidence_floor;
		let mut kept = Vec::with_capacity(hits.len());

		for hit in hits {
			let messages = evaluate::relevance_messages(query, &hit.chunk_text);
			let verdict = match self.providers.judge.judge(&self.cfg.providers.judge, &messages).await
			{
				Ok(value) => evaluate::parse_relevance(&value),
				Err(err) => {
					tracing::warn!(error = %err, chunk_id = %hit.chunk_id, "Relevance grading failed; keeping hit.");
					evaluate::parse_relevance(&Value::Null)
				},
			};

			if verdict.label == RelevanceLabel::Relevant && verdict.confidence >= floor {
				kept.push(hit.clone());
			}
		}

		tracing::debug!(kept = kept.len(), total = hits.len(), "Graded hits for relevance.");

		kept
	}

	async fn decide_retrieval(&self, query: &str) -> (RetrievalDecision, String) {
		let messages = evaluate::retrieval_decision_messages(query);

		match self.providers.judge.judge(&self.cfg.providers.judge, &messages).await {
			Ok(value) => evaluate::parse_retrieval_decision(&value),
			Err(err) => {
				tracing::warn!(error = %err, "Retrieval decision failed; defaulting to retrieve.");

				(RetrievalDecision::Retrieve, "Default to retrieval".to_string())
			},
		}
	}

	async fn validate_scope(&self, query: &str) -> ScopeVerdict {
		let threshold = self.cfg.retrieval.scope_threshold;
		let messages = evaluate::scope_messages(query);

		match self.providers.judge.judge(&self.cfg.providers.judge, &messages).await {
			Ok(value) => evaluate::parse_scope(&value, threshold),
			Err(err) => {
				tracing::warn!(error = %err, "Scope judge failed; using keyword heuristic.");

				evaluate::heuristic_scope(query, threshold)
			},
		}
	}

	async fn grade_context(&self, query: &str, context: &str) -> GradeVerdict {
		let messages = evaluate::grade_messages(query, context);

		match self.providers.judge.judge(&self.cfg.providers.judge, &messages).await {
			Ok(value) => evaluate::parse_grade(&value),
			Err(err) => {
				tracing::warn!(error = %err, "Context grading failed; using length heuristic.");

				evaluate::heuristic_grade(context)
			},
		}
	}

	async fn assess_support(&self, answer: &str, context: &str) -> SupportVerdict {
		let messages = evaluate::support_messages(answer, context);

		match self.providers.judge.judge(&self.cfg.providers.judge, &messages).await {
			Ok(value) => evaluate::parse_support(&value),
			Err(err) => {
				tracing::warn!(error = %err, "Support assessment failed; assuming partial support.");

				evaluate::parse_support(&Value::Null)
			},
		}
	}

	async fn rate_utility(&self, answer: &str, query: &str) -> UtilityVerdict {
		let messages = evaluate::utility_messages(answer, query);

		match self.providers.judge.judge(&self.cfg.providers.judge, &messages).await {
			Ok(value) => evaluate::parse_utility(&value),
			Err(err) => {
				tracing::warn!(error = %err, "Utility rating failed; assuming midpoint score.");

				evaluate::parse_utility(&Value::Null)
			},
		}
	}

	async fn generate_answer(&self, query: &str, context: &str) -> ServiceResult<String> {
		let messages = vec![
			json!({
				"role": "system",
				"content": "You answer questions about academic papers using only the provided \
					context. Cite sources by their bracketed numbers. If the context does not \
					contain the answer, say so.",
			}),
			json!({ "role": "user", "content": format!("CONTEXT:\n{context}\n\nQUESTION: {query}") }),
		];
		let answer =
			self.providers.generator.generate(&self.cfg.providers.generator, &messages).await?;

		if answer.trim().is_empty() {
			return Err(ServiceError::Provider {
				message: "Generator returned an empty answer.".to_string(),
			});
		}

		Ok(answer)
	}

	async fn generate_direct(&self, query: &str) -> ServiceResult<String> {
		let messages = vec![json!({ "role": "user", "content": query })];

		Ok(self.providers.generator.generate(&self.cfg.providers.generator, &messages).await?)
	}
}

/// Number the relevant chunks so generated answers can cite them.
pub fn build_context(hits: &[SearchHit]) -> String {
	let mut out = String::new();

	for (i, hit) in hits.iter().enumerate() {
		if i > 0 {
			out.push_str("\n\n");
		}

		out.push_str(&format!("[{}] {} ({})\n{}", i + 1, hit.title, hit.external_id, hit.chunk_text));
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hit(external_id: &str, title: &str, text: &str) -> SearchHit {
		SearchHit {
			chunk_id: format!("{external_id}-c0"),
			chunk_text: text.to_string(),
			title: title.to_string(),
			abstract_text: String::new(),
			external_id: external_id.to_string(),
			document_id: external_id.to_string(),
			chunk_index: 0,
			section_title: None,
			score: 1.0,
			highlights: None,
		}
	}

	#[test]
	fn context_numbers_sources_for_citation() {
		let hits = vec![
			hit("1706.03762", "Attention Is All You Need", "Multi-head attention."),
			hit("1810.04805", "BERT", "Masked language modeling."),
		];
		let context = build_context(&hits);

		assert!(context.starts_with("[1] Attention Is All You Need (1706.03762)\n"));
		assert!(context.contains("\n\n[2] BERT (1810.04805)\nMasked language modeling."));
	}
}
