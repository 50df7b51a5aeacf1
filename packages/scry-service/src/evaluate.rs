//! Judge verdict types, the prompts that elicit them, and tolerant parsers.
//! Malformed judge output always degrades to a neutral verdict; the retrieval
//! loop must keep moving even when the judge rambles.

use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalDecision {
	Retrieve,
	NoRetrieval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceLabel {
	Relevant,
	Irrelevant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportLevel {
	FullySupported,
	PartiallySupported,
	NotSupported,
}

#[derive(Debug, Clone)]
pub struct ScopeVerdict {
	/// 0-100, clamped at parse time.
	pub score: u32,
	pub reason: String,
	pub in_scope: bool,
}

#[derive(Debug, Clone)]
pub struct RelevanceVerdict {
	pub label: RelevanceLabel,
	/// 0.0-1.0, clamped at parse time.
	pub confidence: f32,
}

/// Whole-context relevance grade, taken once over the combined context before
/// any answer is generated.
#[derive(Debug, Clone)]
pub struct GradeVerdict {
	pub relevant: bool,
	pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct SupportVerdict {
	pub level: SupportLevel,
	pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct UtilityVerdict {
	/// 1-10, clamped at parse time.
	pub score: u32,
	pub feedback: String,
}

impl SupportLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::FullySupported => "fully_supported",
			Self::PartiallySupported => "partially_supported",
			Self::NotSupported => "not_supported",
		}
	}
}

pub fn retrieval_decision_messages(query: &str) -> Vec<Value> {
	let prompt = format!(
		"You are a retrieval decision system. Determine if external document retrieval is \
		 necessary to answer this query.\n\nQUERY: \"{query}\"\n\nDECISION CRITERIA:\n- \
		 \"retrieve\": Query requires factual information, research papers, specific data, or \
		 technical details\n- \"no_retrieval\": Query is simple math, common knowledge, or \
		 conversational (e.g., \"hello\", \"2+2\", \"what time is it\")\n\nRespond in JSON: \
		 {{\"decision\": \"retrieve\" | \"no_retrieval\", \"reasoning\": \"<brief explanation>\"}}"
	);

	vec![json!({ "role": "user", "content": prompt })]
}

pub fn scope_messages(query: &str) -> Vec<Value> {
	let prompt = format!(
		"You are a query classifier for an academic paper search system focused on Computer \
		 Science, AI, and Machine Learning research.\n\nEvaluate whether the following query is \
		 within scope for searching academic papers.\n\nSCORING CRITERIA:\n- 100: Clearly about \
		 CS/AI/ML research, papers, methods, or algorithms\n- 75-99: Related to tech/science but \
		 may be peripheral to core CS/AI/ML\n- 50-74: Ambiguous or could have academic \
		 relevance\n- 25-49: Mostly off-topic but has some tangential relevance\n- 0-24: \
		 Completely off-topic (personal questions, entertainment, etc.)\n\nUSER QUERY: \
		 {query}\n\nRespond in JSON: {{\"score\": <0-100>, \"reason\": \"<brief explanation>\"}}"
	);

	vec![json!({ "role": "user", "content": prompt })]
}

pub fn relevance_messages(query: &str, document: &str) -> Vec<Value> {
	let prompt = format!(
		"Evaluate if this document is relevant to the query.\n\nQUERY: \
		 \"{query}\"\n\nDOCUMENT:\n{}\n\nIs this document RELEVANT to answering the query?\n- \
		 \"relevant\": Document contains information useful for answering the query\n- \
		 \"irrelevant\": Document is off-topic or not useful\n\nRespond in JSON: {{\"label\": \
		 \"relevant\" | \"irrelevant\", \"confidence\": <0.0-1.0>}}",
		truncate(document, 1500)
	);

	vec![json!({ "role": "user", "content": prompt })]
}

pub fn grade_messages(query: &str, context: &str) -> Vec<Value> {
	let prompt = format!(
		"Grade whether the retrieved context, taken as a whole, is relevant to the \
		 query.\n\nQUERY: \"{query}\"\n\nCONTEXT:\n{}\n\nIs this context RELEVANT to answering \
		 the query?\n- \"yes\": The context contains information that helps answer the query\n- \
		 \"no\": The context is off-topic or too thin to answer from\n\nRespond in JSON: \
		 {{\"relevant\": \"yes\" | \"no\", \"reasoning\": \"<brief explanation>\"}}",
		truncate(context, 3000)
	);

	vec![json!({ "role": "user", "content": prompt })]
}

pub fn support_messages(response: &str, context: &str) -> Vec<Value> {
	let prompt = format!(
		"Evaluate if this response is supported by the given \
		 context.\n\nCONTEXT:\n{}\n\nRESPONSE:\n{}\n\nSUPPORT LEVELS:\n- \"fully_supported\": \
		 Every claim in the response is directly supported by the context\n- \
		 \"partially_supported\": Some claims are supported, others are inferred or not in \
		 context\n- \"not_supported\": The response contains claims that contradict or aren't in \
		 the context\n\nRespond in JSON: {{\"level\": \"fully_supported\" | \
		 \"partially_supported\" | \"not_supported\", \"reasoning\": \"<brief explanation>\"}}",
		truncate(context, 3000),
		truncate(response, 1000)
	);

	vec![json!({ "role": "user", "content": prompt })]
}

pub fn utility_messages(response: &str, query: &str) -> Vec<Value> {
	let prompt = format!(
		"Rate the utility of this response for the given query.\n\nQUERY: \
		 \"{query}\"\n\nRESPONSE:\n{}\n\nUTILITY SCORE (1-10):\n1-2 = Completely unhelpful, \
		 wrong, or off-topic\n3-4 = Mostly unhelpful, missing key information\n5-6 = Somewhat \
		 helpful, covers basics\n7-8 = Helpful, addresses the query well\n9-10 = Excellent, \
		 comprehensive and accurate\n\nRespond in JSON: {{\"score\": <1-10>, \"feedback\": \
		 \"<brief explanation>\"}}",
		truncate(response, 1000)
	);

	vec![json!({ "role": "user", "content": prompt })]
}

pub fn parse_retrieval_decision(verdict: &Value) -> (RetrievalDecision, String) {
	let decision = match verdict["decision"].as_str() {
		Some("no_retrieval") => RetrievalDecision::NoRetrieval,
		_ => RetrievalDecision::Retrieve,
	};

	(decision, reason_field(verdict, "reasoning"))
}

pub fn parse_scope(verdict: &Value, threshold: u32) -> ScopeVerdict {
	let score = verdict["score"].as_u64().map(|s| s.min(100) as u32).unwrap_or(50);

	ScopeVerdict { score, reason: reason_field(verdict, "reason"), in_scope: score >= threshold }
}

pub fn parse_relevance(verdict: &Value) -> RelevanceVerdict {
	let label = match verdict["label"].as_str() {
		Some("irrelevant") => RelevanceLabel::Irrelevant,
		_ => RelevanceLabel::Relevant,
	};
	let confidence = verdict["confidence"].as_f64().map(|c| c.clamp(0.0, 1.0) as f32).unwrap_or(0.5);

	RelevanceVerdict { label, confidence }
}

pub fn parse_grade(verdict: &Value) -> GradeVerdict {
	let relevant = match &verdict["relevant"] {
		Value::Bool(flag) => *flag,
		Value::String(answer) => !answer.trim().eq_ignore_ascii_case("no"),
		_ => true,
	};

	GradeVerdict { relevant, reasoning: reason_field(verdict, "reasoning") }
}

pub fn parse_support(verdict: &Value) -> SupportVerdict {
	let level = match verdict["level"].as_str() {
		Some("fully_supported") => SupportLevel::FullySupported,
		Some("not_supported") => SupportLevel::NotSupported,
		_ => SupportLevel::PartiallySupported,
	};

	SupportVerdict { level, reasoning: reason_field(verdict, "reasoning") }
}

pub fn parse_utility(verdict: &Value) -> UtilityVerdict {
	let score = verdict["score"].as_u64().map(|s| s.clamp(1, 10) as u32).unwrap_or(5);

	UtilityVerdict { score, feedback: reason_field(verdict, "feedback") }
}

/// Keyword fallback when the judge is unreachable: err on the side of letting
/// the query through.
pub fn heuristic_scope(query: &str, threshold: u32) -> ScopeVerdict {
	const KEYWORDS: &[&str] = &[
		"paper",
		"research",
		"algorithm",
		"model",
		"neural",
		"learning",
		"ai",
		"ml",
		"nlp",
		"computer",
		"vision",
		"transformer",
		"llm",
		"training",
		"dataset",
		"benchmark",
		"method",
		"approach",
	];

	let lower = query.to_lowercase();
	let matches = KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
	let (score, reason) = if matches >= 3 {
		(90, "Query strongly indicates academic/research intent")
	} else if matches >= 1 {
		(70, "Query has some academic relevance")
	} else if lower.contains('?') || lower.contains("how") || lower.contains("what") {
		(50, "Query is a question, may have research relevance")
	} else {
		(30, "Query lacks clear academic intent")
	};

	ScopeVerdict { score, reason: reason.to_string(), in_scope: score >= threshold }
}

/// Length fallback when the judge is unreachable: a substantial context is
/// worth generating from, a near-empty one is not.
pub fn heuristic_grade(context: &str) -> GradeVerdict {
	let words = context.split_whitespace().count();
	let (relevant, reasoning) = if words >= 10 {
		(true, "Context is substantial enough to answer from")
	} else {
		(false, "Context is too thin to answer from")
	};

	GradeVerdict { relevant, reasoning: reasoning.to_string() }
}

fn reason_field(verdict: &Value, key: &str) -> String {
	verdict[key].as_str().unwrap_or_default().to_string()
}

fn truncate(text: &str, max: usize) -> &str {
	match text.char_indices().nth(max) {
		Some((offset, _)) => &text[..offset],
		None => text,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn malformed_decision_defaults_to_retrieve() {
		let (decision, _) = parse_retrieval_decision(&json!({ "decision": "maybe" }));

		assert_eq!(decision, RetrievalDecision::Retrieve);

		let (decision, _) = parse_retrieval_decision(&json!({}));

		assert_eq!(decision, RetrievalDecision::Retrieve);
	}

	#[test]
	fn scope_score_clamps_and_defaults() {
		assert_eq!(parse_scope(&json!({ "score": 250 }), 50).score, 100);
		assert_eq!(parse_scope(&json!({ "score": "high" }), 50).score, 50);
		assert!(!parse_scope(&json!({ "score": 20, "reason": "off-topic" }), 50).in_scope);
	}

	#[test]
	fn relevance_defaults_are_neutral() {
		let verdict = parse_relevance(&json!({}));

		assert_eq!(verdict.label, RelevanceLabel::Relevant);
		assert!((verdict.confidence - 0.5).abs() < 1e-6);

		let verdict = parse_relevance(&json!({ "label": "irrelevant", "confidence": 1.4 }));

		assert_eq!(verdict.label, RelevanceLabel::Irrelevant);
		assert!((verdict.confidence - 1.0).abs() < 1e-6);
	}

	#[test]
	fn grade_accepts_string_and_boolean_answers() {
		assert!(!parse_grade(&json!({ "relevant": "no", "reasoning": "off-topic" })).relevant);
		assert!(parse_grade(&json!({ "relevant": "yes" })).relevant);
		assert!(!parse_grade(&json!({ "relevant": false })).relevant);
		assert!(parse_grade(&json!({})).relevant);
	}

	#[test]
	fn heuristic_grade_rejects_near_empty_context() {
		assert!(!heuristic_grade("[1] Title (1234)").relevant);
		assert!(
			heuristic_grade(
				"[1] Attention Is All You Need (1706.03762)\nScaled dot-product attention maps a \
				 query and key-value pairs to a weighted output."
			)
			.relevant
		);
	}

	#[test]
	fn unknown_support_level_is_partial() {
		assert_eq!(parse_support(&json!({ "level": "sort_of" })).level, SupportLevel::PartiallySupported);
		assert_eq!(
			parse_support(&json!({ "level": "not_supported" })).level,
			SupportLevel::NotSupported
		);
	}

	#[test]
	fn utility_clamps_to_scale() {
		assert_eq!(parse_utility(&json!({ "score": 0 })).score, 1);
		assert_eq!(parse_utility(&json!({ "score": 42 })).score, 10);
		assert_eq!(parse_utility(&json!({ "feedback": "fine" })).score, 5);
	}

	#[test]
	fn heuristic_scope_scores_by_keyword_density() {
		assert_eq!(heuristic_scope("transformer model training paper", 50).score, 90);
		assert_eq!(heuristic_scope("something about datasets", 50).score, 70);
		assert_eq!(heuristic_scope("best pizza in town", 50).score, 30);
	}
}
