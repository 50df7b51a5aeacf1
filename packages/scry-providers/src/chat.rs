use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// One chat-completions round trip, returning the first choice's text.
pub async fn complete(cfg: &scry_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion_content(json)
}

fn parse_completion_content(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| eyre::eyre!("Completion response is missing message content."))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_first_choice_content() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": "An answer." } }]
		});
		assert_eq!(parse_completion_content(json).expect("parse failed"), "An answer.");
	}

	#[test]
	fn missing_choices_is_an_error() {
		assert!(parse_completion_content(serde_json::json!({ "usage": {} })).is_err());
	}
}
