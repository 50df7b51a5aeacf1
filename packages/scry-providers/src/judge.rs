use color_eyre::{Result, eyre};
use serde_json::Value;

/// Ask the judge model a question and parse its reply as a JSON object.
/// Models wrap JSON in prose or code fences often enough that we salvage the
/// first balanced object from the text before giving up.
pub async fn invoke(cfg: &scry_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let content = crate::chat::complete(cfg, messages).await?;

	parse_judge_content(&content)
}

fn parse_judge_content(content: &str) -> Result<Value> {
	if let Ok(value) = serde_json::from_str::<Value>(content.trim())
		&& value.is_object()
	{
		return Ok(value);
	}

	let start = content.find('{');
	let end = content.rfind('}');
	if let (Some(start), Some(end)) = (start, end)
		&& start < end
		&& let Ok(value) = serde_json::from_str::<Value>(&content[start..=end])
		&& value.is_object()
	{
		return Ok(value);
	}

	Err(eyre::eyre!("Judge response contains no JSON object."))
}
