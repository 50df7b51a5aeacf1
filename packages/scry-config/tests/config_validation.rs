use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use scry_config::Error;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn sample_toml() -> String {
	SAMPLE_CONFIG_TEMPLATE_TOML.to_string()
}

fn sample_toml_with<F>(mutate: F) -> String
where
	F: FnOnce(&mut toml::Table),
{
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	mutate(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn write_temp_config(contents: &str) -> PathBuf {
	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("Clock went backwards.");
	let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
	let path = env::temp_dir()
		.join(format!("scry-config-test-{}-{unique}.toml", nanos.as_nanos()));

	fs::write(&path, contents).expect("Failed to write temp config.");

	path
}

fn load(contents: &str) -> scry_config::Result<scry_config::Config> {
	let path = write_temp_config(contents);
	let result = scry_config::load(&path);

	fs::remove_file(&path).ok();

	result
}

#[test]
fn loads_valid_config() {
	let cfg = load(&sample_toml()).expect("Sample config must load.");

	assert_eq!(cfg.chunking.chunk_size, 600);
	assert_eq!(cfg.search.engine.index, "paper-chunks");
	assert_eq!(cfg.retrieval.max_attempts, 3);
}

#[test]
fn rejects_overlap_at_or_above_chunk_size() {
	for overlap in [600_i64, 900] {
		let toml = sample_toml_with(|root| {
			let chunking = root
				.get_mut("chunking")
				.and_then(Value::as_table_mut)
				.expect("Template config must include [chunking].");
			chunking.insert("overlap_size".to_string(), Value::Integer(overlap));
		});

		assert!(matches!(load(&toml), Err(Error::Validation { .. })));
	}
}

#[test]
fn rejects_vector_dim_mismatch() {
	let toml = sample_toml_with(|root| {
		let engine = root
			.get_mut("search")
			.and_then(Value::as_table_mut)
			.and_then(|search| search.get_mut("engine"))
			.and_then(Value::as_table_mut)
			.expect("Template config must include [search.engine].");
		engine.insert("vector_dim".to_string(), Value::Integer(1024));
	});

	assert!(matches!(load(&toml), Err(Error::Validation { .. })));
}

#[test]
fn rejects_attempt_budget_outside_cap() {
	for attempts in [0_i64, 4, 10] {
		let toml = sample_toml_with(|root| {
			let retrieval = root
				.get_mut("retrieval")
				.and_then(Value::as_table_mut)
				.expect("Template config must include [retrieval].");
			retrieval.insert("max_attempts".to_string(), Value::Integer(attempts));
		});

		assert!(matches!(load(&toml), Err(Error::Validation { .. })));
	}
}

#[test]
fn rejects_empty_api_key() {
	let toml = sample_toml_with(|root| {
		let judge = root
			.get_mut("providers")
			.and_then(Value::as_table_mut)
			.and_then(|providers| providers.get_mut("judge"))
			.and_then(Value::as_table_mut)
			.expect("Template config must include [providers.judge].");
		judge.insert("api_key".to_string(), Value::String("  ".to_string()));
	});

	assert!(matches!(load(&toml), Err(Error::Validation { .. })));
}

#[test]
fn rejects_negative_min_score() {
	let toml = sample_toml_with(|root| {
		let engine = root
			.get_mut("search")
			.and_then(Value::as_table_mut)
			.and_then(|search| search.get_mut("engine"))
			.and_then(Value::as_table_mut)
			.expect("Template config must include [search.engine].");
		engine.insert("min_score".to_string(), Value::Float(-0.5));
	});

	assert!(matches!(load(&toml), Err(Error::Validation { .. })));
}
