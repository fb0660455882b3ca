use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use grounding_config::{Config, StageBudget};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(edit: impl FnOnce(&mut toml::Table)) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("grounding_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	grounding_config::from_toml_str(SAMPLE_CONFIG_TEMPLATE_TOML)
		.expect("Template config must be valid.")
}

#[test]
fn loads_template_and_normalizes_api_base() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = grounding_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected template config to load.");

	assert_eq!(cfg.upstream.api_base.as_deref(), Some("https://search.example.com"));
	assert_eq!(cfg.resolver.scoring_version, "v2");
	assert_eq!(cfg.brands.len(), 1);
}

#[test]
fn minimal_config_uses_defaults() {
	let cfg = grounding_config::from_toml_str("[service]\nlog_level = \"debug\"\n")
		.expect("Expected minimal config to load.");

	assert!(cfg.storage.postgres.is_none());
	assert!(cfg.upstream.api_base.is_none());
	assert_eq!(cfg.upstream.search_path, "/agent/v1/products/search");
	assert_eq!(cfg.resolver.timeout_ms, 800);
	assert_eq!(cfg.resolver.candidates_limit, 6);
	assert_eq!(cfg.resolver.v1_min_confidence, 0.72);
	assert_eq!(cfg.resolver.v2_min_confidence, 0.68);
	assert_eq!(cfg.resolver.budget.global_search, StageBudget { cap_ms: 1_200, floor_ms: 120 });
}

#[test]
fn blank_credentials_normalize_to_none() {
	let payload = sample_toml_with(|root| {
		let upstream = root
			.get_mut("upstream")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [upstream].");

		upstream.insert("api_key".to_string(), Value::String("  ".to_string()));
		upstream.insert("api_base".to_string(), Value::String(" ".to_string()));
	});
	let cfg = grounding_config::from_toml_str(&payload).expect("Expected config to load.");

	assert!(cfg.upstream.api_key.is_none());
	assert!(cfg.upstream.api_base.is_none());
}

#[test]
fn credentials_are_mutually_exclusive() {
	let payload = sample_toml_with(|root| {
		let upstream = root
			.get_mut("upstream")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [upstream].");

		upstream.insert("checkout_token".to_string(), Value::String("token".to_string()));
	});
	let path = write_temp_config(payload);
	let result = grounding_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected credential validation error.");

	assert!(
		err.to_string()
			.contains("upstream.api_key and upstream.checkout_token are mutually exclusive."),
		"Unexpected error: {err}"
	);
}

#[test]
fn scoring_version_must_be_known() {
	let mut cfg = base_config();

	cfg.resolver.scoring_version = "v3".to_string();

	let err = grounding_config::validate(&cfg).expect_err("Expected scoring version error.");

	assert!(
		err.to_string().contains("resolver.scoring_version must be one of v1 or v2."),
		"Unexpected error: {err}"
	);
}

#[test]
fn timeout_must_be_within_bounds() {
	let mut cfg = base_config();

	cfg.resolver.timeout_ms = 50;

	assert!(grounding_config::validate(&cfg).is_err());

	cfg.resolver.timeout_ms = 15_000;

	assert!(grounding_config::validate(&cfg).is_ok());
}

#[test]
fn thresholds_must_be_finite_and_in_range() {
	let mut cfg = base_config();

	cfg.resolver.v2_min_confidence = f32::NAN;

	let err = grounding_config::validate(&cfg).expect_err("Expected threshold error.");

	assert!(
		err.to_string().contains("resolver.v2_min_confidence must be a finite number."),
		"Unexpected error: {err}"
	);

	cfg.resolver.v2_min_confidence = 1.2;

	let err = grounding_config::validate(&cfg).expect_err("Expected threshold error.");

	assert!(
		err.to_string().contains("resolver.v2_min_confidence must be in the range 0.0-1.0."),
		"Unexpected error: {err}"
	);
}

#[test]
fn stage_cap_must_cover_floor() {
	let mut cfg = base_config();

	cfg.resolver.budget.scoped_search = StageBudget { cap_ms: 40, floor_ms: 80 };

	let err = grounding_config::validate(&cfg).expect_err("Expected budget error.");

	assert!(
		err.to_string().contains(
			"resolver.budget.scoped_search.cap_ms must be greater than or equal to floor_ms."
		),
		"Unexpected error: {err}"
	);

	cfg.resolver.budget.scoped_search = StageBudget { cap_ms: 40, floor_ms: 0 };

	assert!(grounding_config::validate(&cfg).is_err());
}

#[test]
fn brand_families_need_aliases() {
	let mut cfg = base_config();

	cfg.brands[0].aliases = vec![" ".to_string()];

	let err = grounding_config::validate(&cfg).expect_err("Expected brand alias error.");

	assert!(
		err.to_string().contains("brands.aliases must contain a non-empty alias for acme."),
		"Unexpected error: {err}"
	);
}
