use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
///
/// Event-source and reply-sink credentials live with their adapters, not
/// here; this covers the backend, the store, and the pipeline knobs.
#[derive(Debug, Clone)]
pub struct Config {
    // Generative backend
    pub gemini_api_key: String,
    pub gemini_model: String,

    // Store
    pub db_path: String,
    pub db_passphrase: String,

    // Pipeline
    pub trigger_phrases: Vec<String>,
    pub fact_check_concurrency: Option<usize>,
    pub fact_check_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: required_env("GEMINI_API_KEY"),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            db_path: env::var("DB_PATH").unwrap_or_else(|_| "threadlens.db".to_string()),
            db_passphrase: required_env("DB_PASSPHRASE"),
            trigger_phrases: parse_trigger_phrases(
                &env::var("TRIGGER_PHRASES").unwrap_or_else(|_| "!threadlens".to_string()),
            ),
            fact_check_concurrency: env::var("FACT_CHECK_CONCURRENCY")
                .ok()
                .map(|v| v.parse().expect("FACT_CHECK_CONCURRENCY must be a number")),
            fact_check_timeout_secs: env::var("FACT_CHECK_TIMEOUT_SECS")
                .ok()
                .map(|v| v.parse().expect("FACT_CHECK_TIMEOUT_SECS must be a number")),
        }
    }

    /// Log the non-secret parts of the configuration.
    pub fn log_redacted(&self) {
        info!(
            model = self.gemini_model.as_str(),
            db_path = self.db_path.as_str(),
            trigger_phrases = ?self.trigger_phrases,
            fact_check_concurrency = ?self.fact_check_concurrency,
            fact_check_timeout_secs = ?self.fact_check_timeout_secs,
            "Configuration loaded"
        );
    }

    /// True when `body` contains any configured trigger phrase.
    pub fn matches_trigger(&self, body: &str) -> bool {
        matches_trigger(&self.trigger_phrases, body)
    }
}

/// Case-insensitive substring match against the trigger phrase list.
pub fn matches_trigger(phrases: &[String], body: &str) -> bool {
    let body = body.to_lowercase();
    phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && body.contains(&phrase.to_lowercase()))
}

fn parse_trigger_phrases(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
