/// Whether mock backends are installed.
pub const MOCK_MODE_KEY: &str = "mockMode_v1";

/// Text of the last prompt that completed.
pub const LAST_PROMPT_KEY: &str = "lastPrompt";

/// Prefix of the local summary used when no summarizer can run.
pub const SUMMARY_FALLBACK_PREFIX: &str = "[Mock Summary] ";

/// Characters of the source kept by the local summary.
pub const SUMMARY_FALLBACK_CHARS: usize = 240;

/// Shortest selection that triggers automatic language detection.
pub const AUTO_DETECT_MIN_CHARS: usize = 3;

pub const DEFAULT_TARGET_LANGUAGE: &str = "fr";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SMARTNOTES_DATA_DIR";

pub const APP_DIR_NAME: &str = "smartnotes";

pub const DATABASE_FILE: &str = "smartnotes.db";
