use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory holding persisted state (relative to the config file).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            polling: PollingConfig::default(),
            display: DisplayConfig::default(),
            source: SourceConfig::default(),
            discord: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        Ok(serde_saphyr::from_str(&expanded)?)
    }

    /// Check values that cannot be expressed in the schema.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let minutes = self.polling.interval_minutes;
        if !(1..=59).contains(&minutes) {
            return Err(ConfigError::Invalid(format!(
                "polling.interval_minutes must be between 1 and 59, got {minutes}"
            )));
        }

        self.timezone()?;

        url::Url::parse(&self.source.base_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "source.base_url '{}' is not a valid URL: {e}",
                self.source.base_url
            ))
        })?;

        match &self.discord {
            Some(discord) if !discord.bot_token.trim().is_empty() => Ok(()),
            Some(_) => Err(ConfigError::Invalid(
                "discord.bot_token must not be empty".to_string(),
            )),
            None => Err(ConfigError::Invalid(
                "discord section is required".to_string(),
            )),
        }
    }

    /// Display timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.display.timezone.parse::<Tz>().map_err(|e| {
            ConfigError::Invalid(format!(
                "display.timezone '{}' is not an IANA timezone: {e}",
                self.display.timezone
            ))
        })
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.polling.page_delay_seconds)
    }

    /// Directory for subscription documents.
    pub fn subscriptions_dir(&self, config_path: &Path) -> PathBuf {
        resolve_path(config_path, &self.data_dir).join(DEFAULT_SUBSCRIPTIONS_DIR)
    }
}

/// Resolve a path relative to the config file directory.
///
/// If the path is absolute, it is returned as-is.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// Defaults
// ============================================================================

/// Default data directory (relative to config file).
pub const DEFAULT_DATA_DIR: &str = ".feedrelay";
/// Default subscriptions directory (relative to data directory).
pub const DEFAULT_SUBSCRIPTIONS_DIR: &str = "subscriptions";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_interval_minutes() -> u32 {
    10
}

fn default_page_delay_seconds() -> u64 {
    10
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports the following syntax (shell-compatible):
/// - `${VAR}` - Required variable, errors if not set
/// - `${VAR:-default}` - Optional variable with default value
/// - `${VAR:-}` - Optional variable, empty string if not set
/// - `$$` - Escaped `$` (only needed before `{` to prevent expansion)
///
/// Nested expansion (`${VAR:-${DEFAULT}}`) is not supported.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                result.push_str(&parse_var_reference(&mut chars)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Parse a variable reference after seeing `${`.
fn parse_var_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;

    loop {
        let Some(c) = chars.next() else {
            return Err(ConfigError::UnclosedVarReference);
        };
        match c {
            '}' => break,
            ':' if default_value.is_none() && chars.peek() == Some(&'-') => {
                chars.next();
                default_value = Some(String::new());
            }
            c => match default_value.as_mut() {
                Some(default) => default.push(c),
                None => var_name.push(c),
            },
        }
    }

    match std::env::var(&var_name) {
        Ok(value) => Ok(value),
        Err(_) => default_value.ok_or(ConfigError::MissingEnvVar(var_name)),
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PollingConfig {
    /// Minutes between cycles, aligned to the wall clock.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// Pause between successive page fetches within one cycle.
    #[serde(default = "default_page_delay_seconds")]
    pub page_delay_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            page_delay_seconds: default_page_delay_seconds(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    /// IANA timezone for rendered timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent to the timeline bridge.
    #[serde(default)]
    pub token: Option<String>,
    /// Cookie header, or a JSON object of cookie names to values.
    #[serde(default)]
    pub cookies: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            cookies: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::{NamedTempFile, TempDir};

    fn valid_config() -> Config {
        Config {
            discord: Some(DiscordConfig {
                bot_token: "token".to_string(),
            }),
            ..Config::default()
        }
    }

    // ========================================================================
    // Config Tests
    // ========================================================================

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from(".feedrelay"));
        assert_eq!(config.polling.interval_minutes, 10);
        assert_eq!(config.page_delay(), Duration::from_secs(10));
        assert_eq!(config.display.timezone, "Asia/Tokyo");
        assert_eq!(config.source.base_url, "http://127.0.0.1:8787");
        assert!(config.discord.is_none());
    }

    #[tokio::test]
    async fn load_missing_file_returns_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let config = Config::load(tmp_dir.path().join("missing.yaml"))
            .await
            .unwrap();
        assert_eq!(config.polling.interval_minutes, 10);
    }

    #[tokio::test]
    async fn load_valid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
data_dir: /var/lib/feedrelay
polling:
  interval_minutes: 5
  page_delay_seconds: 2
display:
  timezone: Europe/Berlin
source:
  base_url: "http://bridge:9000/api"
  token: abc
discord:
  bot_token: secret
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/feedrelay"));
        assert_eq!(config.polling.interval_minutes, 5);
        assert_eq!(config.page_delay(), Duration::from_secs(2));
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(config.source.base_url, "http://bridge:9000/api");
        assert_eq!(config.source.token.as_deref(), Some("abc"));
        assert_eq!(config.discord.as_ref().unwrap().bot_token, "secret");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn load_partial_yaml_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "polling:\n  interval_minutes: 30\n").unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.polling.interval_minutes, 30);
        assert_eq!(config.polling.page_delay_seconds, 10);
        assert_eq!(config.display.timezone, "Asia/Tokyo");
    }

    #[tokio::test]
    async fn load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        assert!(Config::load(file.path()).await.is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_interval() {
        let mut config = valid_config();
        config.polling.interval_minutes = 60;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.polling.interval_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_timezone() {
        let mut config = valid_config();
        config.display.timezone = "Mars/Olympus".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn validate_requires_bot_token() {
        let mut config = valid_config();
        config.discord = Some(DiscordConfig {
            bot_token: "  ".to_string(),
        });
        assert!(config.validate().is_err());

        config.discord = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = valid_config();
        config.source.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn subscriptions_dir_relative_to_config() {
        let config = Config::default();
        let dir = config.subscriptions_dir(Path::new("/etc/feedrelay/feedrelay.yaml"));
        assert_eq!(
            dir,
            PathBuf::from("/etc/feedrelay/.feedrelay/subscriptions")
        );
    }

    #[test]
    fn resolve_path_absolute() {
        let result = resolve_path(Path::new("/etc/feedrelay.yaml"), Path::new("/var/data"));
        assert_eq!(result, PathBuf::from("/var/data"));
    }

    // ========================================================================
    // Environment Variable Expansion Tests
    // ========================================================================

    #[test]
    fn expand_env_vars_no_vars() {
        let input = "plain string without variables";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }

    #[test]
    fn expand_env_vars_required_var() {
        // SAFETY: Single-threaded test
        unsafe { std::env::set_var("FEEDRELAY_TEST_REQUIRED", "test_value") };
        let result = expand_env_vars("prefix ${FEEDRELAY_TEST_REQUIRED} suffix").unwrap();
        assert_eq!(result, "prefix test_value suffix");
        unsafe { std::env::remove_var("FEEDRELAY_TEST_REQUIRED") };
    }

    #[test]
    fn expand_env_vars_missing_required_var() {
        // SAFETY: Single-threaded test
        unsafe { std::env::remove_var("FEEDRELAY_MISSING_12345") };
        match expand_env_vars("value: ${FEEDRELAY_MISSING_12345}") {
            Err(ConfigError::MissingEnvVar(name)) => assert_eq!(name, "FEEDRELAY_MISSING_12345"),
            other => panic!("expected MissingEnvVar error, got {other:?}"),
        }
    }

    #[test]
    fn expand_env_vars_defaults() {
        // SAFETY: Single-threaded test
        unsafe { std::env::remove_var("FEEDRELAY_UNSET_DEFAULT") };
        assert_eq!(
            expand_env_vars("interval: ${FEEDRELAY_UNSET_DEFAULT:-10}").unwrap(),
            "interval: 10"
        );
        assert_eq!(
            expand_env_vars("token: ${FEEDRELAY_UNSET_DEFAULT:-}").unwrap(),
            "token: "
        );
    }

    #[test]
    fn expand_env_vars_default_keeps_colons() {
        assert_eq!(
            expand_env_vars("url: ${FEEDRELAY_UNSET_URL:-http://127.0.0.1:8787}").unwrap(),
            "url: http://127.0.0.1:8787"
        );
    }

    #[test]
    fn expand_env_vars_set_var_ignores_default() {
        // SAFETY: Single-threaded test
        unsafe { std::env::set_var("FEEDRELAY_SET_DEFAULT", "actual") };
        assert_eq!(
            expand_env_vars("value: ${FEEDRELAY_SET_DEFAULT:-ignored}").unwrap(),
            "value: actual"
        );
        unsafe { std::env::remove_var("FEEDRELAY_SET_DEFAULT") };
    }

    #[test]
    fn expand_env_vars_escaped_and_literal_dollar() {
        assert_eq!(
            expand_env_vars("price: $$100 and ${FEEDRELAY_ESCAPE:-value}").unwrap(),
            "price: $100 and value"
        );
        assert_eq!(expand_env_vars("cost is $50").unwrap(), "cost is $50");
    }

    #[test]
    fn expand_env_vars_unclosed_brace() {
        assert!(matches!(
            expand_env_vars("value: ${UNCLOSED"),
            Err(ConfigError::UnclosedVarReference)
        ));
        assert!(matches!(
            expand_env_vars("value: ${UNCLOSED:-default"),
            Err(ConfigError::UnclosedVarReference)
        ));
    }

    #[tokio::test]
    async fn load_with_env_var() {
        // SAFETY: Single-threaded test
        unsafe { std::env::set_var("FEEDRELAY_TEST_TOKEN", "env_token_value") };

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
discord:
  bot_token: ${{FEEDRELAY_TEST_TOKEN}}
source:
  token: ${{FEEDRELAY_UNSET_SOURCE_TOKEN:-}}
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.discord.unwrap().bot_token, "env_token_value");
        assert!(config.source.token.is_none_or(|t| t.is_empty()));

        unsafe { std::env::remove_var("FEEDRELAY_TEST_TOKEN") };
    }
}
