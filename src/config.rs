//! Provider configuration and credential loading.
//!
//! Settings are merged from several sources. Later sources win:
//!
//! 1. `/etc/signalfx.conf`
//! 2. `$HOME/.signalfx.conf`
//! 3. `$HOME/.netrc` (password of the machine matching the API host)
//! 4. `SFX_AUTH_TOKEN`, `SFX_API_URL`, `SFX_CUSTOM_APP_URL`
//! 5. the provider block itself
//!
//! Both config files are JSON objects with optional `auth_token`, `api_url`
//! and `custom_app_url` keys.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::RetryPolicy;
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::Checks;

/// Default REST API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.signalfx.com";

/// Default web UI endpoint, used to build `url` attributes.
pub const DEFAULT_CUSTOM_APP_URL: &str = "https://app.signalfx.com";

/// System-wide credentials file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/signalfx.conf";

/// Environment variable holding the auth token.
pub const ENV_AUTH_TOKEN: &str = "SFX_AUTH_TOKEN";
/// Environment variable holding the API URL.
pub const ENV_API_URL: &str = "SFX_API_URL";
/// Environment variable holding the custom app URL.
pub const ENV_CUSTOM_APP_URL: &str = "SFX_CUSTOM_APP_URL";

const DEFAULT_TIMEOUT_SECONDS: i64 = 120;
const DEFAULT_RETRY_MAX_ATTEMPTS: i64 = 4;
const DEFAULT_RETRY_WAIT_MIN_SECONDS: i64 = 1;
const DEFAULT_RETRY_WAIT_MAX_SECONDS: i64 = 30;

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("SignalFx / Splunk Observability Cloud provider")
        .with_attribute(
            "auth_token",
            Attribute::optional_string()
                .sensitive()
                .with_description("API access token. Falls back to SFX_AUTH_TOKEN and credential files."),
        )
        .with_attribute(
            "api_url",
            Attribute::optional_string().with_description("API URL for your realm, e.g. https://api.us1.signalfx.com"),
        )
        .with_attribute(
            "custom_app_url",
            Attribute::optional_string().with_description("Application URL used to build resource links"),
        )
        .with_attribute(
            "timeout_seconds",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_TIMEOUT_SECONDS))
                .with_description("Timeout for each API request"),
        )
        .with_attribute(
            "retry_max_attempts",
            Attribute::optional_int64().with_default(json!(DEFAULT_RETRY_MAX_ATTEMPTS)),
        )
        .with_attribute(
            "retry_wait_min_seconds",
            Attribute::optional_int64().with_default(json!(DEFAULT_RETRY_WAIT_MIN_SECONDS)),
        )
        .with_attribute(
            "retry_wait_max_seconds",
            Attribute::optional_int64().with_default(json!(DEFAULT_RETRY_WAIT_MAX_SECONDS)),
        )
        .with_attribute(
            "email",
            Attribute::optional_string().with_description("User email for session-token authentication"),
        )
        .with_attribute("password", Attribute::optional_string().sensitive())
        .with_attribute("organization_id", Attribute::optional_string())
        .with_attribute(
            "feature_preview",
            Attribute::optional_bool_map().with_description("Opt-in flags for preview features"),
        )
}

/// The provider block as sent by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API access token.
    pub auth_token: Option<String>,
    /// API URL.
    pub api_url: Option<String>,
    /// Custom app URL.
    pub custom_app_url: Option<String>,
    /// Per-request timeout.
    pub timeout_seconds: Option<i64>,
    /// Total attempts per request.
    pub retry_max_attempts: Option<i64>,
    /// Minimum backoff between attempts.
    pub retry_wait_min_seconds: Option<i64>,
    /// Maximum backoff between attempts.
    pub retry_wait_max_seconds: Option<i64>,
    /// Session login email.
    pub email: Option<String>,
    /// Session login password.
    pub password: Option<String>,
    /// Organization for session login.
    pub organization_id: Option<String>,
    /// Preview feature flags.
    pub feature_preview: HashMap<String, bool>,
}

impl ProviderConfig {
    /// Parse the provider block. `null` yields the all-defaults config.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Value checks beyond the schema.
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut checks = Checks::new();
        checks
            .int_range("timeout_seconds", self.timeout_seconds, 1, 3600)
            .int_range("retry_max_attempts", self.retry_max_attempts, 1, 20)
            .int_range("retry_wait_min_seconds", self.retry_wait_min_seconds, 0, 600)
            .int_range("retry_wait_max_seconds", self.retry_wait_max_seconds, 0, 600);
        if let (Some(min), Some(max)) = (self.retry_wait_min_seconds, self.retry_wait_max_seconds) {
            checks.ensure(min <= max, || {
                Diagnostic::error("retry_wait_min_seconds must not exceed retry_wait_max_seconds")
                    .with_attribute("retry_wait_min_seconds")
            });
        }
        if self.email.is_some() != self.password.is_some() {
            checks.extend([Diagnostic::error("email and password must be set together")
                .with_attribute(if self.email.is_some() { "password" } else { "email" })]);
        }
        checks.into_diagnostics()
    }
}

/// Contents of a `signalfx.conf` credentials file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialFile {
    /// Auth token.
    pub auth_token: Option<String>,
    /// API URL.
    pub api_url: Option<String>,
    /// Custom app URL.
    pub custom_app_url: Option<String>,
}

impl CredentialFile {
    /// Load a credentials file. `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ProviderError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProviderError::Configuration(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                )))
            },
        };
        serde_json::from_str(&content).map(Some).map_err(|e| {
            ProviderError::Configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// One `machine` entry of a netrc file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetrcEntry {
    /// Machine name; `None` for the `default` entry.
    pub machine: Option<String>,
    /// Login.
    pub login: Option<String>,
    /// Password.
    pub password: Option<String>,
}

/// Parse netrc contents into entries. Unknown tokens and `macdef` bodies are skipped.
pub fn parse_netrc(content: &str) -> Vec<NetrcEntry> {
    let mut entries: Vec<NetrcEntry> = Vec::new();
    let mut lines = content.lines();
    let mut pending: Vec<String> = Vec::new();

    while let Some(line) = lines.next() {
        let line = line.split('#').next().unwrap_or_default();
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            if token == "macdef" {
                // A macro body runs until the next blank line.
                for body in lines.by_ref() {
                    if body.trim().is_empty() {
                        break;
                    }
                }
                break;
            }
            pending.push(token.to_string());
        }
    }

    let mut tokens = pending.into_iter();
    while let Some(token) = tokens.next() {
        match token.as_str() {
            "machine" => entries.push(NetrcEntry {
                machine: tokens.next(),
                ..Default::default()
            }),
            "default" => entries.push(NetrcEntry::default()),
            "login" | "password" | "account" => {
                let value = tokens.next();
                if let Some(entry) = entries.last_mut() {
                    match token.as_str() {
                        "login" => entry.login = value,
                        "password" => entry.password = value,
                        _ => {},
                    }
                }
            },
            _ => {},
        }
    }

    entries
}

/// Find the password for `host`, falling back to the `default` entry.
pub fn netrc_password(entries: &[NetrcEntry], host: &str) -> Option<String> {
    entries
        .iter()
        .find(|e| e.machine.as_deref() == Some(host))
        .or_else(|| entries.iter().find(|e| e.machine.is_none()))
        .and_then(|e| e.password.clone())
}

/// Where credentials are looked up. Injected so tests can point at temp files.
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    /// System-wide credentials file.
    pub system_config: Option<PathBuf>,
    /// Per-user credentials file.
    pub user_config: Option<PathBuf>,
    /// Netrc file.
    pub netrc: Option<PathBuf>,
    /// Environment variables (only the `SFX_*` keys are consulted).
    pub env: HashMap<String, String>,
}

impl CredentialSources {
    /// The real locations and the process environment.
    pub fn from_environment() -> Self {
        let home = dirs::home_dir();
        let env = [ENV_AUTH_TOKEN, ENV_API_URL, ENV_CUSTOM_APP_URL]
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self {
            system_config: Some(PathBuf::from(SYSTEM_CONFIG_PATH)),
            user_config: home.as_ref().map(|h| h.join(".signalfx.conf")),
            netrc: home.as_ref().map(|h| h.join(".netrc")),
            env,
        }
    }

    /// No files and an empty environment.
    pub fn none() -> Self {
        Self::default()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Fully merged configuration the client is built from.
#[derive(Clone)]
pub struct ResolvedConfig {
    /// Auth token, if any source supplied one.
    pub auth_token: Option<String>,
    /// API URL without trailing slash.
    pub api_url: String,
    /// App URL without trailing slash.
    pub custom_app_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry behavior.
    pub retry: RetryPolicy,
    /// Session login email.
    pub email: Option<String>,
    /// Session login password.
    pub password: Option<String>,
    /// Organization for session login.
    pub organization_id: Option<String>,
    /// Preview feature flags.
    pub feature_preview: HashMap<String, bool>,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("custom_app_url", &self.custom_app_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("email", &self.email)
            .field("organization_id", &self.organization_id)
            .field("feature_preview", &self.feature_preview)
            .finish()
    }
}

impl ResolvedConfig {
    /// Preview features switched on, sorted by name.
    pub fn enabled_features(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .feature_preview
            .iter()
            .filter_map(|(name, on)| on.then_some(name.as_str()))
            .collect();
        names.sort_unstable();
        names
    }

    /// Link to an object in the web UI.
    pub fn app_link(&self, fragment: &str) -> String {
        format!("{}/#{}", self.custom_app_url, fragment)
    }
}

/// Merge every credential source with the provider block.
pub fn resolve(
    config: &ProviderConfig,
    sources: &CredentialSources,
) -> Result<ResolvedConfig, ProviderError> {
    let mut token = None;
    let mut api_url = None;
    let mut app_url = None;

    for path in [&sources.system_config, &sources.user_config].into_iter().flatten() {
        if let Some(file) = CredentialFile::load(path)? {
            debug!(path = %path.display(), "Loaded credentials file");
            token = file.auth_token.or(token);
            api_url = file.api_url.or(api_url);
            app_url = file.custom_app_url.or(app_url);
        }
    }

    // The netrc lookup is keyed by the API host, so settle the URL first.
    let effective_api_url = config
        .api_url
        .clone()
        .or_else(|| sources.env_var(ENV_API_URL))
        .or(api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let effective_api_url = effective_api_url.trim_end_matches('/').to_string();

    if let Some(netrc_path) = &sources.netrc {
        if let Some(password) = netrc_token(netrc_path, &effective_api_url)? {
            debug!(path = %netrc_path.display(), "Loaded token from netrc");
            token = Some(password);
        }
    }

    let token = config
        .auth_token
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| sources.env_var(ENV_AUTH_TOKEN))
        .or(token);

    let custom_app_url = config
        .custom_app_url
        .clone()
        .or_else(|| sources.env_var(ENV_CUSTOM_APP_URL))
        .or(app_url)
        .unwrap_or_else(|| DEFAULT_CUSTOM_APP_URL.to_string());

    let seconds = |v: Option<i64>, default: i64| Duration::from_secs(v.unwrap_or(default).max(0) as u64);
    let retry = RetryPolicy::new(
        config.retry_max_attempts.unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS).max(1) as u32,
        seconds(config.retry_wait_min_seconds, DEFAULT_RETRY_WAIT_MIN_SECONDS),
        seconds(config.retry_wait_max_seconds, DEFAULT_RETRY_WAIT_MAX_SECONDS),
    );

    Ok(ResolvedConfig {
        auth_token: token,
        api_url: effective_api_url,
        custom_app_url: custom_app_url.trim_end_matches('/').to_string(),
        timeout: seconds(config.timeout_seconds, DEFAULT_TIMEOUT_SECONDS),
        retry,
        email: config.email.clone(),
        password: config.password.clone(),
        organization_id: config.organization_id.clone(),
        feature_preview: config.feature_preview.clone(),
    })
}

fn netrc_token(path: &Path, api_url: &str) -> Result<Option<String>, ProviderError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ProviderError::Configuration(format!(
                "Failed to read netrc file {}: {}",
                path.display(),
                e
            )))
        },
    };
    let host = reqwest::Url::parse(api_url)
        .map_err(|e| ProviderError::Configuration(format!("Invalid api_url {}: {}", api_url, e)))?
        .host_str()
        .map(str::to_string)
        .unwrap_or_default();
    Ok(netrc_password(&parse_netrc(&content), &host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_without_any_source() {
        let resolved = resolve(&ProviderConfig::default(), &CredentialSources::none()).unwrap();

        assert!(resolved.auth_token.is_none());
        assert_eq!(resolved.api_url, DEFAULT_API_URL);
        assert_eq!(resolved.custom_app_url, DEFAULT_CUSTOM_APP_URL);
        assert_eq!(resolved.timeout, Duration::from_secs(120));
        assert_eq!(resolved.retry.max_attempts, 4);
    }

    #[test]
    fn precedence_files_then_netrc_then_env_then_block() {
        let dir = tempfile::tempdir().unwrap();
        let system = write_file(
            &dir,
            "system.conf",
            r#"{"auth_token": "system", "api_url": "https://api.eu0.signalfx.com/"}"#,
        );
        let user = write_file(&dir, "user.conf", r#"{"auth_token": "user"}"#);

        let mut sources = CredentialSources {
            system_config: Some(system),
            user_config: Some(user),
            ..Default::default()
        };
        let resolved = resolve(&ProviderConfig::default(), &sources).unwrap();
        assert_eq!(resolved.auth_token.as_deref(), Some("user"));
        assert_eq!(resolved.api_url, "https://api.eu0.signalfx.com");

        sources.netrc = Some(write_file(
            &dir,
            "netrc",
            "machine api.eu0.signalfx.com login me password from-netrc\n",
        ));
        let resolved = resolve(&ProviderConfig::default(), &sources).unwrap();
        assert_eq!(resolved.auth_token.as_deref(), Some("from-netrc"));

        sources.env.insert(ENV_AUTH_TOKEN.to_string(), "from-env".to_string());
        let resolved = resolve(&ProviderConfig::default(), &sources).unwrap();
        assert_eq!(resolved.auth_token.as_deref(), Some("from-env"));

        let block = ProviderConfig {
            auth_token: Some("from-block".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&block, &sources).unwrap();
        assert_eq!(resolved.auth_token.as_deref(), Some("from-block"));
    }

    #[test]
    fn netrc_is_keyed_by_effective_api_host() {
        let dir = tempfile::tempdir().unwrap();
        let sources = CredentialSources {
            netrc: Some(write_file(
                &dir,
                "netrc",
                "machine api.us1.signalfx.com password us1\nmachine api.signalfx.com password us0\n",
            )),
            ..Default::default()
        };
        let block = ProviderConfig {
            api_url: Some("https://api.us1.signalfx.com".to_string()),
            ..Default::default()
        };

        let resolved = resolve(&block, &sources).unwrap();
        assert_eq!(resolved.auth_token.as_deref(), Some("us1"));
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sources = CredentialSources {
            user_config: Some(write_file(&dir, "bad.conf", "{not json")),
            ..Default::default()
        };

        let err = resolve(&ProviderConfig::default(), &sources).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn missing_files_are_skipped() {
        let sources = CredentialSources {
            system_config: Some(PathBuf::from("/nonexistent/signalfx.conf")),
            netrc: Some(PathBuf::from("/nonexistent/.netrc")),
            ..Default::default()
        };
        assert!(resolve(&ProviderConfig::default(), &sources).is_ok());
    }

    #[test]
    fn parse_netrc_handles_default_and_macdef() {
        let entries = parse_netrc(
            "# comment\nmachine a.example.com\n  login alice\n  password secret\n\
             macdef init\ncd /tmp\nput file\n\ndefault login anon password fallback\n",
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].machine.as_deref(), Some("a.example.com"));
        assert_eq!(entries[0].login.as_deref(), Some("alice"));
        assert_eq!(netrc_password(&entries, "a.example.com").as_deref(), Some("secret"));
        assert_eq!(netrc_password(&entries, "other.example.com").as_deref(), Some("fallback"));
    }

    #[test]
    fn config_checks() {
        let config = ProviderConfig {
            retry_wait_min_seconds: Some(10),
            retry_wait_max_seconds: Some(5),
            email: Some("ops@example.com".to_string()),
            ..Default::default()
        };

        let diagnostics = config.check();
        let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(paths, vec!["retry_wait_min_seconds", "password"]);
    }

    #[test]
    fn debug_output_redacts_token() {
        let block = ProviderConfig {
            auth_token: Some("super-secret".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&block, &CredentialSources::none()).unwrap();
        let rendered = format!("{:?}", resolved);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn app_link() {
        let block = ProviderConfig {
            custom_app_url: Some("https://myorg.signalfx.com/".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&block, &CredentialSources::none()).unwrap();
        assert_eq!(resolved.app_link("/dashboard/D1"), "https://myorg.signalfx.com/#/dashboard/D1");
    }

    #[test]
    fn feature_preview_flags() {
        let block = ProviderConfig::from_value(&serde_json::json!({
            "feature_preview": {"detector.v2": true, "chart.legacy": false}
        }))
        .unwrap();
        let resolved = resolve(&block, &CredentialSources::none()).unwrap();
        assert_eq!(resolved.enabled_features(), vec!["detector.v2"]);
        assert!(resolve(&ProviderConfig::default(), &CredentialSources::none())
            .unwrap()
            .enabled_features()
            .is_empty());
    }
}
