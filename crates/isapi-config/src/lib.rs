//! Shared configuration for ISAPI tools.
//!
//! TOML device profiles, credential resolution (env + keyring + plaintext),
//! and translation to `isapi_api::ClientConfig`. The CLI layers its global
//! flags on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use isapi_api::client::{DEFAULT_API_PREFIX, DEFAULT_EVENT_COUNT, DEFAULT_TIMEOUT};
use isapi_api::{ClientConfig, TlsMode};

/// Keyring service name; entries are keyed by profile name.
pub const KEYRING_SERVICE: &str = "isapi";

/// Environment variable consulted for the password of any profile.
pub const PASSWORD_ENV: &str = "ISAPI_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept self-signed device certificates.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_event_count")]
    pub event_count: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            insecure: default_insecure(),
            api_prefix: default_api_prefix(),
            event_count: default_event_count(),
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
fn default_insecure() -> bool {
    true
}
fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.into()
}
fn default_event_count() -> usize {
    DEFAULT_EVENT_COUNT
}

/// A named device profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Device address: `192.168.1.64`, `http://nvr.local` or `https://dvr:8443`.
    pub host: String,

    pub username: String,

    /// Plaintext password; prefer the keyring or an env var.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Name of an environment variable holding the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_count: Option<usize>,
}

impl Profile {
    /// A profile with only an address and login; everything else inherits.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: None,
            password_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            api_prefix: None,
            event_count: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "isapi", "isapi").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("isapi");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the platform config file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, merged over defaults and under `ISAPI_*`
/// environment variables (`ISAPI_DEFAULTS__TIMEOUT=10`). A missing file
/// is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ISAPI_").split("__"));

    Ok(figment.extract()?)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a profile's password from the credential chain.
///
/// Order: the profile's `password_env` variable, `ISAPI_PASSWORD`, the
/// system keyring entry `isapi/<profile>`, then the plaintext `password`.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_password_with(profile, profile_name, |var| std::env::var(var).ok())
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. Shared env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Parse a profile `host` into a base URL, assuming `http` when no scheme
/// is given.
pub fn parse_host(host: &str) -> Result<Url, ConfigError> {
    let candidate = if host.contains("://") {
        host.to_owned()
    } else {
        format!("http://{host}")
    };
    Url::parse(&candidate).map_err(|e| ConfigError::Validation {
        field: "host".into(),
        reason: format!("invalid URL '{host}': {e}"),
    })
}

/// Pick the TLS mode from a profile's overrides and the global default.
pub fn tls_mode(profile: &Profile, defaults: &Defaults) -> TlsMode {
    match (profile.ca_cert.as_ref(), profile.insecure) {
        (_, Some(true)) => TlsMode::DangerAcceptInvalid,
        (Some(ca), _) => TlsMode::CustomCa(ca.clone()),
        (None, Some(false)) => TlsMode::System,
        (None, None) if defaults.insecure => TlsMode::DangerAcceptInvalid,
        (None, None) => TlsMode::System,
    }
}

/// Per-invocation settings that win over the profile (CLI flags, env).
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub username: Option<String>,
    /// Skips the credential chain entirely when set.
    pub password: Option<SecretString>,
    pub timeout: Option<u64>,
    /// Forces [`TlsMode::DangerAcceptInvalid`].
    pub insecure: bool,
}

/// Build a `ClientConfig` from a profile, its `[defaults]`, and overrides.
///
/// Precedence for every setting: override, then profile, then defaults.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    overrides: &Overrides,
) -> Result<ClientConfig, ConfigError> {
    let base_url = parse_host(overrides.host.as_deref().unwrap_or(&profile.host))?;
    let username = overrides
        .username
        .clone()
        .unwrap_or_else(|| profile.username.clone());
    let password = match overrides.password {
        Some(ref pw) => pw.clone(),
        None => resolve_password(profile, profile_name)?,
    };

    let timeout = overrides
        .timeout
        .or(profile.timeout)
        .unwrap_or(defaults.timeout);
    let api_prefix = profile
        .api_prefix
        .clone()
        .unwrap_or_else(|| defaults.api_prefix.clone());
    let tls = if overrides.insecure {
        TlsMode::DangerAcceptInvalid
    } else {
        tls_mode(profile, defaults)
    };

    Ok(ClientConfig::new(base_url, username, password)
        .with_timeout(Duration::from_secs(timeout))
        .with_api_prefix(api_prefix)
        .with_event_count(profile.event_count.unwrap_or(defaults.event_count))
        .with_tls(tls))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "gate"

[defaults]
timeout = 5

[profiles.gate]
host = "192.168.1.64"
username = "admin"
password = "12345"

[profiles.nvr]
host = "https://nvr.local:8443"
username = "operator"
password_env = "NVR_PASSWORD"
insecure = false
api_prefix = "LAPI/V1.0"
event_count = 4
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    fn profile(host: &str) -> Profile {
        Profile::new(host, "admin")
    }

    #[test]
    fn loads_profiles_over_defaults() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("gate"));
        assert_eq!(config.defaults.timeout, 5);
        assert!(config.defaults.insecure);
        assert_eq!(config.defaults.api_prefix, "ISAPI");
        assert_eq!(config.profiles.len(), 2);

        let (name, gate) = config.profile(None).unwrap();
        assert_eq!(name, "gate");
        assert_eq!(gate.host, "192.168.1.64");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.timeout, 3);
        assert_eq!(config.defaults.event_count, 1);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn unknown_profile_is_reported() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        let err = config.profile(Some("garage")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { ref profile } if profile == "garage"));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("nested").join("config.toml");
        save_config_to(&config, &out).unwrap();

        let reloaded = load_config_from(&out).unwrap();
        let (_, nvr) = reloaded.profile(Some("nvr")).unwrap();
        assert_eq!(nvr.password_env.as_deref(), Some("NVR_PASSWORD"));
        assert_eq!(nvr.event_count, Some(4));
        assert_eq!(reloaded.defaults.timeout, 5);
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        let mut p = profile("10.0.0.2");
        p.password = Some("plain".into());
        p.password_env = Some("CAM_PW".into());

        let env: HashMap<&str, &str> = [("CAM_PW", "from-env"), (PASSWORD_ENV, "shared")].into();
        let pw = resolve_password_with(&p, "isapi-config-test-a", |k| {
            env.get(k).map(ToString::to_string)
        })
        .unwrap();
        assert_eq!(pw.expose_secret(), "from-env");
    }

    #[test]
    fn shared_env_then_plaintext() {
        let mut p = profile("10.0.0.2");
        p.password = Some("plain".into());

        let pw = resolve_password_with(&p, "isapi-config-test-b", |k| {
            (k == PASSWORD_ENV).then(|| "shared".to_owned())
        })
        .unwrap();
        assert_eq!(pw.expose_secret(), "shared");

        let pw = resolve_password_with(&p, "isapi-config-test-b", |_| None).unwrap();
        assert_eq!(pw.expose_secret(), "plain");
    }

    #[test]
    fn no_password_anywhere_is_an_error() {
        let p = profile("10.0.0.2");
        let err = resolve_password_with(&p, "isapi-config-test-c", |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn host_without_scheme_defaults_to_http() {
        assert_eq!(parse_host("192.168.1.64").unwrap().as_str(), "http://192.168.1.64/");
        assert_eq!(
            parse_host("https://dvr.local:8443").unwrap().as_str(),
            "https://dvr.local:8443/"
        );
        assert!(matches!(
            parse_host("http://"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn tls_mode_follows_overrides() {
        let defaults = Defaults::default();
        let mut p = profile("cam");
        assert_eq!(tls_mode(&p, &defaults), TlsMode::DangerAcceptInvalid);

        p.insecure = Some(false);
        assert_eq!(tls_mode(&p, &defaults), TlsMode::System);

        p.ca_cert = Some(PathBuf::from("/etc/isapi/ca.pem"));
        assert_eq!(
            tls_mode(&p, &defaults),
            TlsMode::CustomCa(PathBuf::from("/etc/isapi/ca.pem"))
        );

        p.insecure = Some(true);
        assert_eq!(tls_mode(&p, &defaults), TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn client_config_takes_profile_settings() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        let (name, nvr) = config.profile(Some("nvr")).unwrap();

        let overrides = Overrides {
            password: Some(SecretString::from("pw".to_owned())),
            ..Overrides::default()
        };
        let client = profile_to_client_config(nvr, name, &config.defaults, &overrides).unwrap();
        assert_eq!(client.base_url.as_str(), "https://nvr.local:8443/");
        assert_eq!(client.username, "operator");
        assert_eq!(client.password.expose_secret(), "pw");
        assert_eq!(client.api_prefix, "LAPI/V1.0");
        assert_eq!(client.event_count, 4);
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(client.tls, TlsMode::System);
    }

    #[test]
    fn overrides_win_over_profile() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        let (name, nvr) = config.profile(Some("nvr")).unwrap();

        let overrides = Overrides {
            host: Some("10.0.0.9".into()),
            username: Some("viewer".into()),
            password: Some(SecretString::from("override".to_owned())),
            timeout: Some(2),
            insecure: true,
        };
        let client = profile_to_client_config(nvr, name, &config.defaults, &overrides).unwrap();
        assert_eq!(client.base_url.as_str(), "http://10.0.0.9/");
        assert_eq!(client.username, "viewer");
        assert_eq!(client.password.expose_secret(), "override");
        assert_eq!(client.timeout, Duration::from_secs(2));
        assert_eq!(client.tls, TlsMode::DangerAcceptInvalid);
        // Not overridable per invocation.
        assert_eq!(client.api_prefix, "LAPI/V1.0");
    }
}
