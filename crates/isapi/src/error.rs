//! CLI error types with miette diagnostics.
//!
//! Maps library and config errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use isapi_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(isapi::connection_failed),
        help(
            "Check that the device is powered and reachable.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(isapi::tls_error),
        help("Use --insecure (-k) for self-signed devices, or check ca_cert in your profile.")
    )]
    TlsError { message: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(isapi::timeout),
        help("Increase the timeout with --timeout or check the device's responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: the device rejected digest, basic and basic-with-header")]
    #[diagnostic(
        code(isapi::auth_failed),
        help("Verify the username and password. Last error: {last_error}")
    )]
    AuthFailed { last_error: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(isapi::no_credentials),
        help(
            "Pass --password, set ISAPI_PASSWORD, store it in the system keyring \
             under service 'isapi', or set password_env in the profile."
        )
    )]
    NoCredentials { profile: String },

    // ── Device responses ─────────────────────────────────────────────
    #[error("Device returned HTTP {status}")]
    #[diagnostic(code(isapi::http_status), help("{body}"))]
    DeviceStatus { status: u16, body: String },

    #[error("Could not parse device response: {message}")]
    #[diagnostic(code(isapi::parse), help("Retry with --text to see the raw body."))]
    Parse { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(isapi::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(isapi::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(isapi::no_config),
        help(
            "Pass --host, --username and --password, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(isapi::config))]
    Config(Box<ConfigError>),

    // ── Misc ─────────────────────────────────────────────────────────
    #[error("Interrupted")]
    #[diagnostic(code(isapi::interrupted))]
    Interrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(isapi::serialize))]
    Serialize(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. }
            | Self::NoCredentials { .. }
            | Self::DeviceStatus { status: 401, .. } => exit_code::AUTH,
            Self::DeviceStatus { status: 403, .. } => exit_code::PERMISSION,
            Self::DeviceStatus { status: 404, .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            Self::Interrupted => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<isapi_api::Error> for CliError {
    fn from(err: isapi_api::Error) -> Self {
        use isapi_api::Error as E;

        match err {
            E::AuthenticationFailed { last_error } => match *last_error {
                // Nothing answered at all; report the network problem.
                E::Transport(e) => e.into(),
                E::Tls(message) => Self::TlsError { message },
                other => Self::AuthFailed {
                    last_error: other.to_string(),
                },
            },
            E::Transport(e) => e.into(),
            E::Tls(message) => Self::TlsError { message },
            E::HttpStatus { status, body } => Self::DeviceStatus { status, body },
            E::Parse { message, .. } => Self::Parse { message },
            E::Cancelled => Self::Interrupted,
            E::InvalidUrl(e) => Self::Validation {
                field: "host".into(),
                reason: e.to_string(),
            },
            E::InvalidRequest { message } => Self::Validation {
                field: "request".into(),
                reason: message,
            },
            E::Digest(message) => Self::AuthFailed {
                last_error: message,
            },
        }
    }
}

impl From<isapi_api::reqwest::Error> for CliError {
    fn from(err: isapi_api::reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        Self::ConnectionFailed {
            url: err
                .url()
                .map_or_else(|| "(unknown)".into(), ToString::to_string),
            source: Box::new(err),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}
