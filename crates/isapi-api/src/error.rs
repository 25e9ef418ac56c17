use thiserror::Error;

/// Top-level error type for the `isapi-api` crate.
///
/// Covers every failure mode of a client's lifetime: request shape,
/// authentication negotiation, transport, device responses, and payload
/// conversion. The `isapi` binary maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Request shape ───────────────────────────────────────────────
    /// The call was malformed (no HTTP method, unparseable option value).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Every auth method was rejected or unreachable during negotiation.
    #[error("All authentication methods failed -- last error: {last_error}")]
    AuthenticationFailed {
        #[source]
        last_error: Box<Error>,
    },

    /// The device sent a digest challenge we could not answer.
    #[error("Digest authentication error: {0}")]
    Digest(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, timeout, body read failure).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be built (CA file, TLS backend).
    #[error("TLS error: {0}")]
    Tls(String),

    /// The client's cancellation token fired while a call was in flight.
    #[error("Request cancelled")]
    Cancelled,

    // ── Device responses ────────────────────────────────────────────
    /// A buffered request came back with a non-success status.
    #[error("Device returned HTTP {status}")]
    HttpStatus { status: u16, body: String },

    /// A payload was not valid UTF-8 or not well-formed XML.
    #[error("Parse error: {message}")]
    Parse { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The HTTP status behind this error, if there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::AuthenticationFailed { last_error } => last_error.status(),
            _ => None,
        }
    }

    pub(crate) fn parse(message: impl std::fmt::Display, body: &str) -> Self {
        Self::Parse {
            message: message.to_string(),
            body: body.to_owned(),
        }
    }
}
