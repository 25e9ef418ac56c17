// ISAPI client and request dispatcher
//
// Owns the negotiated session, hands out `Resource` paths, and routes each
// invoked request to one of three strategies: buffered, opaque stream, or
// multipart event stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Method;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::auth::{AuthMethod, Credentials};
use crate::error::Error;
use crate::multipart;
use crate::path::{EndpointPath, Resource};
use crate::request::{Present, Reply, RequestOptions, ResponseMode};
use crate::session::{Session, cancellable};
use crate::transport::{TlsMode, TransportConfig};
use crate::value::Value;

pub const DEFAULT_API_PREFIX: &str = "ISAPI";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_EVENT_COUNT: usize = 1;

/// Everything needed to connect to one device.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device root, e.g. `http://192.168.1.64` or `https://dvr.local:8443`.
    pub base_url: Url,
    pub username: String,
    pub password: SecretString,
    pub timeout: Duration,
    /// First path segment of every request.
    pub api_prefix: String,
    /// Event quota for multipart stream requests.
    pub event_count: usize,
    pub tls: TlsMode,
}

impl ClientConfig {
    pub fn new(base_url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            base_url,
            username: username.into(),
            password,
            timeout: DEFAULT_TIMEOUT,
            api_prefix: DEFAULT_API_PREFIX.into(),
            event_count: DEFAULT_EVENT_COUNT,
            tls: TlsMode::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_event_count(mut self, count: usize) -> Self {
        self.event_count = count;
        self
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            cookie_jar: None,
        }
        .with_cookie_jar()
    }
}

/// Client for a device's ISAPI-style management API.
///
/// Construction negotiates authentication; a client that exists always has
/// a bound session. Endpoints are addressed with [`path`](Self::path) /
/// [`resource`](Self::resource) rather than per-endpoint methods:
///
/// ```rust,ignore
/// let client = IsapiClient::connect(config).await?;
/// let info = client
///     .resource(["System", "deviceInfo"])
///     .invoke(RequestOptions::get())
///     .await?;
/// ```
#[derive(Debug)]
pub struct IsapiClient {
    session: Session,
    event_count: AtomicUsize,
    cancel: CancellationToken,
}

impl IsapiClient {
    /// Negotiate a session with the device.
    ///
    /// Fails with [`Error::AuthenticationFailed`] when no auth method is
    /// accepted; no client is returned in that case.
    pub async fn connect(config: ClientConfig) -> Result<Self, Error> {
        Self::connect_with_cancel(config, CancellationToken::new()).await
    }

    /// Like [`connect`](Self::connect), with a caller-owned cancellation
    /// token that also governs every later request.
    pub async fn connect_with_cancel(
        config: ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = config.transport();

        debug!(base_url = %config.base_url, "negotiating session");
        let session = Session::negotiate(
            config.base_url,
            config.api_prefix,
            &credentials,
            &transport,
            &cancel,
        )
        .await?;

        Ok(Self {
            session,
            event_count: AtomicUsize::new(config.event_count.max(1)),
            cancel,
        })
    }

    // ── Path building ────────────────────────────────────────────────

    /// Start a path at `segment`.
    pub fn path(&self, segment: impl Into<String>) -> Resource<'_> {
        Resource::new(self, EndpointPath::new().append(segment))
    }

    /// A path made of all `segments` in order.
    pub fn resource<I, S>(&self, segments: I) -> Resource<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Resource::new(self, segments.into_iter().collect())
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The auth method negotiation bound.
    pub fn auth_method(&self) -> AuthMethod {
        self.session.auth_method()
    }

    pub fn base_url(&self) -> &Url {
        self.session.base_url()
    }

    pub fn api_prefix(&self) -> &str {
        self.session.api_prefix()
    }

    /// Events a stream request collects before returning.
    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }

    /// Change the event quota. Zero is treated as one.
    pub fn set_event_count(&self, count: usize) {
        self.event_count.store(count.max(1), Ordering::Relaxed);
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every in-flight and future request on this client.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Execute one request against `path`.
    ///
    /// The response mode is honoured only for GET; anything else, or GET
    /// without a mode, is buffered.
    pub async fn request(
        &self,
        path: &EndpointPath,
        options: RequestOptions,
    ) -> Result<Reply, Error> {
        let method = options.method.clone().ok_or_else(|| Error::InvalidRequest {
            message: "an HTTP method is required".into(),
        })?;
        let url = self.session.url_for(path, &options.query)?;

        match options.mode.filter(|_| method == Method::GET) {
            Some(ResponseMode::Stream) => self.stream_request(&method, &url, &options).await,
            Some(ResponseMode::OpaqueData) => self.opaque_request(&method, &url, &options).await,
            None => self.buffered_request(&method, &url, &options).await,
        }
    }

    async fn buffered_request(
        &self,
        method: &Method,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<Reply, Error> {
        let resp = self
            .session
            .send(method, url, options, Some(self.session.timeout()), &self.cancel)
            .await?;

        let status = resp.status();
        let body = cancellable(&self.cancel, async {
            resp.text().await.map_err(Error::Transport)
        })
        .await?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        match options.present {
            Present::Dict => Value::from_xml(&body).map(Reply::Document),
            Present::Text => Ok(Reply::Text(body)),
        }
    }

    async fn opaque_request(
        &self,
        method: &Method,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<Reply, Error> {
        let resp = self
            .session
            .send(method, url, options, None, &self.cancel)
            .await?;
        Ok(Reply::Opaque(resp))
    }

    async fn stream_request(
        &self,
        method: &Method,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<Reply, Error> {
        let resp = self
            .session
            .send(method, url, options, None, &self.cancel)
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = cancellable(&self.cancel, async {
                resp.text().await.map_err(Error::Transport)
            })
            .await?;
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let quota = self.event_count();
        debug!(quota, "reading multipart event stream");
        let events = multipart::collect_events(resp.bytes_stream(), quota, &self.cancel).await?;
        Ok(Reply::Events(events))
    }
}
