// Session negotiation and authenticated request sending
//
// A session is created once per client: the negotiator probes the status
// endpoint with each auth method in priority order and binds the first one
// the device answers 200 to. After that every request reuses the bound
// method and the same reqwest client (cookies, keep-alive).

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{AuthMethod, Authenticator, Credentials};
use crate::error::Error;
use crate::path::EndpointPath;
use crate::request::RequestOptions;
use crate::transport::TransportConfig;

/// Path probed during negotiation, below the API root.
pub const STATUS_PROBE: [&str; 2] = ["System", "status"];

/// Negotiated authentication and transport state for one client.
#[derive(Debug)]
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    api_prefix: String,
    timeout: Duration,
    auth: Authenticator,
}

impl Session {
    /// Probe the device with each [`AuthMethod`] in priority order and bind
    /// the first that gets a 200.
    ///
    /// Network failures and non-200 statuses are both recorded and the
    /// next method is tried. If every method fails the last recorded error
    /// is returned inside [`Error::AuthenticationFailed`].
    pub async fn negotiate(
        base_url: Url,
        api_prefix: String,
        credentials: &Credentials,
        transport: &TransportConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        let probe: EndpointPath = STATUS_PROBE.into_iter().collect();

        let mut last_error = None;
        for method in AuthMethod::PRIORITY {
            let candidate = Self {
                http: http.clone(),
                base_url: base_url.clone(),
                api_prefix: api_prefix.clone(),
                timeout: config.timeout,
                auth: Authenticator::new(method, credentials.clone()),
            };

            debug!(%method, "trying authentication method");
            match candidate.probe(&probe, cancel).await {
                Ok(()) => {
                    info!(%method, "authentication method bound");
                    return Ok(candidate);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(%method, error = %e, "authentication method rejected");
                    last_error = Some(e);
                }
            }
        }

        Err(Error::AuthenticationFailed {
            last_error: Box::new(last_error.unwrap_or_else(|| Error::InvalidRequest {
                message: "no authentication methods to try".into(),
            })),
        })
    }

    async fn probe(&self, probe: &EndpointPath, cancel: &CancellationToken) -> Result<(), Error> {
        let url = self.url_for(probe, &[])?;
        let options = RequestOptions::get();
        let resp = self
            .send(&reqwest::Method::GET, &url, &options, Some(self.timeout), cancel)
            .await?;

        let status = resp.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body =
            cancellable(cancel, async { resp.text().await.map_err(Error::Transport) }).await?;
        Err(Error::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }

    /// The bound auth method.
    pub fn auth_method(&self) -> AuthMethod {
        self.auth.method()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Resolve `{api_prefix}/{segments...}` against the base URL and append
    /// the query pairs.
    pub(crate) fn url_for(
        &self,
        path: &EndpointPath,
        query: &[(String, String)],
    ) -> Result<Url, Error> {
        let mut url = self.base_url.join(&path.with_prefix(&self.api_prefix))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send one authenticated request.
    ///
    /// `deadline` bounds the whole exchange; `None` leaves only the
    /// transport's connect and per-read timeouts in force. Under digest
    /// auth a 401 carrying a fresh challenge is answered once.
    pub(crate) async fn send(
        &self,
        method: &reqwest::Method,
        url: &Url,
        options: &RequestOptions,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        debug!("{method} {url}");

        let resp = self.send_once(method, url, options, deadline, cancel).await?;
        if resp.status() != StatusCode::UNAUTHORIZED
            || !self.auth.accept_challenge(resp.headers())?
        {
            return Ok(resp);
        }

        debug!("answering digest challenge");
        self.send_once(method, url, options, deadline, cancel).await
    }

    async fn send_once(
        &self,
        method: &reqwest::Method,
        url: &Url,
        options: &RequestOptions,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .headers(options.headers.clone());
        if let Some(ref body) = options.body {
            builder = builder.body(body.clone());
        }
        if let Some(deadline) = deadline {
            builder = builder.timeout(deadline);
        }
        let builder = self
            .auth
            .apply(builder, method, url, options.body.as_deref())?;

        cancellable(cancel, async { builder.send().await.map_err(Error::Transport) }).await
    }
}

/// Race `fut` against the cancellation token.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
