// Authentication methods and credential encoding
//
// A device accepts one of three encodings. Negotiation (see `session`)
// walks them in priority order; this module only knows how to attach
// credentials to an outbound request for a given method.

use std::sync::Mutex;

use digest_auth::{AuthContext, HttpMethod, WwwAuthenticateHeader};
use reqwest::header::{AUTHORIZATION, HeaderMap, WWW_AUTHENTICATE};
use secrecy::{ExposeSecret, SecretString};
use tracing::trace;
use url::Url;

use crate::error::Error;

/// How credentials are attached to an outbound request.
///
/// Ordering matters: [`AuthMethod::PRIORITY`] is the order negotiation
/// tries them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum AuthMethod {
    /// RFC 7616 digest challenge-response.
    Digest,
    /// RFC 7617 `Authorization: Basic <base64>`.
    Basic,
    /// Standard Basic plus a second `Authorization` field carrying
    /// `Basic <login>:<password>` in cleartext.
    ///
    /// Devices that answer 200 regardless of header content will be
    /// detected as accepting this mode; that is a known limitation.
    BasicWithHeader,
}

impl AuthMethod {
    /// Negotiation order.
    pub const PRIORITY: [Self; 3] = [Self::Digest, Self::Basic, Self::BasicWithHeader];
}

/// Login and password for a device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Per-session authenticator: a bound method plus whatever state that
/// method carries between requests (the digest prompt and nonce count).
#[derive(Debug)]
pub(crate) struct Authenticator {
    method: AuthMethod,
    credentials: Credentials,
    digest_prompt: Mutex<Option<WwwAuthenticateHeader>>,
}

impl Authenticator {
    pub(crate) fn new(method: AuthMethod, credentials: Credentials) -> Self {
        Self {
            method,
            credentials,
            digest_prompt: Mutex::new(None),
        }
    }

    pub(crate) fn method(&self) -> AuthMethod {
        self.method
    }

    /// Attach credentials to a request.
    ///
    /// For digest this is a no-op until a challenge has been seen; after
    /// that the cached prompt is answered preemptively.
    pub(crate) fn apply(
        &self,
        builder: reqwest::RequestBuilder,
        method: &reqwest::Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let username = self.credentials.username.as_str();
        let password = self.credentials.password.expose_secret();

        let builder = match self.method {
            AuthMethod::Digest => match self.digest_response(method, url, body)? {
                Some(header) => builder.header(AUTHORIZATION, header),
                None => builder,
            },
            AuthMethod::Basic => builder.basic_auth(username, Some(password)),
            AuthMethod::BasicWithHeader => builder
                .basic_auth(username, Some(password))
                .header(AUTHORIZATION, format!("Basic {username}:{password}")),
        };
        Ok(builder)
    }

    /// Remember a digest challenge from a 401 response.
    ///
    /// Returns `false` when the method is not digest or the response
    /// carries no digest challenge, in which case there is nothing to retry.
    pub(crate) fn accept_challenge(&self, headers: &HeaderMap) -> Result<bool, Error> {
        if self.method != AuthMethod::Digest {
            return Ok(false);
        }

        let Some(challenge) = headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.trim_start().to_ascii_lowercase().starts_with("digest"))
        else {
            return Ok(false);
        };

        let prompt = digest_auth::parse(challenge).map_err(|e| Error::Digest(e.to_string()))?;
        trace!("stored digest challenge");
        *self.digest_prompt.lock().expect("digest lock poisoned") = Some(prompt);
        Ok(true)
    }

    fn digest_response(
        &self,
        method: &reqwest::Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<Option<String>, Error> {
        let mut guard = self.digest_prompt.lock().expect("digest lock poisoned");
        let Some(prompt) = guard.as_mut() else {
            return Ok(None);
        };

        let uri = request_uri(url);
        let context = AuthContext::new_with_method(
            self.credentials.username.as_str(),
            self.credentials.password.expose_secret(),
            uri.as_str(),
            body,
            HttpMethod::from(method.as_str()),
        );

        let answer = prompt
            .respond(&context)
            .map_err(|e| Error::Digest(e.to_string()))?;
        Ok(Some(answer.to_header_string()))
    }
}

/// The request-target a digest response is computed over: path plus query.
fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_owned(),
    }
}
