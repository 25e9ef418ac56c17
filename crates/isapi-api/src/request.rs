// Request descriptors and replies
//
// `RequestOptions` is what a caller hands to `Resource::invoke`; `Reply`
// is what comes back, shaped by the strategy the dispatcher picked.

use std::str::FromStr;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;
use crate::value::Value;

/// How the response of a GET should be handled.
///
/// Only consulted for GET; every other method is buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ResponseMode {
    /// Multipart event stream, parsed into [`Value`]s up to the event quota.
    #[strum(to_string = "stream")]
    Stream,
    /// Hand the live, unread response to the caller.
    #[strum(to_string = "opaque_data", serialize = "opaque-data")]
    OpaqueData,
}

/// How a buffered body is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Present {
    /// Parse the body as XML into a [`Value`].
    #[default]
    Dict,
    /// Return the body text untouched.
    Text,
}

/// Everything about one call except the path.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Required; dispatch fails with [`Error::InvalidRequest`] without it.
    pub method: Option<Method>,
    pub mode: Option<ResponseMode>,
    pub present: Present,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn mode(mut self, mode: ResponseMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Shorthand for `mode(ResponseMode::Stream)`.
    pub fn stream(self) -> Self {
        self.mode(ResponseMode::Stream)
    }

    /// Shorthand for `mode(ResponseMode::OpaqueData)`.
    pub fn opaque(self) -> Self {
        self.mode(ResponseMode::OpaqueData)
    }

    pub fn present(mut self, present: Present) -> Self {
        self.present = present;
        self
    }

    /// Shorthand for `present(Present::Text)`.
    pub fn text(self) -> Self {
        self.present(Present::Text)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Build options from loose `key = value` pairs.
    ///
    /// Recognised keys: `method`, `type`, `present`, `body` (alias `data`).
    /// Anything else is passed through as a query parameter. An unknown
    /// `type` falls back to a buffered request; any `present` other than
    /// `dict` returns text. A missing `method` is not rejected here but at
    /// dispatch time.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut options = Self::default();

        for (key, value) in pairs {
            let value = value.into();
            match key.as_ref() {
                "method" => {
                    let method = Method::from_str(&value.to_ascii_uppercase()).map_err(|_| {
                        Error::InvalidRequest {
                            message: format!("invalid HTTP method '{value}'"),
                        }
                    })?;
                    options.method = Some(method);
                }
                "type" => options.mode = ResponseMode::from_str(&value).ok(),
                "present" => {
                    options.present = Present::from_str(&value).unwrap_or(Present::Text);
                }
                "body" | "data" => options.body = Some(Bytes::from(value)),
                other => options.query.push((other.to_owned(), value)),
            }
        }

        Ok(options)
    }
}

/// The result of one dispatched request.
#[derive(Debug)]
pub enum Reply {
    /// Buffered body converted from XML.
    Document(Value),
    /// Buffered body as text.
    Text(String),
    /// Event records from a multipart stream, in arrival order.
    Events(Vec<Value>),
    /// Live response, body not yet read.
    Opaque(reqwest::Response),
}

impl Reply {
    pub fn as_document(&self) -> Option<&Value> {
        match self {
            Self::Document(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Value> {
        match self {
            Self::Document(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<Vec<Value>> {
        match self {
            Self::Events(events) => Some(events),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<reqwest::Response> {
        match self {
            Self::Opaque(response) => Some(response),
            _ => None,
        }
    }
}
