// Resource path building
//
// The device API surface is large and firmware-dependent, so endpoints are
// not enumerated as methods. Callers chain segments onto a path and finish
// with `invoke`.

use std::fmt;

use crate::client::IsapiClient;
use crate::error::Error;
use crate::request::{Reply, RequestOptions};

/// An ordered list of path segments below the API root.
///
/// `append` never mutates: each call returns a new path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EndpointPath {
    segments: Vec<String>,
}

impl EndpointPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new path with `segment` added to the end.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Join with the API root: `ISAPI/System/status`.
    pub fn with_prefix(&self, prefix: &str) -> String {
        std::iter::once(prefix)
            .chain(self.segments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl<S: Into<String>> FromIterator<S> for EndpointPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// A path bound to a client, ready to be invoked.
///
/// ```rust,ignore
/// let status = client.path("System").append("status").invoke(RequestOptions::get()).await?;
/// let channel = client.path("Streaming").append("channels").index(101);
/// ```
#[derive(Clone)]
pub struct Resource<'c> {
    client: &'c IsapiClient,
    path: EndpointPath,
}

impl<'c> Resource<'c> {
    pub(crate) fn new(client: &'c IsapiClient, path: EndpointPath) -> Self {
        Self { client, path }
    }

    /// A new resource one segment deeper.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        Self {
            client: self.client,
            path: self.path.append(segment),
        }
    }

    /// Index-style access: appends the display form of `item`.
    pub fn index(&self, item: impl fmt::Display) -> Self {
        self.append(item.to_string())
    }

    pub fn path(&self) -> &EndpointPath {
        &self.path
    }

    /// Dispatch a request against this path.
    ///
    /// Fails with [`Error::InvalidRequest`] if `options` carries no method.
    pub async fn invoke(&self, options: RequestOptions) -> Result<Reply, Error> {
        self.client.request(&self.path, options).await
    }
}

impl fmt::Debug for Resource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("base_url", &self.client.base_url().as_str())
            .field("path", &self.path.with_prefix(self.client.api_prefix()))
            .finish()
    }
}

impl fmt::Display for Resource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Resource path={}>",
            self.path.with_prefix(self.client.api_prefix())
        )
    }
}
