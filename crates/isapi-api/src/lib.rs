// isapi-api: Async Rust client for ISAPI-style device management APIs

pub mod auth;
pub mod client;
pub mod error;
pub mod multipart;
pub mod path;
pub mod request;
pub mod session;
pub mod transport;
pub mod value;

pub use auth::{AuthMethod, Credentials};
pub use client::{ClientConfig, IsapiClient};
pub use error::Error;
pub use path::{EndpointPath, Resource};
pub use request::{Present, Reply, RequestOptions, ResponseMode};
pub use session::Session;
pub use transport::{TlsMode, TransportConfig};
pub use value::Value;

// Re-exported so callers can name methods, headers and transport errors
// without a direct reqwest dependency.
pub use reqwest::{self, Method, header};
