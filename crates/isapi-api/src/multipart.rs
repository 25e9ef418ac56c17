//! Multipart event stream parsing.
//!
//! Devices push events as a never-ending `multipart/mixed` body. Parts are
//! delimited by the literal token `--boundary`; the `Content-Type` boundary
//! parameter is not consulted. Each part is a small header block, a blank
//! line, and one XML document:
//!
//! ```text
//! --boundary\r\n
//! Content-Type: application/xml; charset="UTF-8"\r\n
//! Content-Length: 480\r\n
//! \r\n
//! <EventNotificationAlert>...</EventNotificationAlert>\r\n
//! --boundary\r\n
//! ...
//! ```
//!
//! [`collect_events`] reads until it has `quota` documents and then stops,
//! leaving the rest of the stream unread. If the stream ends first it
//! returns what it has, possibly nothing.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Error;
use crate::value::Value;

/// Literal part delimiter.
pub const BOUNDARY: &[u8] = b"--boundary";

/// Largest part buffered while waiting for the next delimiter.
pub const MAX_PART_LEN: usize = 1024 * 1024;

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Splits a byte stream into the raw parts between [`BOUNDARY`] tokens.
///
/// Bytes are buffered until a delimiter completes, so tokens split across
/// network chunks are still found. A part that grows past [`MAX_PART_LEN`]
/// without a delimiter is rejected; the body is probably not multipart.
#[derive(Debug, Default)]
pub struct PartSplitter {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known not to start a delimiter.
    scanned: usize,
}

impl PartSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every part completed by them.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>, Error> {
        self.buffer.extend_from_slice(data);

        let mut parts = Vec::new();
        while let Some(pos) = find(&self.buffer[self.scanned..], BOUNDARY) {
            let end = self.scanned + pos;
            let part = self.buffer.split_to(end).freeze();
            let _ = self.buffer.split_to(BOUNDARY.len());
            self.scanned = 0;
            if !part.is_empty() {
                parts.push(part);
            }
        }

        if self.buffer.len() > MAX_PART_LEN {
            let head = String::from_utf8_lossy(&self.buffer[..256]).into_owned();
            self.buffer.clear();
            self.scanned = 0;
            return Err(Error::parse(
                format!("no multipart delimiter within {MAX_PART_LEN} bytes"),
                &head,
            ));
        }

        self.scanned = self.buffer.len().saturating_sub(BOUNDARY.len() - 1);
        Ok(parts)
    }

    /// Flush whatever followed the last delimiter once the stream has ended.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        let rest = self.buffer.split().freeze();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Extract the XML document from one raw part.
///
/// Returns `Ok(None)` for parts with no header separator (keep-alives,
/// the closing `--` of the final delimiter) and for parts whose payload is
/// blank. The payload runs from the first blank line up to the next one
/// or the end of the part.
pub fn extract_payload(part: &[u8]) -> Result<Option<String>, Error> {
    let Some(start) = find(part, HEADER_SEPARATOR) else {
        return Ok(None);
    };
    let payload = &part[start + HEADER_SEPARATOR.len()..];
    let payload = match find(payload, HEADER_SEPARATOR) {
        Some(end) => &payload[..end],
        None => payload,
    };

    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::parse(e, &String::from_utf8_lossy(payload)))?
        .trim();

    Ok((!text.is_empty()).then(|| text.to_owned()))
}

/// Read parts from `stream` until `quota` documents are collected or the
/// stream ends, then convert each to a [`Value`].
///
/// A `quota` of zero is treated as one.
pub async fn collect_events<S, E>(
    stream: S,
    quota: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Value>, Error>
where
    S: Stream<Item = Result<Bytes, E>>,
    Error: From<E>,
{
    let quota = quota.max(1);
    let mut stream = std::pin::pin!(stream);
    let mut splitter = PartSplitter::new();
    let mut documents = Vec::with_capacity(quota);

    while documents.len() < quota {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            next = stream.next() => next,
        };

        let Some(chunk) = next else {
            if let Some(part) = splitter.finish() {
                if let Some(document) = extract_payload(&part)? {
                    documents.push(document);
                }
            }
            trace!(received = documents.len(), quota, "event stream closed early");
            break;
        };

        for part in splitter.push(&chunk?)? {
            if let Some(document) = extract_payload(&part)? {
                trace!(index = documents.len(), "multipart event received");
                documents.push(document);
                if documents.len() == quota {
                    break;
                }
            }
        }
    }

    documents.iter().map(|doc| Value::from_xml(doc)).collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
