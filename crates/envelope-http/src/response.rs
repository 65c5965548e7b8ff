//! The response envelope.
//!
//! An [`HttpResponse`] is what a handler hands back to the serverless host:
//! a status code, an ordered list of headers, and a base64-encoded body.
//! Serialized to JSON the keys always appear as `statusCode`, `headers`,
//! `body`:
//!
//! ```json
//! {"statusCode":200,"headers":[],"body":"Ym9keQ=="}
//! ```

use bytes::Bytes;
use envelope_core::{Base64Encoder, ContentEncoder, CoreResult};
use serde::{Deserialize, Serialize};

use crate::headers::{HeaderInput, HeaderPair};

/// Status code used when none (or zero) is given.
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Raw response content, prior to encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Content(Bytes);

impl Content {
    /// Empty content.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether there is no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&[u8]> for Content {
    fn from(b: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self {
        Self(Bytes::from(b))
    }
}

impl From<Bytes> for Content {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl From<()> for Content {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl<T: Into<Content>> From<Option<T>> for Content {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::empty, Into::into)
    }
}

/// Configuration form of the response constructor.
///
/// Every field is optional and defaulted independently.
#[derive(Debug, Clone, Default)]
pub struct ResponseParts {
    /// Status code; `None` and `Some(0)` mean 200.
    pub status_code: Option<u16>,
    /// Headers; defaults to none.
    pub headers: HeaderInput,
    /// Body content; defaults to empty.
    pub body: Content,
}

impl ResponseParts {
    /// Set the status code.
    #[must_use]
    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the headers.
    #[must_use]
    pub fn headers(mut self, headers: impl Into<HeaderInput>) -> Self {
        self.headers = headers.into();
        self
    }

    /// Set the body content.
    #[must_use]
    pub fn body(mut self, body: impl Into<Content>) -> Self {
        self.body = body.into();
        self
    }
}

/// Normalized HTTP response envelope.
///
/// Immutable once built: headers are normalized and the body encoded during
/// construction and never touched again. Reading an envelope back from JSON
/// takes the body as already encoded and applies the same status default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    #[serde(
        default = "default_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    status_code: u16,
    headers: Vec<HeaderPair>,
    body: String,
}

impl HttpResponse {
    /// Positional constructor using the standard base64 encoder.
    #[must_use]
    pub fn new(
        status_code: u16,
        headers: impl Into<HeaderInput>,
        body: impl Into<Content>,
    ) -> Self {
        Self::from_parts(ResponseParts {
            status_code: Some(status_code),
            headers: headers.into(),
            body: body.into(),
        })
    }

    /// Configuration-form constructor using the standard base64 encoder.
    #[must_use]
    pub fn from_parts(parts: ResponseParts) -> Self {
        Self::encoded_with(parts, &Base64Encoder)
    }

    /// Build a response, encoding the body with `encoder`.
    #[must_use]
    pub fn encoded_with(parts: ResponseParts, encoder: &dyn ContentEncoder) -> Self {
        Self {
            status_code: resolve_status_code(parts.status_code),
            headers: parts.headers.normalize(),
            body: encoder.encode(parts.body.as_bytes()),
        }
    }

    /// The status code.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// The normalized headers, in order.
    #[must_use]
    pub fn headers(&self) -> &[HeaderPair] {
        &self.headers
    }

    /// The encoded body text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// First header value with the given name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// Decode a standard base64 body back into raw bytes.
    pub fn decoded_body(&self) -> CoreResult<Vec<u8>> {
        Base64Encoder.decode(&self.body)
    }

    /// Whether the status code is in the 4xx or 5xx range.
    #[must_use]
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.status_code)
    }
}

fn resolve_status_code(status_code: Option<u16>) -> u16 {
    match status_code {
        None | Some(0) => DEFAULT_STATUS_CODE,
        Some(code) => code,
    }
}

fn default_status_code() -> u16 {
    DEFAULT_STATUS_CODE
}

fn deserialize_status_code<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<u16, D::Error> {
    Ok(resolve_status_code(Option::<u16>::deserialize(deserializer)?))
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::from_parts(ResponseParts::default())
    }
}
