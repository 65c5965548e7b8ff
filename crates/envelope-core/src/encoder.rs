//! Content encoding capability.
//!
//! Response bodies travel as base64 text. The encoding is a capability rather
//! than a hard-wired call so that hosts can substitute their own
//! implementation (for instance one that counts or traces invocations).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::CoreResult;

/// Converts raw content into its transport text representation.
///
/// Implementations must map empty content to the empty string.
pub trait ContentEncoder: Send + Sync {
    /// Encode raw content.
    fn encode(&self, content: &[u8]) -> String;
}

/// Standard (padded) base64 encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Encoder;

impl Base64Encoder {
    /// Decode base64 text back into raw bytes.
    pub fn decode(&self, encoded: &str) -> CoreResult<Vec<u8>> {
        Ok(BASE64.decode(encoded)?)
    }
}

impl ContentEncoder for Base64Encoder {
    fn encode(&self, content: &[u8]) -> String {
        BASE64.encode(content)
    }
}
