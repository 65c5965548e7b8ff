//! Response factories.
//!
//! Each factory fixes a status code and delegates to the response
//! constructor. [`ResponseFactory`] carries the content encoder; the free
//! functions use a shared factory backed by the standard base64 encoder.

use std::fmt;
use std::sync::{Arc, LazyLock};

use envelope_core::{Base64Encoder, ContentEncoder, CoreResult, Library};

use crate::classify::ApiErrorPayload;
use crate::headers::HeaderInput;
use crate::response::{Content, HttpResponse, ResponseParts};

/// Content type attached by [`ok_json`].
pub const APPLICATION_JSON: &str = "application/json";

/// Status code of [`api_error`] when none is given.
pub const DEFAULT_API_ERROR_STATUS: u16 = 400;

static STANDARD: LazyLock<ResponseFactory> = LazyLock::new(ResponseFactory::default);

/// Builds responses with an injected [`ContentEncoder`].
#[derive(Clone)]
pub struct ResponseFactory {
    encoder: Arc<dyn ContentEncoder>,
}

impl ResponseFactory {
    /// Create a factory around an encoder.
    #[must_use]
    pub fn new(encoder: Arc<dyn ContentEncoder>) -> Self {
        Self { encoder }
    }

    /// Create a factory using the `buffer` capability of `library`.
    pub fn from_library(library: &Library) -> CoreResult<Self> {
        Ok(Self::new(library.encoder()?))
    }

    /// The shared factory using the standard base64 encoder.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Build a response from its parts.
    #[must_use]
    pub fn response(&self, parts: ResponseParts) -> HttpResponse {
        HttpResponse::encoded_with(parts, self.encoder.as_ref())
    }

    fn with_status(
        &self,
        status_code: u16,
        headers: HeaderInput,
        body: Content,
    ) -> HttpResponse {
        self.response(ResponseParts {
            status_code: Some(status_code),
            headers,
            body,
        })
    }

    /// 200 OK.
    #[must_use]
    pub fn ok(&self, body: impl Into<Content>, headers: impl Into<HeaderInput>) -> HttpResponse {
        self.with_status(200, headers.into(), body.into())
    }

    /// 200 OK with a JSON body and `Content-Type: application/json`.
    ///
    /// A JSON string is sent verbatim; any other value is serialized first.
    #[must_use]
    pub fn ok_json(&self, body: impl Into<serde_json::Value>) -> HttpResponse {
        let text = match body.into() {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.ok(text, [("Content-Type", APPLICATION_JSON)])
    }

    /// 201 Created.
    #[must_use]
    pub fn created(
        &self,
        body: impl Into<Content>,
        headers: impl Into<HeaderInput>,
    ) -> HttpResponse {
        self.with_status(201, headers.into(), body.into())
    }

    /// 202 Accepted.
    #[must_use]
    pub fn accepted(
        &self,
        body: impl Into<Content>,
        headers: impl Into<HeaderInput>,
    ) -> HttpResponse {
        self.with_status(202, headers.into(), body.into())
    }

    /// 204 No Content.
    #[must_use]
    pub fn no_content(&self, headers: impl Into<HeaderInput>) -> HttpResponse {
        self.with_status(204, headers.into(), Content::empty())
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(&self, body: impl Into<Content>) -> HttpResponse {
        self.with_status(400, HeaderInput::Absent, body.into())
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(&self, body: impl Into<Content>) -> HttpResponse {
        self.with_status(401, HeaderInput::Absent, body.into())
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal_error(&self, body: impl Into<Content>) -> HttpResponse {
        self.with_status(500, HeaderInput::Absent, body.into())
    }

    /// An API error with a JSON `{type, detail, parameters}` body.
    ///
    /// The status defaults to 400.
    #[must_use]
    pub fn api_error(
        &self,
        error_type: impl Into<String>,
        detail: impl Into<String>,
        parameters: Option<serde_json::Value>,
        status_code: Option<u16>,
    ) -> HttpResponse {
        let payload = ApiErrorPayload {
            parameters,
            ..ApiErrorPayload::new(error_type, detail)
        };
        self.with_status(
            status_code.unwrap_or(DEFAULT_API_ERROR_STATUS),
            HeaderInput::Absent,
            payload.to_json().into(),
        )
    }
}

impl Default for ResponseFactory {
    fn default() -> Self {
        Self::new(Arc::new(Base64Encoder))
    }
}

impl fmt::Debug for ResponseFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFactory")
            .field("encoder", &"...")
            .finish()
    }
}

/// 200 OK.
#[must_use]
pub fn ok(body: impl Into<Content>, headers: impl Into<HeaderInput>) -> HttpResponse {
    STANDARD.ok(body, headers)
}

/// 200 OK with a JSON body and `Content-Type: application/json`.
#[must_use]
pub fn ok_json(body: impl Into<serde_json::Value>) -> HttpResponse {
    STANDARD.ok_json(body)
}

/// 201 Created.
#[must_use]
pub fn created(body: impl Into<Content>, headers: impl Into<HeaderInput>) -> HttpResponse {
    STANDARD.created(body, headers)
}

/// 202 Accepted.
#[must_use]
pub fn accepted(body: impl Into<Content>, headers: impl Into<HeaderInput>) -> HttpResponse {
    STANDARD.accepted(body, headers)
}

/// 204 No Content.
#[must_use]
pub fn no_content(headers: impl Into<HeaderInput>) -> HttpResponse {
    STANDARD.no_content(headers)
}

/// 400 Bad Request.
#[must_use]
pub fn bad_request(body: impl Into<Content>) -> HttpResponse {
    STANDARD.bad_request(body)
}

/// 401 Unauthorized.
#[must_use]
pub fn unauthorized(body: impl Into<Content>) -> HttpResponse {
    STANDARD.unauthorized(body)
}

/// 500 Internal Server Error.
#[must_use]
pub fn internal_error(body: impl Into<Content>) -> HttpResponse {
    STANDARD.internal_error(body)
}

/// An API error with a JSON `{type, detail, parameters}` body.
#[must_use]
pub fn api_error(
    error_type: impl Into<String>,
    detail: impl Into<String>,
    parameters: Option<serde_json::Value>,
    status_code: Option<u16>,
) -> HttpResponse {
    STANDARD.api_error(error_type, detail, parameters, status_code)
}
