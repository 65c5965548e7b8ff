//! HTTP response envelope layer for Envelope.
//!
//! This crate turns whatever a serverless handler produces into a uniform,
//! serializable response envelope:
//!
//! - **Headers**: normalizes mapping or list header input into ordered pairs
//! - **Response**: the immutable `{statusCode, headers, body}` envelope
//! - **Factories**: `ok`, `created`, `bad_request`, ... with fixed status codes
//! - **Classifier**: maps caught failures to a stable API error payload
//! - **Wrapper**: guarantees every handler invocation resolves to a response
//! - **Interceptor**: converts upstream 401 responses into failures

pub mod classify;
pub mod factory;
pub mod headers;
pub mod intercept;
pub mod response;
pub mod wrapper;

pub use classify::{
    ApiErrorPayload, CaughtError, ClassifiedError, ErrorClassifier, UNEXPECTED_ERROR_TYPE,
};
pub use factory::{
    ResponseFactory, accepted, api_error, bad_request, created, internal_error, no_content, ok,
    ok_json, unauthorized,
};
pub use headers::{HeaderInput, HeaderPair};
pub use intercept::{
    InterceptError, UpstreamResponse, process_unauthorized_response,
    process_unauthorized_response_with,
};
pub use response::{Content, HttpResponse, ResponseParts};
pub use wrapper::{Outcome, ResponseNormalizer, with_http_response, with_http_response_async};
