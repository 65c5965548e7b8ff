//! Response normalization for handler functions.
//!
//! [`ResponseNormalizer::wrap`] adapts a handler so that every invocation
//! yields a future of an [`HttpResponse`]. The future has no error channel:
//! returned failures, panics while invoking the handler, failures produced by
//! a pending future and panics while polling it are all classified, logged,
//! and turned into an error envelope.
//!
//! Per invocation:
//!
//! 1. the handler runs synchronously with the call arguments;
//! 2. a response passes through unchanged, a pending future is awaited, any
//!    other value becomes a 200 response with that value as body;
//! 3. a failure becomes a 500 response whose body is the API error payload,
//!    unless the failure value is itself a response, which passes through;
//! 4. a pending future's output goes through steps 2 and 3 again.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use envelope_core::EnvelopeConfig;
use futures::FutureExt;
use futures::future::{self, BoxFuture};

use crate::classify::{CaughtError, ErrorClassifier, is_truthy};
use crate::factory::{APPLICATION_JSON, ResponseFactory};
use crate::response::{Content, HttpResponse, ResponseParts};

/// Status code of responses built from caught failures.
pub const UNEXPECTED_ERROR_STATUS: u16 = 500;

/// What a handler produced, before normalization.
pub enum Outcome {
    /// A finished response, passed through unchanged.
    Response(HttpResponse),
    /// A plain value, sent as a 200 body.
    Value(Content),
    /// A failure.
    Failed(CaughtError),
    /// A computation that has not finished yet.
    Pending(BoxFuture<'static, Outcome>),
}

impl Outcome {
    /// Wrap a future whose output converts into an outcome.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future + Send + 'static,
        F::Output: Into<Outcome>,
    {
        Self::Pending(fut.map(|output| -> Outcome { output.into() }).boxed())
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Self::Value(content) => f.debug_tuple("Value").field(content).finish(),
            Self::Failed(caught) => f.debug_tuple("Failed").field(caught).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<HttpResponse> for Outcome {
    fn from(response: HttpResponse) -> Self {
        Self::Response(response)
    }
}

impl From<Content> for Outcome {
    fn from(content: Content) -> Self {
        Self::Value(content)
    }
}

impl From<String> for Outcome {
    fn from(s: String) -> Self {
        Self::Value(s.into())
    }
}

impl From<&str> for Outcome {
    fn from(s: &str) -> Self {
        Self::Value(s.into())
    }
}

impl From<Vec<u8>> for Outcome {
    fn from(b: Vec<u8>) -> Self {
        Self::Value(b.into())
    }
}

impl From<Bytes> for Outcome {
    fn from(b: Bytes) -> Self {
        Self::Value(b.into())
    }
}

impl From<()> for Outcome {
    fn from((): ()) -> Self {
        Self::Value(Content::empty())
    }
}

impl From<serde_json::Value> for Outcome {
    /// `null`, `false`, zero and `""` are sent as an empty body, other
    /// strings verbatim, anything else as compact JSON.
    fn from(value: serde_json::Value) -> Self {
        match value {
            falsy if !is_truthy(&falsy) => Self::Value(Content::empty()),
            serde_json::Value::String(s) => Self::Value(s.into()),
            other => Self::Value(other.to_string().into()),
        }
    }
}

impl From<CaughtError> for Outcome {
    fn from(caught: CaughtError) -> Self {
        Self::Failed(caught)
    }
}

impl<T, E> From<Result<T, E>> for Outcome
where
    T: Into<Outcome>,
    E: Into<CaughtError>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Self::Failed(err.into()),
        }
    }
}

enum Step {
    Done(HttpResponse),
    Pending(BoxFuture<'static, Outcome>),
}

/// Adapts handlers so that every invocation resolves to a response.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    factory: ResponseFactory,
    classifier: ErrorClassifier,
}

impl ResponseNormalizer {
    /// Create a normalizer from a factory and a classifier.
    #[must_use]
    pub fn new(factory: ResponseFactory, classifier: ErrorClassifier) -> Self {
        Self {
            factory,
            classifier,
        }
    }

    /// Create a normalizer with the standard encoder, honoring the configured
    /// environment for stack output.
    #[must_use]
    pub fn from_config(config: &EnvelopeConfig) -> Self {
        Self::new(
            ResponseFactory::default(),
            ErrorClassifier::new(config.is_development()),
        )
    }

    /// The classifier used for failures.
    #[must_use]
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Wrap a handler.
    pub fn wrap<A, F, O>(
        self,
        handler: F,
    ) -> impl Fn(A) -> BoxFuture<'static, HttpResponse> + Send + Sync
    where
        F: Fn(A) -> O + Send + Sync + 'static,
        O: Into<Outcome>,
    {
        move |args| self.invoke(&handler, args)
    }

    /// Wrap a handler that returns a future.
    pub fn wrap_async<A, F, Fut>(
        self,
        handler: F,
    ) -> impl Fn(A) -> BoxFuture<'static, HttpResponse> + Send + Sync
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Into<Outcome>,
    {
        self.wrap(move |args| Outcome::pending(handler(args)))
    }

    /// Run `handler` once and normalize what it produced.
    ///
    /// The handler itself runs before this returns; only a pending outcome is
    /// deferred to the returned future.
    pub fn invoke<A, F, O>(&self, handler: &F, args: A) -> BoxFuture<'static, HttpResponse>
    where
        F: Fn(A) -> O,
        O: Into<Outcome>,
    {
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| -> Outcome { handler(args).into() }));
        let outcome = match invoked {
            Ok(outcome) => outcome,
            Err(payload) => Outcome::Failed(CaughtError::from_panic(payload)),
        };
        match self.step(outcome) {
            Step::Done(response) => future::ready(response).boxed(),
            Step::Pending(pending) => self.clone().settle(pending).boxed(),
        }
    }

    /// Build the response for a caught failure.
    ///
    /// A failure that already is a response is returned unchanged; anything
    /// else becomes `status_code` with a JSON API error payload.
    #[must_use]
    pub fn handle_unexpected_error(&self, caught: CaughtError, status_code: u16) -> HttpResponse {
        if let CaughtError::Response(response) = caught {
            tracing::debug!(
                status_code = response.status_code(),
                "handler failed with a response, passing it through"
            );
            return response;
        }

        let payload = self.classifier.api_error(&caught);
        tracing::error!(
            detail = %payload.detail,
            error = ?caught,
            "caught unexpected error in response wrapper"
        );
        self.factory.response(
            ResponseParts::default()
                .status_code(status_code)
                .headers([("content-type", APPLICATION_JSON)])
                .body(payload.to_json()),
        )
    }

    fn step(&self, outcome: Outcome) -> Step {
        match outcome {
            Outcome::Response(response) => Step::Done(response),
            Outcome::Value(content) => Step::Done(self.factory.ok(content, ())),
            Outcome::Failed(caught) => {
                Step::Done(self.handle_unexpected_error(caught, UNEXPECTED_ERROR_STATUS))
            }
            Outcome::Pending(pending) => Step::Pending(pending),
        }
    }

    async fn settle(self, mut pending: BoxFuture<'static, Outcome>) -> HttpResponse {
        loop {
            let outcome = match AssertUnwindSafe(pending).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Outcome::Failed(CaughtError::from_panic(payload)),
            };
            match self.step(outcome) {
                Step::Done(response) => return response,
                Step::Pending(next) => pending = next,
            }
        }
    }
}

/// Wrap a handler with the default normalizer.
pub fn with_http_response<A, F, O>(
    handler: F,
) -> impl Fn(A) -> BoxFuture<'static, HttpResponse> + Send + Sync
where
    F: Fn(A) -> O + Send + Sync + 'static,
    O: Into<Outcome>,
{
    ResponseNormalizer::default().wrap(handler)
}

/// Wrap an async handler with the default normalizer.
pub fn with_http_response_async<A, F, Fut>(
    handler: F,
) -> impl Fn(A) -> BoxFuture<'static, HttpResponse> + Send + Sync
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Into<Outcome>,
{
    ResponseNormalizer::default().wrap_async(handler)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::classify::UNEXPECTED_ERROR_TYPE;
    use crate::factory::{bad_request, created, no_content, ok, ok_json};
    use crate::headers::HeaderPair;

    fn payload_of(response: &HttpResponse) -> serde_json::Value {
        serde_json::from_slice(&response.decoded_body().unwrap()).unwrap()
    }

    fn assert_unexpected_error(response: &HttpResponse, detail: &str) {
        assert_eq!(response.status_code(), 500);
        assert_eq!(
            response.headers(),
            [HeaderPair::new("content-type", APPLICATION_JSON)]
        );
        let payload = payload_of(response);
        assert_eq!(payload["type"], UNEXPECTED_ERROR_TYPE);
        assert_eq!(payload["detail"], detail);
    }

    #[tokio::test]
    async fn test_should_pass_response_through_unchanged() {
        let expected = created("made", [("Location", "/items/1")]);
        let returned = expected.clone();
        let wrapped = with_http_response(move |(): ()| returned.clone());
        assert_eq!(wrapped(()).await, expected);
    }

    #[tokio::test]
    async fn test_should_wrap_factories_as_handlers() {
        let wrapped = with_http_response(|body: String| ok(body, ()));
        let response = wrapped("body".to_owned()).await;
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"statusCode":200,"headers":[],"body":"Ym9keQ=="}"#
        );

        let wrapped = with_http_response(|(): ()| no_content(()));
        assert_eq!(wrapped(()).await, HttpResponse::new(204, (), ()));

        let wrapped = with_http_response(|body: &'static str| bad_request(body));
        assert_eq!(wrapped("body").await.status_code(), 400);

        let wrapped = with_http_response(|value: serde_json::Value| ok_json(value));
        assert_eq!(wrapped(json!({"a": true})).await.body(), "eyJhIjp0cnVlfQ==");
    }

    #[tokio::test]
    async fn test_should_wrap_plain_value_as_ok() {
        let wrapped = with_http_response(|name: String| format!("hello {name}"));
        let response = wrapped("world".to_owned()).await;
        assert_eq!(response.status_code(), 200);
        assert!(response.headers().is_empty());
        assert_eq!(response.decoded_body().unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_should_wrap_json_values() {
        let wrapped = with_http_response(|value: serde_json::Value| value);
        assert_eq!(wrapped(json!(null)).await.body(), "");
        assert_eq!(wrapped(json!("raw")).await.decoded_body().unwrap(), b"raw");
        assert_eq!(wrapped(json!([1, 2])).await.decoded_body().unwrap(), b"[1,2]");
    }

    #[tokio::test]
    async fn test_should_send_falsy_json_values_as_empty_body() {
        let wrapped = with_http_response(|value: serde_json::Value| value);
        for value in [json!(0), json!(0.0), json!(false), json!("")] {
            let response = wrapped(value.clone()).await;
            assert_eq!(response.status_code(), 200, "value: {value}");
            assert_eq!(response.body(), "", "value: {value}");
        }
        assert_eq!(wrapped(json!(true)).await.decoded_body().unwrap(), b"true");
        assert_eq!(wrapped(json!(7)).await.decoded_body().unwrap(), b"7");
    }

    #[tokio::test]
    async fn test_should_resolve_sync_failure_to_error_response() {
        let wrapped = with_http_response(|(): ()| Err::<String, _>("boom"));
        assert_unexpected_error(&wrapped(()).await, "boom");
    }

    #[tokio::test]
    async fn test_should_resolve_panic_to_error_response() {
        let wrapped = with_http_response(|(): ()| -> String { panic!("handler exploded") });
        assert_unexpected_error(&wrapped(()).await, "handler exploded");
    }

    #[tokio::test]
    async fn test_should_pass_response_failure_through() {
        let denied = bad_request("nope");
        let thrown = denied.clone();
        let wrapped = with_http_response(move |(): ()| Err::<String, _>(thrown.clone()));
        assert_eq!(wrapped(()).await, denied);

        let thrown = denied.clone();
        let wrapped =
            with_http_response(move |(): ()| -> String { panic::panic_any(thrown.clone()) });
        assert_eq!(wrapped(()).await, denied);
    }

    #[tokio::test]
    async fn test_should_classify_absent_failure() {
        let wrapped = with_http_response(|(): ()| Outcome::Failed(CaughtError::Absent));
        assert_unexpected_error(&wrapped(()).await, crate::classify::NO_CONTEXT_MESSAGE);
    }

    #[tokio::test]
    async fn test_should_wrap_async_value() {
        let wrapped = with_http_response_async(|n: u32| async move { n.to_string() });
        let response = wrapped(42).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.decoded_body().unwrap(), b"42");
    }

    #[tokio::test]
    async fn test_should_pass_async_response_through() {
        let wrapped = with_http_response_async(|(): ()| async { created("x", ()) });
        assert_eq!(wrapped(()).await, created("x", ()));
    }

    #[tokio::test]
    async fn test_should_resolve_async_failure_to_error_response() {
        let wrapped = with_http_response_async(|(): ()| async {
            Err::<String, _>(anyhow::anyhow!("upstream timed out"))
        });
        assert_unexpected_error(&wrapped(()).await, "upstream timed out");
    }

    #[tokio::test]
    async fn test_should_resolve_async_panic_to_error_response() {
        let wrapped = with_http_response_async(|(): ()| async {
            if true {
                panic!("poll exploded");
            }
            String::new()
        });
        assert_unexpected_error(&wrapped(()).await, "poll exploded");
    }

    #[tokio::test]
    async fn test_should_flatten_nested_pending_outcomes() {
        let wrapped = with_http_response(|(): ()| {
            Outcome::pending(async { Outcome::pending(async { "inner" }) })
        });
        assert_eq!(wrapped(()).await.decoded_body().unwrap(), b"inner");
    }

    #[tokio::test]
    async fn test_should_invoke_handler_before_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let wrapped = with_http_response(move |(): ()| {
            counter.fetch_add(1, Ordering::SeqCst);
            "done"
        });

        let pending = wrapped(());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pending.await.decoded_body().unwrap(), b"done");
    }

    #[tokio::test]
    async fn test_should_include_exception_in_development() {
        let config = EnvelopeConfig {
            environment: envelope_core::Environment::Development,
            ..EnvelopeConfig::default()
        };
        let wrapped = ResponseNormalizer::from_config(&config).wrap(|(): ()| {
            Outcome::Failed(CaughtError::error("boom", Some("at handler".to_owned())))
        });
        let payload = payload_of(&wrapped(()).await);
        assert_eq!(payload["exception"], "boom\nat handler");
    }

    #[tokio::test]
    async fn test_should_omit_exception_in_production() {
        let wrapped = ResponseNormalizer::default().wrap(|(): ()| {
            Outcome::Failed(CaughtError::error("boom", Some("at handler".to_owned())))
        });
        let payload = payload_of(&wrapped(()).await);
        assert!(payload.get("exception").is_none());
    }

    #[test]
    fn test_should_use_custom_status_for_unexpected_error() {
        let normalizer = ResponseNormalizer::default();
        let response = normalizer.handle_unexpected_error("gateway down".into(), 502);
        assert_eq!(response.status_code(), 502);
        assert_eq!(payload_of(&response)["detail"], "gateway down");
    }
}
