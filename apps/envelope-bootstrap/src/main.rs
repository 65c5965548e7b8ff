//! Envelope bootstrap - runs a wrapped handler over a single event.
//!
//! Reads one JSON event from stdin, hands it to an echo handler wrapped by
//! the response normalizer, and prints the resulting envelope as one line of
//! JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! echo '{"hello": "world"}' | bootstrap
//! ```
//!
//! # Event shapes
//!
//! | Event | Result |
//! |-------|--------|
//! | `{"fail": "<message>"}` | 500 envelope with `<message>` as detail |
//! | `{"status": 401}` | 401 envelope from the simulated upstream |
//! | anything else | 200 envelope echoing the event as JSON |
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ENVELOPE_ENV` | `production` | `development` adds stack output to error payloads |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::sync::Arc;

use anyhow::{Context, Result};
use envelope_core::{Capability, EnvelopeConfig, IdGenerator, Library};
use envelope_http::factory::APPLICATION_JSON;
use envelope_http::{
    CaughtError, ErrorClassifier, HttpResponse, ResponseFactory, ResponseNormalizer,
    process_unauthorized_response,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

/// Body returned by the simulated upstream for non-echo statuses.
const UPSTREAM_DENIED: &str = "upstream denied the request";

/// Initialize the tracing subscriber on stderr.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Resolve the id generator registered under `uuid`.
fn request_ids(library: &Library) -> Result<Arc<dyn IdGenerator>> {
    match library.load(Library::UUID)? {
        Capability::Uuid(ids) => Ok(ids),
        other => anyhow::bail!("unexpected capability for uuid: {other:?}"),
    }
}

/// Echo handler over a raw event.
async fn handle_event(
    factory: ResponseFactory,
    request_id: String,
    raw: String,
) -> Result<HttpResponse, CaughtError> {
    let event: serde_json::Value = serde_json::from_str(&raw)
        .context("event is not valid JSON")
        .map_err(CaughtError::from)?;

    if let Some(message) = event.get("fail").and_then(serde_json::Value::as_str) {
        return Err(CaughtError::error(message, None));
    }

    if let Some(status) = event.get("status").and_then(serde_json::Value::as_u64) {
        let status = u16::try_from(status).context("status out of range")?;
        let upstream = http::Response::builder()
            .status(status)
            .body(UPSTREAM_DENIED)
            .context("invalid upstream status")?;
        let upstream = process_unauthorized_response(upstream).await?;
        return Ok(factory.ok(*upstream.body(), [("x-request-id", request_id)]));
    }

    Ok(factory.ok(
        event.to_string(),
        [
            ("Content-Type", APPLICATION_JSON.to_owned()),
            ("x-request-id", request_id),
        ],
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = EnvelopeConfig::from_env();
    init_tracing(&config.log_level)?;

    let library = Library::default();
    let factory = ResponseFactory::from_library(&library)?;
    let ids = request_ids(&library)?;
    let normalizer = ResponseNormalizer::new(
        factory.clone(),
        ErrorClassifier::new(config.is_development()),
    );
    tracing::debug!(environment = %config.environment, "bootstrap configured");

    let handler = normalizer.wrap_async(move |raw: String| {
        handle_event(factory.clone(), ids.generate(), raw)
    });

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("failed to read event from stdin")?;

    let response = handler(raw).await;
    tracing::info!(status_code = response.status_code(), "handler finished");

    let mut line = serde_json::to_string(&response).context("failed to serialize envelope")?;
    line.push('\n');
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(line.as_bytes())
        .await
        .context("failed to write envelope to stdout")?;
    stdout.flush().await.context("failed to flush stdout")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use envelope_http::InterceptError;

    use super::*;

    async fn run(raw: &str) -> HttpResponse {
        let handler = ResponseNormalizer::default().wrap_async(|raw: String| {
            handle_event(ResponseFactory::default(), "req-1".to_owned(), raw)
        });
        handler(raw.to_owned()).await
    }

    #[tokio::test]
    async fn test_should_echo_event_as_json() {
        let response = run(r#"{"hello": "world"}"#).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-request-id"), Some("req-1"));
        assert_eq!(response.decoded_body().unwrap(), br#"{"hello":"world"}"#);
    }

    #[tokio::test]
    async fn test_should_report_requested_failure() {
        let response = run(r#"{"fail": "database unavailable"}"#).await;
        assert_eq!(response.status_code(), 500);
        let payload: serde_json::Value =
            serde_json::from_slice(&response.decoded_body().unwrap()).unwrap();
        assert_eq!(payload["detail"], "database unavailable");
    }

    #[tokio::test]
    async fn test_should_short_circuit_upstream_401() {
        let response = run(r#"{"status": 401}"#).await;
        assert_eq!(response, envelope_http::unauthorized(UPSTREAM_DENIED));
    }

    #[tokio::test]
    async fn test_should_pass_other_upstream_statuses() {
        let response = run(r#"{"status": 200}"#).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.decoded_body().unwrap(), UPSTREAM_DENIED.as_bytes());
    }

    #[tokio::test]
    async fn test_should_classify_invalid_json() {
        let response = run("not json").await;
        assert_eq!(response.status_code(), 500);
        let payload: serde_json::Value =
            serde_json::from_slice(&response.decoded_body().unwrap()).unwrap();
        assert_eq!(payload["detail"], "event is not valid JSON");
    }

    #[test]
    fn test_should_load_request_ids() {
        let ids = request_ids(&Library::default()).unwrap();
        assert_eq!(ids.generate().len(), 36);
    }

    #[test]
    fn test_should_convert_intercept_error() {
        let caught = CaughtError::from(InterceptError::Unauthorized(HttpResponse::default()));
        assert_eq!(caught.as_response(), Some(&HttpResponse::default()));
    }
}
