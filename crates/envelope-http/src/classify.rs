//! Classification of caught failures.
//!
//! Whatever a handler fails with (a message, an error with a backtrace, a
//! foreign value, nothing at all) is captured once as a [`CaughtError`] and
//! then mapped to a stable `{message, exception?}` descriptor and to the API
//! error payload clients receive:
//!
//! ```json
//! {
//!   "type": "https://errors-api.cloud.com/integration-script/unexpected-error",
//!   "detail": "connection refused"
//! }
//! ```

use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::response::HttpResponse;

/// `type` of payloads produced for unexpected handler failures.
pub const UNEXPECTED_ERROR_TYPE: &str =
    "https://errors-api.cloud.com/integration-script/unexpected-error";

/// Message used when the failure carries no value at all.
pub const NO_CONTEXT_MESSAGE: &str = "Caught unexpected error with no context";

/// A failure value captured from a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum CaughtError {
    /// Nothing was attached to the failure.
    Absent,
    /// The failure is a bare message.
    Text(String),
    /// An error exposing a message and possibly a stack.
    Error {
        /// Error message.
        message: String,
        /// Rendered stack (cause chain and/or backtrace).
        stack: Option<String>,
    },
    /// A foreign value with no error shape.
    Opaque {
        /// Structural JSON form, when one could be captured.
        structure: Option<serde_json::Value>,
        /// Plain text rendering of the value.
        display: String,
    },
    /// A complete response used as the failure value.
    Response(HttpResponse),
}

impl CaughtError {
    /// Capture an error with an explicit stack.
    #[must_use]
    pub fn error(message: impl Into<String>, stack: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            stack,
        }
    }

    /// Capture a foreign value from its structure and text rendering.
    #[must_use]
    pub fn opaque(structure: impl Into<Option<serde_json::Value>>, display: impl Into<String>) -> Self {
        Self::Opaque {
            structure: structure.into(),
            display: display.into(),
        }
    }

    /// Capture a panic payload.
    ///
    /// Panics raised with `std::panic::panic_any` carrying an [`HttpResponse`]
    /// or a [`CaughtError`] keep that value.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<HttpResponse>() {
            Ok(response) => return Self::Response(*response),
            Err(other) => other,
        };
        let payload = match payload.downcast::<Self>() {
            Ok(caught) => return *caught,
            Err(other) => other,
        };
        let payload = match payload.downcast::<String>() {
            Ok(message) => return Self::Text(*message),
            Err(other) => other,
        };
        match payload.downcast::<&'static str>() {
            Ok(message) => Self::Text((*message).to_owned()),
            Err(_) => Self::Absent,
        }
    }

    /// The response carried by the failure, if it is one.
    #[must_use]
    pub fn as_response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }
}

impl From<&str> for CaughtError {
    fn from(message: &str) -> Self {
        Self::Text(message.to_owned())
    }
}

impl From<String> for CaughtError {
    fn from(message: String) -> Self {
        Self::Text(message)
    }
}

impl From<HttpResponse> for CaughtError {
    fn from(response: HttpResponse) -> Self {
        Self::Response(response)
    }
}

impl From<anyhow::Error> for CaughtError {
    fn from(err: anyhow::Error) -> Self {
        let mut stack = String::new();
        for cause in err.chain().skip(1) {
            let _ = writeln!(stack, "Caused by: {cause}");
        }
        let backtrace = err.backtrace();
        if backtrace.status() == BacktraceStatus::Captured {
            let _ = write!(stack, "{backtrace}");
        }
        let stack = stack.trim_end().to_owned();
        Self::Error {
            message: err.to_string(),
            stack: (!stack.is_empty()).then_some(stack),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CaughtError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::from(anyhow::anyhow!(err))
    }
}

impl From<serde_json::Value> for CaughtError {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Absent,
            Value::String(message) => Self::Text(message),
            Value::Object(ref map) if is_error_shaped(map) => Self::Error {
                message: map.get("message").map(render_text).unwrap_or_default(),
                stack: map
                    .get("stack")
                    .filter(|stack| is_truthy(stack))
                    .map(render_text),
            },
            other => {
                let display = other.to_string();
                Self::Opaque {
                    structure: Some(other),
                    display,
                }
            }
        }
    }
}

fn is_error_shaped(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    ["message", "stack"]
        .iter()
        .any(|key| map.get(*key).is_some_and(is_truthy))
}

/// Whether a JSON value counts as present: `null`, `false`, zero and the
/// empty string do not.
pub(crate) fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Stable description of a caught failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    /// Human-readable message.
    pub message: String,
    /// Message plus stack, only in development mode.
    pub exception: Option<String>,
}

/// JSON body returned to clients for classified failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorPayload {
    /// URI identifying the error kind.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable detail.
    pub detail: String,
    /// Caller-supplied parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Message plus stack, only in development mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl ApiErrorPayload {
    /// Build a payload without parameters or exception.
    #[must_use]
    pub fn new(error_type: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            detail: detail.into(),
            parameters: None,
            exception: None,
        }
    }

    /// Compact JSON text of the payload.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("JSON serialization of error payload cannot fail")
    }
}

/// Maps [`CaughtError`] values to descriptors and payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier {
    development: bool,
}

impl ErrorClassifier {
    /// Create a classifier; `development` enables the `exception` field.
    #[must_use]
    pub fn new(development: bool) -> Self {
        Self { development }
    }

    /// Whether the classifier emits stack output.
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Describe a caught failure.
    #[must_use]
    pub fn classify(&self, caught: &CaughtError) -> ClassifiedError {
        match caught {
            CaughtError::Absent => ClassifiedError {
                message: NO_CONTEXT_MESSAGE.to_owned(),
                exception: None,
            },
            CaughtError::Text(message) => ClassifiedError {
                message: message.clone(),
                exception: None,
            },
            CaughtError::Error { message, stack } => ClassifiedError {
                message: message.clone(),
                exception: stack
                    .as_ref()
                    .filter(|stack| self.development && !stack.is_empty())
                    .map(|stack| format!("{message}\n{stack}")),
            },
            CaughtError::Opaque { structure, display } => ClassifiedError {
                message: opaque_message(structure.as_ref(), display),
                exception: None,
            },
            CaughtError::Response(response) => {
                let structure = serde_json::to_value(response).ok();
                ClassifiedError {
                    message: opaque_message(structure.as_ref(), &format!("{response:?}")),
                    exception: None,
                }
            }
        }
    }

    /// Build the API error payload for a caught failure.
    #[must_use]
    pub fn api_error(&self, caught: &CaughtError) -> ApiErrorPayload {
        let ClassifiedError { message, exception } = self.classify(caught);
        ApiErrorPayload {
            error_type: UNEXPECTED_ERROR_TYPE.to_owned(),
            detail: message,
            parameters: None,
            exception,
        }
    }
}

/// Serialized structure, unless it is the bare empty object `{}`, in which
/// case the display text is used. A genuine value that serializes to `{}`
/// therefore also reports its display text.
fn opaque_message(structure: Option<&serde_json::Value>, display: &str) -> String {
    match structure.map(serde_json::Value::to_string) {
        Some(body) if body != "{}" => body,
        _ => display.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message_of(caught: CaughtError) -> String {
        ErrorClassifier::default().classify(&caught).message
    }

    #[test]
    fn test_should_classify_absent_value() {
        let classified = ErrorClassifier::new(true).classify(&CaughtError::Absent);
        assert_eq!(classified.message, NO_CONTEXT_MESSAGE);
        assert_eq!(classified.exception, None);
    }

    #[test]
    fn test_should_use_text_as_message() {
        assert_eq!(message_of("boom".into()), "boom");
    }

    #[test]
    fn test_should_omit_exception_outside_development() {
        let caught = CaughtError::error("boom", Some("at handler".to_owned()));
        let classified = ErrorClassifier::new(false).classify(&caught);
        assert_eq!(classified.message, "boom");
        assert_eq!(classified.exception, None);
    }

    #[test]
    fn test_should_include_exception_in_development() {
        let caught = CaughtError::error("boom", Some("at handler".to_owned()));
        let classified = ErrorClassifier::new(true).classify(&caught);
        assert_eq!(classified.exception.as_deref(), Some("boom\nat handler"));
    }

    #[test]
    fn test_should_omit_exception_without_stack_in_development() {
        let caught = CaughtError::error("boom", None);
        assert_eq!(ErrorClassifier::new(true).classify(&caught).exception, None);
    }

    #[test]
    fn test_should_serialize_opaque_structure() {
        let caught = CaughtError::opaque(json!({"code": 7}), "[foreign]");
        assert_eq!(message_of(caught), r#"{"code":7}"#);
    }

    #[test]
    fn test_should_fall_back_to_display_for_empty_object() {
        // Known edge case: any value whose structure serializes to `{}` reports
        // its display text, even a legitimate error object.
        let caught = CaughtError::opaque(json!({}), "[foreign proxy]");
        assert_eq!(message_of(caught), "[foreign proxy]");
    }

    #[test]
    fn test_should_fall_back_to_display_without_structure() {
        let caught = CaughtError::opaque(None::<serde_json::Value>, "unserializable");
        assert_eq!(message_of(caught), "unserializable");
    }

    #[test]
    fn test_should_capture_json_values_by_shape() {
        assert_eq!(CaughtError::from(json!(null)), CaughtError::Absent);
        assert_eq!(CaughtError::from(json!("bad")), CaughtError::Text("bad".to_owned()));
        assert_eq!(
            CaughtError::from(json!({"message": "bad", "stack": "trace"})),
            CaughtError::error("bad", Some("trace".to_owned()))
        );
        assert_eq!(
            CaughtError::from(json!({"stack": "trace"})),
            CaughtError::error("", Some("trace".to_owned()))
        );
        assert!(matches!(
            CaughtError::from(json!([1, 2])),
            CaughtError::Opaque { .. }
        ));
        assert_eq!(message_of(CaughtError::from(json!(42))), "42");
    }

    #[test]
    fn test_should_treat_empty_fields_as_missing() {
        let caught = CaughtError::from(json!({"message": ""}));
        assert!(matches!(caught, CaughtError::Opaque { .. }));
        assert_eq!(message_of(caught), r#"{"message":""}"#);

        let caught = CaughtError::from(json!({"message": "m", "stack": ""}));
        assert_eq!(caught, CaughtError::error("m", None));
        assert_eq!(ErrorClassifier::new(true).classify(&caught).exception, None);

        let caught = CaughtError::error("m", Some(String::new()));
        assert_eq!(ErrorClassifier::new(true).classify(&caught).exception, None);
    }

    #[test]
    fn test_should_render_non_string_messages() {
        assert_eq!(
            CaughtError::from(json!({"message": 404})),
            CaughtError::error("404", None)
        );
    }

    #[test]
    fn test_should_capture_anyhow_cause_chain() {
        let err = anyhow::anyhow!("disk full").context("saving report");
        let CaughtError::Error { message, stack } = CaughtError::from(err) else {
            panic!("expected error variant");
        };
        assert_eq!(message, "saving report");
        assert!(stack.unwrap().starts_with("Caused by: disk full"));
    }

    #[test]
    fn test_should_capture_panic_payloads() {
        assert_eq!(
            CaughtError::from_panic(Box::new("static")),
            CaughtError::Text("static".to_owned())
        );
        assert_eq!(
            CaughtError::from_panic(Box::new(String::from("owned"))),
            CaughtError::Text("owned".to_owned())
        );
        let response = HttpResponse::new(418, (), ());
        assert_eq!(
            CaughtError::from_panic(Box::new(response.clone())),
            CaughtError::Response(response)
        );
        assert_eq!(CaughtError::from_panic(Box::new(7_u8)), CaughtError::Absent);
    }

    #[test]
    fn test_should_build_api_error_payload() {
        let payload = ErrorClassifier::default().api_error(&"boom".into());
        assert_eq!(payload.error_type, UNEXPECTED_ERROR_TYPE);
        assert_eq!(
            payload.to_json(),
            r#"{"type":"https://errors-api.cloud.com/integration-script/unexpected-error","detail":"boom"}"#
        );
    }

    #[test]
    fn test_should_serialize_exception_when_present() {
        let caught = CaughtError::error("boom", Some("trace".to_owned()));
        let payload = ErrorClassifier::new(true).api_error(&caught);
        let value: serde_json::Value = serde_json::from_str(&payload.to_json()).unwrap();
        assert_eq!(value["exception"], "boom\ntrace");
        assert!(value.get("parameters").is_none());
    }
}
