use std::fmt;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Boxed error produced by a byte source feeding the stream decoder.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of the extension-preserving codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode {target}: {source}")]
    MalformedPayload {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("payload is not readable as a JSON object: {source}")]
    FieldMap {
        #[source]
        source: serde_json::Error,
    },

    #[error("message content and multi-content cannot both be set")]
    ContentFieldsConflict,

    #[error("failed to re-encode extension fields: {0}")]
    ExtensionEncode(#[source] serde_json::Error),

    #[error("failed to encode {target}: {source}")]
    Encode {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl CodecError {
    #[must_use]
    pub fn malformed<T: ?Sized>(source: serde_json::Error) -> Self {
        Self::MalformedPayload {
            target: short_type_name::<T>(),
            source,
        }
    }

    #[must_use]
    pub fn encode<T: ?Sized>(source: serde_json::Error) -> Self {
        Self::Encode {
            target: short_type_name::<T>(),
            source,
        }
    }
}

/// Failures that end a decoded event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream transport failed: {0}")]
    Transport(#[source] BoxError),

    #[error("stream was cancelled")]
    Cancelled,

    #[error("stream ended without a [DONE] marker")]
    EndedWithoutSentinel,

    #[error("failed to decode stream frame: {0}")]
    Decode(#[from] CodecError),

    #[error("stream sent more than {0} consecutive lines without a data frame")]
    TooManyNoiseLines(usize),

    #[error("stream carried an error frame: {0}")]
    Remote(RemoteError),
}

impl StreamError {
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error object sent in-band as a `data:` frame, `{"error": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub param: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteErrorPayload {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub id: Option<IgnoredAny>,
    #[serde(default)]
    pub choices: Option<IgnoredAny>,
}

impl RemoteError {
    /// Error frame carried by `payload`.
    ///
    /// A payload is an error frame when its top-level `error` member is an
    /// object and either `error` is the first key or the payload has neither
    /// `id` nor `choices`. A regular chunk that merely carries an `error`
    /// extension is not one.
    pub(crate) fn from_payload(payload: &[u8]) -> Option<Self> {
        if !payload.windows(7).any(|window| window == b"\"error\"") {
            return None;
        }
        let frame = serde_json::from_slice::<RemoteErrorPayload>(payload).ok()?;
        let error_only = frame.id.is_none() && frame.choices.is_none();
        if !error_only && !error_is_first_key(payload) {
            return None;
        }
        match frame.error {
            Some(error @ Value::Object(_)) => serde_json::from_value(error).ok(),
            _ => None,
        }
    }
}

fn error_is_first_key(payload: &[u8]) -> bool {
    payload
        .trim_ascii_start()
        .strip_prefix(b"{")
        .is_some_and(|rest| rest.trim_ascii_start().starts_with(b"\"error\""))
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = if self.message.is_empty() {
            "unknown error"
        } else {
            self.message.as_str()
        };
        match &self.code {
            Some(Value::String(code)) if !code.trim().is_empty() => {
                write!(f, "({code}) {message}")
            }
            Some(Value::Number(code)) => write!(f, "({code}) {message}"),
            _ => write!(f, "{message}"),
        }
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::{CodecError, RemoteError};
    use serde_json::json;

    #[test]
    fn malformed_error_names_the_target_type() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let error = CodecError::malformed::<crate::chunk::ChatCompletionChunk>(source);
        assert!(error
            .to_string()
            .starts_with("failed to decode ChatCompletionChunk"));
    }

    #[test]
    fn remote_error_display_includes_code_when_present() {
        let error = RemoteError {
            message: "slow down".to_owned(),
            code: Some(json!("rate_limit_exceeded")),
            ..RemoteError::default()
        };
        assert_eq!(error.to_string(), "(rate_limit_exceeded) slow down");

        let bare = RemoteError::default();
        assert_eq!(bare.to_string(), "unknown error");
    }

    #[test]
    fn remote_error_is_read_only_from_top_level_error_objects() {
        let frame = br#"{"error":{"message":"boom","type":"server_error","code":500}}"#;
        let error = RemoteError::from_payload(frame).expect("error frame");
        assert_eq!(error.message, "boom");
        assert_eq!(error.type_.as_deref(), Some("server_error"));
        assert_eq!(error.code, Some(json!(500)));

        let chunk = br#"{"id":"1","choices":[{"delta":{"content":"\"error\""}}]}"#;
        assert!(RemoteError::from_payload(chunk).is_none());
        assert!(RemoteError::from_payload(br#"{"error":"text"}"#).is_none());
    }

    #[test]
    fn chunk_carrying_an_error_extension_is_not_an_error_frame() {
        let chunk = br#"{"id":"1","choices":[],"error":{"message":"moderation warning"}}"#;
        assert!(RemoteError::from_payload(chunk).is_none());

        let leading = br#" { "error":{"message":"boom"},"id":"1","choices":[]}"#;
        assert_eq!(
            RemoteError::from_payload(leading).map(|error| error.message),
            Some("boom".to_owned())
        );
    }
}
