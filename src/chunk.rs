//! Streamed chat-completion chunk records.
//!
//! [`ChatCompletionChunk`] is the envelope the stream decoder yields once per
//! `data:` frame. Every record here that carries an `extension_store` keeps
//! the keys its schema does not know about and writes them back on encode.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::extensible_record;
use crate::extensions::ExtensionStore;
use crate::message::{FunctionCall, ToolCall};

/// Why a choice stopped producing tokens.
///
/// Unset and empty reasons encode as JSON `null`, never as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FinishReason {
    #[default]
    Unset,
    Stop,
    Length,
    FunctionCall,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "null" => Self::Unset,
            "stop" => Self::Stop,
            "length" => Self::Length,
            "function_call" => Self::FunctionCall,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Unset => None,
            Self::Stop => Some("stop"),
            Self::Length => Some("length"),
            Self::FunctionCall => Some("function_call"),
            Self::ToolCalls => Some("tool_calls"),
            Self::ContentFilter => Some("content_filter"),
            Self::Other(value) if value.is_empty() || value == "null" => None,
            Self::Other(value) => Some(value),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.as_str().is_none()
    }
}

impl Serialize for FinishReason {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_str() {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(|value| Self::parse(&value))
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub audio_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub audio_tokens: u64,
    #[serde(default)]
    pub reasoning_tokens: u64,
    #[serde(default)]
    pub accepted_prediction_tokens: u64,
    #[serde(default)]
    pub rejected_prediction_tokens: u64,
}

/// Token accounting; only present on the final chunk when usage is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSeverity {
    #[serde(default)]
    pub filtered: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDetection {
    #[serde(default)]
    pub filtered: bool,
    #[serde(default)]
    pub detected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFilterResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hate: Option<FilterSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_harm: Option<FilterSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sexual: Option<FilterSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violence: Option<FilterSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jailbreak: Option<FilterDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profanity: Option<FilterDetection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptAnnotation {
    #[serde(default)]
    pub prompt_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_filter_results: Option<ContentFilterResults>,
}

/// Incremental message content carried by one choice of a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning_content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refusal: String,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct TopLogprob {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub logprob: f64,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct TokenLogprob {
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub logprob: f64,
    #[serde(default)]
    pub top_logprobs: Vec<TopLogprob>,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct ChunkLogprobs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<TokenLogprob>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<Vec<TokenLogprob>>,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<ChunkLogprobs>,
    #[serde(default)]
    pub finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_filter_results: Option<ContentFilterResults>,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct PromptFilterResult {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_filter_results: Option<ContentFilterResults>,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

/// One streamed increment of a chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prompt_annotations: Vec<PromptAnnotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prompt_filter_results: Vec<PromptFilterResult>,
    /// Set on the last chunk when the request asked for usage; `null` before that.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

extensible_record!(
    ChunkDelta,
    TopLogprob,
    TokenLogprob,
    ChunkLogprobs,
    ChunkChoice,
    PromptFilterResult,
    ChatCompletionChunk,
);

impl ChatCompletionChunk {
    /// Concatenated `content` deltas of all choices with the given index.
    pub fn content_for(&self, index: u32) -> String {
        self.choices
            .iter()
            .filter(|choice| choice.index == index)
            .map(|choice| choice.delta.content.as_str())
            .collect()
    }

    /// Whether any choice reported a finish reason.
    pub fn is_finished(&self) -> bool {
        self.choices
            .iter()
            .any(|choice| !choice.finish_reason.is_unset())
    }
}
