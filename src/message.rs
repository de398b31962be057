//! Chat message records: content parts and messages.

use serde::de::Error as _;
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::codec::{extensible_record, record_serde};
use crate::error::CodecError;
use crate::extensions::{ExtensionStore, Extensible};

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_DEVELOPER: &str = "developer";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_FUNCTION: &str = "function";
pub const ROLE_TOOL: &str = "tool";

/// Kind of a content part. Types this crate does not model are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChatMessagePartType {
    /// No `type` was sent; nothing is written back.
    #[default]
    Unset,
    Text,
    ImageUrl,
    Other(String),
}

impl ChatMessagePartType {
    pub fn parse(value: &str) -> Self {
        match value {
            "" => Self::Unset,
            "text" => Self::Text,
            "image_url" => Self::ImageUrl,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unset => "",
            Self::Text => "text",
            Self::ImageUrl => "image_url",
            Self::Other(value) => value,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl Serialize for ChatMessagePartType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChatMessagePartType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(|value| Self::parse(&value))
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageUrlDetail {
    Low,
    High,
    Auto,
    Other(String),
}

impl ImageUrlDetail {
    pub fn parse(value: &str) -> Self {
        match value {
            "low" => Self::Low,
            "high" => Self::High,
            "auto" => Self::Auto,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Auto => "auto",
            Self::Other(value) => value,
        }
    }
}

impl Serialize for ImageUrlDetail {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImageUrlDetail {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(|value| Self::parse(&value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ImageUrlDetail>,
}

/// One element of a multi-content message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct ChatMessagePart {
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "ChatMessagePartType::is_unset"
    )]
    pub kind: ChatMessagePartType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
    #[serde(skip)]
    pub extension_store: ExtensionStore,
}

extensible_record!(ChatMessagePart);

impl ChatMessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ChatMessagePartType::Text,
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn image_url(url: impl Into<String>, detail: Option<ImageUrlDetail>) -> Self {
        Self {
            kind: ChatMessagePartType::ImageUrl,
            image_url: Some(ImageUrl {
                url: url.into(),
                detail,
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// JSON-encoded arguments, possibly partial while streaming.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Position of the call; only set on streamed deltas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub function: FunctionCall,
}

/// A chat message in either single-content or multi-content form.
///
/// Both forms share the `content` key on the wire: a string for `content`, an
/// array of parts for `multi_content`. Setting both is rejected on encode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub refusal: String,
    pub multi_content: Vec<ChatMessagePart>,
    pub name: String,
    pub reasoning_content: String,
    pub function_call: Option<FunctionCall>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: String,
    pub extension_store: ExtensionStore,
}

impl ChatMessage {
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn parts(role: impl Into<String>, parts: Vec<ChatMessagePart>) -> Self {
        Self {
            role: role.into(),
            multi_content: parts,
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
struct MessageWire {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Option<Box<RawValue>>,
    #[serde(default)]
    refusal: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    reasoning_content: String,
    #[serde(default)]
    function_call: Option<FunctionCall>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
    #[serde(default)]
    tool_call_id: String,
}

fn split_content(
    raw: Option<Box<RawValue>>,
) -> Result<(String, Vec<ChatMessagePart>), serde_json::Error> {
    let Some(raw) = raw else {
        return Ok((String::new(), Vec::new()));
    };
    let text = raw.get();
    if text.starts_with('[') {
        Ok((String::new(), serde_json::from_str(text)?))
    } else {
        Ok((serde_json::from_str(text)?, Vec::new()))
    }
}

impl Extensible for ChatMessage {
    fn extension_store(&self) -> &ExtensionStore {
        &self.extension_store
    }

    fn extension_store_mut(&mut self) -> &mut ExtensionStore {
        &mut self.extension_store
    }

    fn serialize_schema<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.validate().map_err(S::Error::custom)?;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("role", &self.role)?;
        if !self.multi_content.is_empty() {
            map.serialize_entry("content", &self.multi_content)?;
        } else if !self.content.is_empty() {
            map.serialize_entry("content", &self.content)?;
        }
        if !self.refusal.is_empty() {
            map.serialize_entry("refusal", &self.refusal)?;
        }
        if !self.name.is_empty() {
            map.serialize_entry("name", &self.name)?;
        }
        if !self.reasoning_content.is_empty() {
            map.serialize_entry("reasoning_content", &self.reasoning_content)?;
        }
        if let Some(function_call) = &self.function_call {
            map.serialize_entry("function_call", function_call)?;
        }
        if !self.tool_calls.is_empty() {
            map.serialize_entry("tool_calls", &self.tool_calls)?;
        }
        if !self.tool_call_id.is_empty() {
            map.serialize_entry("tool_call_id", &self.tool_call_id)?;
        }
        map.end()
    }

    fn deserialize_schema<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = MessageWire::deserialize(deserializer)?;
        let (content, multi_content) = split_content(wire.content).map_err(D::Error::custom)?;
        Ok(Self {
            role: wire.role,
            content,
            refusal: wire.refusal,
            multi_content,
            name: wire.name,
            reasoning_content: wire.reasoning_content,
            function_call: wire.function_call,
            tool_calls: wire.tool_calls,
            tool_call_id: wire.tool_call_id,
            extension_store: ExtensionStore::default(),
        })
    }

    fn validate(&self) -> Result<(), CodecError> {
        if !self.content.is_empty() && !self.multi_content.is_empty() {
            return Err(CodecError::ContentFieldsConflict);
        }
        Ok(())
    }
}

record_serde!(ChatMessage);
