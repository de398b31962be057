//! Wire layer for chat completion APIs.
//!
//! Two pieces:
//! - an extension-preserving JSON codec: records decode the fields they know
//!   and keep every other key (with its raw bytes) so it survives a round
//!   trip, and
//! - an incremental decoder for `data:`-framed response streams that yields
//!   one [`ChatCompletionChunk`] per frame until `[DONE]`.
//!
//! # Public API Overview
//! - Decode/encode any [`Extensible`] record with [`decode_with_extensions`]
//!   and [`encode_with_extensions`], or just use its `serde` impls.
//! - Read extension keys through [`Extensible::extension`] and friends.
//! - Stream chunks from a `reqwest::Response` via [`ChatCompletionStream::from_response`],
//!   or from any byte stream via [`StreamReader::new`].

pub mod chunk;
pub mod codec;
pub mod config;
pub mod error;
pub mod extensions;
pub mod frame;
pub mod headers;
pub mod known_fields;
pub mod message;
pub mod stream;

/// Streamed completion records.
pub use crate::chunk::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkLogprobs, ContentFilterResults,
    FinishReason, PromptAnnotation, PromptFilterResult, TokenLogprob, TopLogprob, Usage,
};

/// Codec entry points.
pub use crate::codec::{decode_with_extensions, encode_record, encode_with_extensions};

pub use crate::config::StreamConfig;
pub use crate::error::{BoxError, CodecError, RemoteError, StreamError};
pub use crate::extensions::{ExtensionStore, Extensible};
pub use crate::headers::{RateLimitHeaders, ResetTime};

/// Request messages.
pub use crate::message::{
    ChatMessage, ChatMessagePart, ChatMessagePartType, FunctionCall, ImageUrl, ImageUrlDetail,
    ToolCall,
};

/// Stream decoding.
pub use crate::stream::{
    ByteStream, CancellationSignal, ChatCompletionStream, StreamReader, StreamState,
};
