//! Incremental decoder for `data:`-framed chat completion streams.
//!
//! A [`StreamReader`] owns a byte source, splits it into lines, and hands out
//! one decoded record per `data:` frame until the `[DONE]` sentinel arrives.
//! Everything else on the wire (blank lines, comments, `event:` fields) is
//! skipped, up to [`StreamConfig::noise_line_limit`] lines in a row.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::HeaderMap;

use crate::chunk::ChatCompletionChunk;
use crate::codec::decode_with_extensions;
use crate::config::StreamConfig;
use crate::error::{BoxError, RemoteError, StreamError};
use crate::extensions::Extensible;
use crate::frame::{Frame, LineFramer};
use crate::headers::RateLimitHeaders;

/// Shared flag that aborts a pending read once set.
pub type CancellationSignal = Arc<AtomicBool>;

/// Response body as produced by `reqwest`.
pub type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Stream of chat completion chunks read from an HTTP response.
pub type ChatCompletionStream = StreamReader<ChatCompletionChunk, ByteStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// More frames may follow.
    AwaitingFrame,
    /// The `[DONE]` sentinel was seen.
    Terminated,
    /// A read or decode failed; the error has been returned once.
    Failed,
    /// Released by the caller.
    Closed,
}

impl StreamState {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::AwaitingFrame)
    }
}

pub struct StreamReader<T, S> {
    source: Option<S>,
    framer: LineFramer,
    state: StreamState,
    source_ended: bool,
    noise_lines: usize,
    config: StreamConfig,
    cancellation: Option<CancellationSignal>,
    headers: HeaderMap,
    _record: PhantomData<fn() -> T>,
}

impl<T, S> fmt::Debug for StreamReader<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("state", &self.state)
            .field("buffered", &self.framer.buffered_len())
            .field("noise_lines", &self.noise_lines)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, S> StreamReader<T, S> {
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Headers of the response this stream was opened from; empty otherwise.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn rate_limit_headers(&self) -> RateLimitHeaders {
        RateLimitHeaders::from_headers(&self.headers)
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Release the byte source. Safe to call repeatedly and after the stream
    /// has already ended.
    pub fn close(&mut self) {
        if self.state == StreamState::AwaitingFrame {
            tracing::debug!("closing stream before [DONE]");
            self.release(StreamState::Closed);
        }
        self.source = None;
    }

    fn release(&mut self, state: StreamState) {
        self.source = None;
        self.framer = LineFramer::default();
        self.state = state;
    }

    fn fail(&mut self, error: StreamError) -> StreamError {
        if error.is_cancelled() {
            tracing::debug!("stream cancelled");
        } else {
            tracing::warn!(%error, "stream failed");
        }
        self.release(StreamState::Failed);
        error
    }
}

impl<T, S, B, E> StreamReader<T, S>
where
    T: Extensible,
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<BoxError>,
{
    pub fn new(source: S, cancellation: Option<CancellationSignal>) -> Self {
        Self::with_config(source, cancellation, StreamConfig::default())
    }

    pub fn with_config(
        source: S,
        cancellation: Option<CancellationSignal>,
        config: StreamConfig,
    ) -> Self {
        Self {
            source: Some(source),
            framer: LineFramer::default(),
            state: StreamState::AwaitingFrame,
            source_ended: false,
            noise_lines: 0,
            config,
            cancellation,
            headers: HeaderMap::new(),
            _record: PhantomData,
        }
    }

    /// Next decoded record.
    ///
    /// Returns `Ok(None)` once the sentinel has been seen and on every call
    /// after the stream has finished, failed, or been closed. An error is
    /// returned once, after which the source has already been released.
    pub async fn recv(&mut self) -> Result<Option<T>, StreamError> {
        if self.state.is_finished() {
            return Ok(None);
        }
        if is_cancelled(self.cancellation.as_ref()) {
            return Err(self.fail(StreamError::Cancelled));
        }

        loop {
            if let Some(line) = self.next_buffered_line() {
                if let Some(record) = self.process_line(&line)? {
                    return Ok(Some(record));
                }
                if self.state.is_finished() {
                    return Ok(None);
                }
                continue;
            }

            if self.source_ended {
                return Err(self.fail(StreamError::EndedWithoutSentinel));
            }
            self.read_chunk().await?;
        }
    }

    /// Adapt into a [`Stream`] that ends after the sentinel or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, StreamError>> {
        stream::unfold(self, |mut reader| async move {
            match reader.recv().await {
                Ok(Some(record)) => Some((Ok(record), reader)),
                Ok(None) => None,
                Err(error) => Some((Err(error), reader)),
            }
        })
    }

    fn next_buffered_line(&mut self) -> Option<Vec<u8>> {
        match self.framer.next_line() {
            Some(line) => Some(line),
            None if self.source_ended => self.framer.take_remainder(),
            None => None,
        }
    }

    fn process_line(&mut self, line: &[u8]) -> Result<Option<T>, StreamError> {
        match Frame::classify(line) {
            Frame::Blank => {
                self.note_noise()?;
                Ok(None)
            }
            Frame::Noise => {
                tracing::trace!(line = %String::from_utf8_lossy(line), "skipping non-data line");
                self.note_noise()?;
                Ok(None)
            }
            Frame::Done => {
                tracing::debug!("stream reached [DONE]");
                self.release(StreamState::Terminated);
                Ok(None)
            }
            Frame::Data(payload) => {
                self.noise_lines = 0;
                match decode_frame::<T>(payload) {
                    Ok(record) => Ok(Some(record)),
                    Err(error) => Err(self.fail(error)),
                }
            }
        }
    }

    fn note_noise(&mut self) -> Result<(), StreamError> {
        self.noise_lines += 1;
        match self.config.noise_line_limit {
            Some(limit) if self.noise_lines > limit => {
                Err(self.fail(StreamError::TooManyNoiseLines(limit)))
            }
            _ => Ok(()),
        }
    }

    async fn read_chunk(&mut self) -> Result<(), StreamError> {
        let Some(source) = self.source.as_mut() else {
            self.source_ended = true;
            return Ok(());
        };

        let next = await_or_cancel(
            source.next(),
            self.cancellation.as_ref(),
            self.config.cancel_poll_interval,
        )
        .await;

        match next {
            Ok(Some(Ok(chunk))) => {
                self.framer.push(chunk.as_ref());
                Ok(())
            }
            Ok(Some(Err(error))) => Err(self.fail(StreamError::transport(error))),
            Ok(None) => {
                tracing::debug!(buffered = self.framer.buffered_len(), "byte source ended");
                self.source_ended = true;
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }
}

impl<T: Extensible> StreamReader<T, ByteStream> {
    /// Stream the body of an already successful response.
    pub fn from_response(
        response: reqwest::Response,
        cancellation: Option<CancellationSignal>,
        config: StreamConfig,
    ) -> Self {
        let headers = response.headers().clone();
        let source: ByteStream = Box::pin(response.bytes_stream());
        Self::with_config(source, cancellation, config).with_headers(headers)
    }
}

fn decode_frame<T: Extensible>(payload: &[u8]) -> Result<T, StreamError> {
    if let Some(remote) = RemoteError::from_payload(payload) {
        return Err(StreamError::Remote(remote));
    }
    Ok(decode_with_extensions(payload)?)
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
    poll_interval: Duration,
) -> Result<F::Output, StreamError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(StreamError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(poll_interval, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(StreamError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::FinishReason;
    use std::io;

    type Source = stream::Iter<std::vec::IntoIter<Result<Vec<u8>, io::Error>>>;

    fn reader(chunks: &[&str]) -> StreamReader<ChatCompletionChunk, Source> {
        let items = chunks
            .iter()
            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
            .collect::<Vec<_>>();
        StreamReader::new(stream::iter(items), None)
    }

    #[tokio::test]
    async fn yields_frames_until_sentinel() {
        let mut reader = reader(&[
            "data: {\"id\":\"1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"id\":\"1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ]);

        let first = reader.recv().await.expect("first").expect("chunk");
        assert_eq!(first.content_for(0), "Hi");
        let second = reader.recv().await.expect("second").expect("chunk");
        assert_eq!(second.choices[0].finish_reason, FinishReason::Stop);

        assert!(reader.recv().await.expect("end").is_none());
        assert_eq!(reader.state(), StreamState::Terminated);
        assert!(reader.recv().await.expect("after end").is_none());
    }

    #[tokio::test]
    async fn unterminated_final_sentinel_still_ends_stream() {
        let mut reader = reader(&["data: {\"id\":\"a\"}\n", "data: [DONE]"]);
        assert!(reader.recv().await.expect("frame").is_some());
        assert!(reader.recv().await.expect("end").is_none());
        assert_eq!(reader.state(), StreamState::Terminated);
    }

    #[tokio::test]
    async fn noise_counter_resets_on_data() {
        let mut reader = StreamReader::<ChatCompletionChunk, _>::with_config(
            stream::iter(vec![Ok::<_, io::Error>(
                ": ping\n: ping\ndata: {\"id\":\"a\"}\n: ping\n: ping\ndata: [DONE]\n".as_bytes(),
            )]),
            None,
            StreamConfig::default().with_noise_line_limit(2),
        );
        assert!(reader.recv().await.expect("frame").is_some());
        assert!(reader.recv().await.expect("end").is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut reader = reader(&["data: {\"id\":\"a\"}\n"]);
        reader.close();
        reader.close();
        assert_eq!(reader.state(), StreamState::Closed);
        assert!(reader.recv().await.expect("closed").is_none());
    }
}
