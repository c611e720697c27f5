//! Server-sent-event decoding for streamed chat completions.
//!
//! The body arrives as arbitrary byte chunks. Complete `data:` lines carry a
//! JSON chunk whose `choices[0].delta.content` is the next text fragment;
//! `data: [DONE]` ends the session.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::{ApiErrorBody, FragmentStream, LlmError};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Incremental line decoder. Holds any partial trailing line between chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    finished: bool,
}

impl SseDecoder {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds one body chunk and returns the text fragments of every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, LlmError> {
        self.buffer.extend_from_slice(chunk);
        let mut fragments = Vec::new();

        while !self.finished {
            let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line = self.buffer.split_to(newline + 1);
            self.handle_line(&line, &mut fragments)?;
        }

        Ok(fragments)
    }

    /// Processes whatever is left once the body has ended.
    pub fn flush(&mut self) -> Result<Vec<String>, LlmError> {
        let mut fragments = Vec::new();
        if !self.finished && !self.buffer.is_empty() {
            let line = self.buffer.split();
            self.handle_line(&line, &mut fragments)?;
        }
        self.finished = true;
        Ok(fragments)
    }

    fn handle_line(&mut self, line: &[u8], fragments: &mut Vec<String>) -> Result<(), LlmError> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);

        // Comments, event names and blank separators carry no content.
        let Some(payload) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(());
        }
        if payload == DONE_SENTINEL {
            self.finished = true;
            return Ok(());
        }

        let chunk: StreamChunk = serde_json::from_str(payload)?;
        if let Some(error) = chunk.error {
            self.finished = true;
            return Err(LlmError::Stream(error.message));
        }
        fragments.extend(
            chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .filter(|content| !content.is_empty()),
        );
        Ok(())
    }
}

struct FragmentState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
}

/// Adapts a raw response body into a stream of text fragments.
///
/// The stream ends after `[DONE]`, at end of body, or right after the first error.
/// Dropping it drops `body`, which releases the underlying connection.
pub fn fragments<S, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state = FragmentState {
        body: body.boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.decoder.is_finished() {
                return None;
            }

            let decoded = match state.body.next().await {
                Some(Ok(chunk)) => state.decoder.feed(&chunk),
                Some(Err(e)) => Err(e.into()),
                None => state.decoder.flush(),
            };

            match decoded {
                Ok(fragments) => state.pending.extend(fragments),
                Err(e) => {
                    state.pending.clear();
                    state.decoder.finished = true;
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}
