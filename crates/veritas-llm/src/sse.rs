//! Server-sent event decoding for streamed chat completions.
//!
//! Bytes arrive in arbitrary chunks. Lines are buffered until complete, so
//! a multi-byte character or a JSON payload split across chunks is only
//! decoded once whole.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use veritas_rag::{RagError, TokenStream};

use crate::error::{LlmError, Result};

const SERVICE: &str = "chat model stream";

/// One decoded stream item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Token(String),
    Done,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// Incremental `data:` line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every event completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&String::from_utf8_lossy(&line))? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Decode whatever is left once the body ends without a trailing newline.
    pub fn finish(&mut self) -> Result<Option<SseEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
    }
}

/// Decode one line. Comments, blank lines, and non-data fields yield nothing.
pub fn decode_line(line: &str) -> Result<Option<SseEvent>> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| LlmError::decode(SERVICE, e))?;
    if value.get("error").is_some() {
        return Err(LlmError::Status {
            service: SERVICE,
            status: 200,
            message: crate::http::error_message(data),
        });
    }
    let chunk: CompletionChunk =
        serde_json::from_value(value).map_err(|e| LlmError::decode(SERVICE, e))?;
    let token: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();
    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(SseEvent::Token(token)))
    }
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Adapt a raw byte stream into a [`TokenStream`].
///
/// The stream ends at `[DONE]` or at the end of the body. A transport or
/// decoding error is yielded once and ends the stream.
pub fn token_stream<S, B, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(token) = st.pending.pop_front() {
                return Some((Ok(token), st));
            }
            if st.done {
                return None;
            }
            let events = match st.bytes.next().await {
                Some(Ok(chunk)) => st.decoder.feed(chunk.as_ref()),
                Some(Err(e)) => Err(e.into()),
                None => {
                    st.done = true;
                    st.decoder.finish().map(|e| e.into_iter().collect())
                }
            };
            match events {
                Ok(events) => {
                    for event in events {
                        match event {
                            SseEvent::Token(token) => st.pending.push_back(token),
                            SseEvent::Done => {
                                st.done = true;
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    st.done = true;
                    st.pending.clear();
                    return Some((Err(RagError::Model(e.to_string())), st));
                }
            }
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_decode_line_variants() {
        assert_eq!(decode_line(": keep-alive").unwrap(), None);
        assert_eq!(decode_line("").unwrap(), None);
        assert_eq!(decode_line("event: message").unwrap(), None);
        assert_eq!(decode_line("data: [DONE]").unwrap(), Some(SseEvent::Done));
        assert_eq!(
            decode_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            None
        );
        assert_eq!(
            decode_line("data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\r").unwrap(),
            Some(SseEvent::Token("Hi".to_string()))
        );
    }

    #[test]
    fn test_decode_line_rejects_garbage_and_errors() {
        assert!(matches!(
            decode_line("data: {not json"),
            Err(LlmError::Decode { .. })
        ));
        assert!(matches!(
            decode_line(r#"data: {"error": {"message": "overloaded"}}"#),
            Err(LlmError::Status { message, .. }) if message == "overloaded"
        ));
    }

    #[test]
    fn test_decoder_joins_split_lines() {
        let line = data("Grüße");
        let bytes = line.as_bytes();
        // Split inside the multi-byte character.
        let cut = line.find('ü').unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&bytes[..cut]).unwrap().is_empty());
        assert_eq!(
            decoder.feed(&bytes[cut..]).unwrap(),
            vec![SseEvent::Token("Grüße".to_string())]
        );
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn test_finish_decodes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: [DONE]").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), Some(SseEvent::Done));
    }

    #[tokio::test]
    async fn test_token_stream_stops_at_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", data("Hello"), data(" world"), data("ignored"));
        let (a, b) = body.split_at(10);
        let chunks = vec![
            Ok::<_, LlmError>(a.as_bytes().to_vec()),
            Ok(b.as_bytes().to_vec()),
        ];
        let tokens: Vec<String> = token_stream(futures::stream::iter(chunks))
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tokens, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_token_stream_without_done_ends_with_body() {
        let chunks = vec![Ok::<_, LlmError>(data("only").into_bytes())];
        let tokens: Vec<_> = token_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].as_ref().unwrap(), "only");
    }

    #[tokio::test]
    async fn test_token_stream_surfaces_decode_error_once() {
        let chunks = vec![
            Ok::<_, LlmError>(data("partial").into_bytes()),
            Ok(b"data: {broken\n".to_vec()),
            Ok(data("never").into_bytes()),
        ];
        let items: Vec<_> = token_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(RagError::Model(_))));
    }
}
