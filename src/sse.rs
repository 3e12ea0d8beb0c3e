//! Line framing for streamed provider responses.
//!
//! Both wire formats are line oriented: server-sent events carry one
//! `data: <json>` line per chunk and end with `data: [DONE]`, while the
//! newline-delimited format carries one bare JSON object per line.  This
//! module turns a raw byte stream into a stream of [`Frame`]s and silently
//! drops every line that is neither.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::Result;
use crate::observability::{STREAM_BYTES, STREAM_LINES, STREAM_SKIPPED_LINES};

/// One meaningful line of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A JSON object carried by a `data:` line or a bare NDJSON line.
    Json(Value),
    /// The `data: [DONE]` terminator.
    Done,
}

/// Process a stream of bytes into a stream of frames.
///
/// Bytes are buffered and split on `\n` before being decoded, so a
/// multi-byte character cut across two reads is decoded whole.  A final
/// line without a trailing newline is still processed when the byte stream
/// ends.  Transport errors are passed through unchanged.
pub fn process_lines<S>(byte_stream: S) -> impl Stream<Item = Result<Frame>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (byte_stream, buffer, false),
        move |(mut byte_stream, mut buffer, mut eof)| async move {
            loop {
                // First drain complete lines already buffered.
                if let Some(line) = take_line(&mut buffer, eof) {
                    match classify_line(&line) {
                        Some(frame) => return Some((Ok(frame), (byte_stream, buffer, eof))),
                        None => continue,
                    }
                }
                if eof {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(err)) => {
                        return Some((Err(err), (byte_stream, buffer, eof)));
                    }
                    None => eof = true,
                }
            }
        },
    )
}

/// Removes the next line from `buffer`.  Once the byte stream has ended the
/// unterminated remainder counts as a line.
fn take_line(buffer: &mut Vec<u8>, eof: bool) -> Option<String> {
    let raw: Vec<u8> = match buffer.iter().position(|&b| b == b'\n') {
        Some(idx) => {
            let mut line: Vec<u8> = buffer.drain(..=idx).collect();
            line.pop();
            line
        }
        None if eof && !buffer.is_empty() => std::mem::take(buffer),
        None => return None,
    };
    let mut line = String::from_utf8_lossy(&raw).into_owned();
    if line.ends_with('\r') {
        line.pop();
    }
    Some(line)
}

/// Classifies one line.  Returns `None` for lines that carry nothing.
pub fn classify_line(line: &str) -> Option<Frame> {
    let payload = if let Some(rest) = line.strip_prefix("data:") {
        let rest = rest.trim();
        if rest == "[DONE]" {
            return Some(Frame::Done);
        }
        rest
    } else if line.starts_with('{') {
        line
    } else {
        if !line.trim().is_empty() {
            skipped(line);
        }
        return None;
    };

    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) if value.is_object() => {
            STREAM_LINES.click();
            Some(Frame::Json(value))
        }
        _ => {
            skipped(line);
            None
        }
    }
}

fn skipped(line: &str) {
    STREAM_SKIPPED_LINES.click();
    tracing::debug!(line = %line, "skipping unrecognized stream line");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    async fn frames(chunks: Vec<&'static [u8]>) -> Vec<Result<Frame>> {
        let byte_stream = stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))));
        process_lines(byte_stream).collect().await
    }

    #[tokio::test]
    async fn parse_data_lines() {
        let frames = frames(vec![&b"data: {\"a\":1}\n\ndata: [DONE]\n"[..]]).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap(), &Frame::Json(json!({"a": 1})));
        assert_eq!(frames[1].as_ref().unwrap(), &Frame::Done);
    }

    #[tokio::test]
    async fn parse_bare_json_lines() {
        let frames = frames(vec![&b"{\"done\":false}\n{\"done\":true}\n"[..]]).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1].as_ref().unwrap(),
            &Frame::Json(json!({"done": true}))
        );
    }

    #[tokio::test]
    async fn handle_split_line() {
        let frames = frames(vec![&b"data: {\"te"[..], &b"xt\":\"hi\"}\r"[..], &b"\n"[..]]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].as_ref().unwrap(),
            &Frame::Json(json!({"text": "hi"}))
        );
    }

    #[tokio::test]
    async fn multibyte_character_split_across_reads() {
        // "é" is 0xC3 0xA9.
        let frames = frames(vec![&b"{\"t\":\"caf\xC3"[..], &b"\xA9\"}\n"[..]]).await;
        assert_eq!(
            frames[0].as_ref().unwrap(),
            &Frame::Json(json!({"t": "café"}))
        );
    }

    #[tokio::test]
    async fn trailing_line_without_newline() {
        let frames = frames(vec![&b"{\"a\":1}\n{\"b\":2}"[..]]).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_ref().unwrap(), &Frame::Json(json!({"b": 2})));
    }

    #[tokio::test]
    async fn skip_noise() {
        let frames = frames(vec![
            &b": keep-alive\nevent: ping\ndata: not json\ndata: [1,2]\n{broken\n\ndata:\n"[..],
        ])
        .await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_forwarded() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n")),
            Err(Error::streaming("reset", None)),
        ];
        let frames: Vec<Result<Frame>> = process_lines(stream::iter(chunks)).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(frames[1].is_err());
    }
}
