//! Streaming response normalization.
//!
//! [`StreamNormalizer`] consumes the raw bytes of one streamed reply from
//! any provider, renders tokens as they arrive and produces the [`Reply`]
//! to record in the conversation.  Inline `<think>` regions are separated
//! on the fly by a [`ThinkSplitter`] and removed from the stored text.

use std::time::Instant;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::error::Error;
use crate::observability::{STREAM_DURATION, STREAM_ERRORS, STREAM_INTERRUPTS, STREAM_TRUNCATIONS};
use crate::provider::{Provider, ProviderFamily};
use crate::render::Renderer;
use crate::signal::{self, ABNORMAL_FINISH_REASONS, Signal};
use crate::sse::{Frame, process_lines};
use crate::strip::strip_think_tags;
use crate::think::{Segment, ThinkSplitter};

/// Per-request knobs for the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub provider: Provider,
    /// Render reasoning text as it arrives.
    pub show_thinking: bool,
    /// Echo requested tool calls.
    pub tools_enabled: bool,
    /// Longest reply, in characters, that is kept.
    pub max_message_length: usize,
}

/// The outcome of a successful stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Visible text with reasoning regions removed.
    pub text: String,
    /// Reasoning text, both native and inline.
    pub reasoning: String,
    /// The first non-empty finish reason reported.
    pub finish_reason: Option<String>,
    /// The user cancelled the stream; `text` is what arrived before that.
    pub interrupted: bool,
    /// The reply exceeded the length ceiling and was cut.
    pub truncated: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Drives one streamed reply to completion.
pub struct StreamNormalizer {
    options: StreamOptions,
    visible: String,
    reasoning: String,
    splitter: ThinkSplitter,
    prefix_written: bool,
    finish_reason: Option<String>,
    error: Option<Error>,
    interrupted: bool,
}

impl StreamNormalizer {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            options,
            visible: String::new(),
            reasoning: String::new(),
            splitter: ThinkSplitter::new(),
            prefix_written: false,
            finish_reason: None,
            error: None,
            interrupted: false,
        }
    }

    /// Consumes `byte_stream` until it ends, reports an error, or `cancel`
    /// fires.
    ///
    /// Returns `Ok(None)` when nothing worth recording arrived.  Errors are
    /// returned, not rendered; the renderer is left on a fresh line so the
    /// caller can report them.
    pub async fn run<S>(
        mut self,
        byte_stream: S,
        cancel: &CancellationToken,
        renderer: &mut dyn Renderer,
    ) -> Result<Option<Reply>>
    where
        S: Stream<Item = Result<Bytes>> + Unpin,
    {
        let start = Instant::now();
        let frames = process_lines(byte_stream);
        futures::pin_mut!(frames);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.interrupted = true;
                    break;
                }
                next = frames.next() => next,
            };
            let flow = match next {
                None | Some(Ok(Frame::Done)) => Flow::Stop,
                Some(Ok(Frame::Json(value))) => self.handle(&value, renderer),
                Some(Err(err)) => {
                    self.error = Some(err);
                    Flow::Stop
                }
            };
            if flow == Flow::Stop {
                break;
            }
        }
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        self.finish(renderer)
    }

    fn handle(&mut self, value: &serde_json::Value, renderer: &mut dyn Renderer) -> Flow {
        let signal = match signal::interpret(
            self.options.provider,
            self.options.tools_enabled,
            value,
        ) {
            Ok(signal) => signal,
            Err(err) => {
                self.error = Some(err);
                return Flow::Stop;
            }
        };
        let Signal {
            text,
            thinking,
            finish,
            tool_calls,
        } = signal;

        if !tool_calls.is_empty() {
            self.begin_reply(renderer);
            for call in &tool_calls {
                let pretty = serde_json::to_string_pretty(call).unwrap_or_else(|_| call.to_string());
                renderer.print_tool_call(&pretty);
            }
        }

        if self.finish_reason.is_none() {
            self.finish_reason = finish;
        }

        if !text.is_empty() || !thinking.is_empty() {
            self.begin_reply(renderer);
        }

        if !thinking.is_empty() {
            self.reasoning.push_str(&thinking);
            if self.options.show_thinking {
                renderer.print_thinking(&thinking);
            }
        }

        if !text.is_empty() {
            self.visible.push_str(&text);
            for segment in self.splitter.push(&text) {
                self.render_segment(segment, renderer);
            }
        }

        if self.options.provider.family() == ProviderFamily::Gemini
            && let Some(reason) = self
                .finish_reason
                .as_deref()
                .filter(|reason| ABNORMAL_FINISH_REASONS.contains(reason))
        {
            if self.visible.is_empty() {
                self.error = Some(Error::content_policy(
                    format!("Stream ended by API (reason: {reason})"),
                    reason,
                ));
            }
            return Flow::Stop;
        }

        if self.options.provider == Provider::Ollama && self.finish_reason.as_deref() == Some("stop")
        {
            return Flow::Stop;
        }
        Flow::Continue
    }

    fn begin_reply(&mut self, renderer: &mut dyn Renderer) {
        if !self.prefix_written {
            renderer.begin_reply();
            self.prefix_written = true;
        }
    }

    fn render_segment(&mut self, segment: Segment, renderer: &mut dyn Renderer) {
        let show = self.options.show_thinking;
        match segment {
            Segment::Visible(text) => renderer.print_text(&text),
            Segment::Reasoning(text) => {
                if show {
                    renderer.print_thinking(&text);
                }
                self.reasoning.push_str(&text);
            }
            Segment::ReasoningStart if show => renderer.start_reasoning(),
            Segment::ReasoningEnd if show => renderer.end_reasoning(),
            Segment::ReasoningStart | Segment::ReasoningEnd => {}
        }
    }

    fn finish(mut self, renderer: &mut dyn Renderer) -> Result<Option<Reply>> {
        if self.error.is_none() {
            for segment in self.splitter.finish() {
                self.render_segment(segment, renderer);
            }
        }

        if self.interrupted {
            STREAM_INTERRUPTS.click();
            renderer.print_interrupted(true);
        }
        if !self.prefix_written && self.error.is_none() && !self.interrupted {
            renderer.print_empty_response();
        } else {
            renderer.finish_response(self.prefix_written);
        }

        if let Some(err) = self.error {
            STREAM_ERRORS.click();
            return Err(err);
        }

        let mut truncated = false;
        let max = self.options.max_message_length;
        if let Some((cut, _)) = self.visible.char_indices().nth(max) {
            self.visible.truncate(cut);
            truncated = true;
            STREAM_TRUNCATIONS.click();
            tracing::warn!(max_chars = max, "reply truncated");
            renderer.print_warning(&format!("Response truncated at {max} characters."));
        }

        let text = strip_think_tags(&self.visible);
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(Reply {
            text,
            reasoning: self.reasoning,
            finish_reason: self.finish_reason,
            interrupted: self.interrupted,
            truncated,
        }))
    }
}
