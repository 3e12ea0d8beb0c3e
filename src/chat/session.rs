//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation,
//! sends each user message, and commits the reply or rolls the turn back.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::chat::config::Config;
use crate::client::ChatTransport;
use crate::error::{Error, Result};
use crate::history::Conversation;
use crate::observability::{SESSION_REPLY_CHARS, SESSION_ROLLBACKS, SESSION_TURNS, STREAM_INTERRUPTS};
use crate::payload::{assistant_turn, build_request_body, build_user_turn};
use crate::provider::Provider;
use crate::render::Renderer;
use crate::session_store::SessionStore;
use crate::stream::{Reply, StreamNormalizer, StreamOptions};
use crate::types::{ImageAttachment, Turn};

/// Message sent when the user attaches an image and types nothing.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail.";

/// What happened to one message sent through [`ChatSession::send`].
///
/// Every outcome has already been reported through the renderer.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Empty input with no image; nothing was sent.
    Skipped,

    /// The input was refused before the conversation changed.
    Rejected(Error),

    /// The reply was recorded.
    Replied(Reply),

    /// The provider answered with nothing; the user turn was rolled back.
    Empty,

    /// The user interrupted before any reply text arrived; the user turn was
    /// rolled back.
    Interrupted,

    /// The request or stream failed; the user turn was rolled back.
    Failed(Error),
}

/// A chat session that manages conversation state and provider requests.
pub struct ChatSession<T: ChatTransport> {
    transport: T,
    provider: Provider,
    model: String,
    config: Config,
    store: SessionStore,
    conversation: Conversation,
    image: Option<ImageAttachment>,
    is_first: bool,
    show_thinking: bool,
    tools_enabled: bool,
}

impl<T: ChatTransport> ChatSession<T> {
    /// Creates a new chat session for `model` on `provider`.
    pub fn new(
        transport: T,
        provider: Provider,
        model: impl Into<String>,
        config: Config,
        store: SessionStore,
    ) -> Self {
        let conversation =
            Conversation::initialize(config.system_prompt.as_deref(), provider.family());
        Self {
            transport,
            provider,
            model: model.into(),
            show_thinking: config.show_thinking,
            tools_enabled: config.tools && provider.supports_tools(),
            config,
            store,
            conversation,
            image: None,
            is_first: true,
        }
    }

    /// Enables or disables the provider's built-in tools.  Ignored for
    /// providers without them.
    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled && self.provider.supports_tools();
        self
    }

    /// Sends a user message and streams the response.
    ///
    /// The user turn is appended before the request and removed again
    /// unless a reply is recorded, so a failed exchange leaves the
    /// conversation as it was.
    pub async fn send(
        &mut self,
        input: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let input = input.trim();
        if input.is_empty() && self.image.is_none() {
            return TurnOutcome::Skipped;
        }
        let text = if input.is_empty() {
            DEFAULT_IMAGE_PROMPT
        } else {
            input
        };
        let length = text.chars().count();
        if length > self.config.max_message_length {
            let err = Error::validation(
                format!(
                    "Message too long ({length} chars, max {}).",
                    self.config.max_message_length
                ),
                Some("input".to_string()),
            );
            renderer.print_error(&err.to_string());
            return TurnOutcome::Rejected(err);
        }

        let family = self.provider.family();
        let image = self.image.take();
        let was_first = self.is_first;
        let turn = build_user_turn(
            text,
            image.as_ref(),
            family,
            self.config.system_prompt.as_deref(),
            was_first,
        );
        self.is_first = false;
        self.conversation.append(turn);
        let dropped = self
            .conversation
            .trim(self.config.max_history, family.requires_alternation());
        if dropped > 0 {
            tracing::debug!(dropped, "trimmed conversation to the history limit");
        }

        let body = build_request_body(
            self.provider,
            &self.model,
            &self.conversation,
            &self.config.decoding,
            self.tools_enabled,
        );
        renderer.start_response();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.transport.open_stream(&self.model, &body) => Some(opened),
        };
        let result = match opened {
            None => {
                STREAM_INTERRUPTS.click();
                renderer.print_interrupted(false);
                self.roll_back(renderer, was_first, "(User message rolled back)");
                return TurnOutcome::Interrupted;
            }
            Some(Err(err)) => Err(err),
            Some(Ok(stream)) => {
                let options = StreamOptions {
                    provider: self.provider,
                    show_thinking: self.show_thinking,
                    tools_enabled: self.tools_enabled,
                    max_message_length: self.config.max_message_length,
                };
                StreamNormalizer::new(options)
                    .run(stream, cancel, renderer)
                    .await
            }
        };

        match result {
            Ok(Some(reply)) => {
                self.conversation
                    .append(assistant_turn(&reply.text, family));
                SESSION_TURNS.click();
                SESSION_REPLY_CHARS.add(reply.text.chars().count() as f64);
                if reply.interrupted {
                    renderer.print_info("(Partial response saved to history)");
                }
                TurnOutcome::Replied(reply)
            }
            Ok(None) if cancel.is_cancelled() => {
                self.roll_back(renderer, was_first, "(User message rolled back)");
                TurnOutcome::Interrupted
            }
            Ok(None) => {
                self.roll_back(renderer, was_first, "(User message rolled back)");
                TurnOutcome::Empty
            }
            Err(err) => {
                renderer.print_error(&format!("Error: {err}"));
                self.roll_back(
                    renderer,
                    was_first,
                    "(User message rolled back due to error)",
                );
                TurnOutcome::Failed(err)
            }
        }
    }

    fn roll_back(&mut self, renderer: &mut dyn Renderer, was_first: bool, notice: &str) {
        if self.conversation.rollback() {
            SESSION_ROLLBACKS.click();
            tracing::warn!(provider = %self.provider, model = %self.model, "rolled back user turn");
            if was_first {
                self.is_first = true;
            }
            renderer.print_warning(notice);
        }
    }

    /// Flips reasoning display and returns the new setting.
    pub fn toggle_thinking(&mut self) -> bool {
        self.show_thinking = !self.show_thinking;
        self.show_thinking
    }

    pub fn show_thinking(&self) -> bool {
        self.show_thinking
    }

    /// Loads the image at `path` for the next message, replacing any image
    /// already attached.  On failure the previous attachment is kept.
    pub fn attach_image(&mut self, path: &str) -> Result<&ImageAttachment> {
        let image = ImageAttachment::load(path, self.config.max_image_bytes)?;
        Ok(self.image.insert(image))
    }

    /// Returns the image waiting for the next message.
    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }

    /// Drops the pending image.  Returns whether one was attached.
    pub fn clear_image(&mut self) -> bool {
        self.image.take().is_some()
    }

    /// Returns the conversation, oldest turn first.
    pub fn history(&self) -> &[Turn] {
        self.conversation.turns()
    }

    /// Writes the conversation as session `name`.
    pub fn save(&self, name: &str) -> Result<PathBuf> {
        self.store
            .save(name, self.conversation.turns(), self.provider)
    }

    /// Replaces the conversation with session `name` and returns the number
    /// of turns loaded.
    pub fn load(&mut self, name: &str) -> Result<usize> {
        let turns = self.store.load(name)?;
        let count = turns.len();
        self.conversation.replace(turns);
        self.is_first = false;
        Ok(count)
    }

    /// Lists saved session names.
    pub fn sessions(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    /// Deletes every saved session and returns the names removed.
    pub fn clear_sessions(&self) -> Result<Vec<String>> {
        self.store.clear()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tools_enabled(&self) -> bool {
        self.tools_enabled
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::Value;

    use super::*;
    use crate::client::ByteStream;
    use crate::types::{RequestBody, TurnContent};

    struct Scripted {
        replies: Mutex<VecDeque<Result<Vec<String>>>>,
        bodies: Mutex<Vec<Value>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Vec<&str>>>) -> Self {
            let replies = replies
                .into_iter()
                .map(|reply| reply.map(|lines| lines.iter().map(|l| format!("{l}\n")).collect()))
                .collect();
            Self {
                replies: Mutex::new(replies),
                bodies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for Scripted {
        async fn open_stream(&self, _model: &str, body: &RequestBody) -> Result<ByteStream> {
            self.bodies
                .lock()
                .unwrap()
                .push(serde_json::to_value(body).unwrap());
            let lines = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left")?;
            let chunks: Vec<Result<Bytes>> = lines.into_iter().map(|l| Ok(Bytes::from(l))).collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["scripted".to_string()])
        }
    }

    #[derive(Default)]
    struct Sink {
        errors: Vec<String>,
        warnings: Vec<String>,
        infos: Vec<String>,
    }

    impl Renderer for Sink {
        fn begin_reply(&mut self) {}
        fn print_text(&mut self, _text: &str) {}
        fn print_thinking(&mut self, _text: &str) {}
        fn print_tool_call(&mut self, _call: &str) {}
        fn print_warning(&mut self, warning: &str) {
            self.warnings.push(warning.to_string());
        }
        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }
        fn print_info(&mut self, info: &str) {
            self.infos.push(info.to_string());
        }
        fn finish_response(&mut self, _produced_output: bool) {}
    }

    fn scripted(provider: Provider, replies: Vec<Result<Vec<&str>>>) -> (tempfile::TempDir, ChatSession<Scripted>) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"));
        let session = ChatSession::new(
            Scripted::new(replies),
            provider,
            "test-model",
            Config::default(),
            store,
        );
        (dir, session)
    }

    const HELLO: [&str; 4] = [
        r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
        r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        "data: [DONE]",
    ];

    #[tokio::test]
    async fn reply_is_committed() {
        let (_dir, mut session) = scripted(Provider::Groq, vec![Ok(HELLO.to_vec())]);
        let mut sink = Sink::default();
        let outcome = session
            .send("hi", &mut sink, &CancellationToken::new())
            .await;
        let TurnOutcome::Replied(reply) = outcome else {
            panic!("expected a reply, got {outcome:?}");
        };
        assert_eq!(reply.text, "Hello");
        assert_eq!(reply.finish_reason.as_deref(), Some("stop"));
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.history()[2], Turn::assistant("Hello"));
    }

    #[tokio::test]
    async fn failure_rolls_back_user_turn() {
        let (_dir, mut session) = scripted(
            Provider::Groq,
            vec![Err(Error::api(Some(500), "boom"))],
        );
        let mut sink = Sink::default();
        let outcome = session
            .send("hi", &mut sink, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        assert_eq!(session.history().len(), 1);
        assert_eq!(sink.errors.len(), 1);
        assert_eq!(sink.warnings, vec!["(User message rolled back due to error)"]);
    }

    #[tokio::test]
    async fn empty_reply_rolls_back() {
        let (_dir, mut session) = scripted(Provider::Groq, vec![Ok(vec!["data: [DONE]"])]);
        let mut sink = Sink::default();
        let outcome = session
            .send("hi", &mut sink, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, TurnOutcome::Empty));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_opening() {
        let (_dir, mut session) = scripted(Provider::Groq, vec![Ok(HELLO.to_vec())]);
        let mut sink = Sink::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = session.send("hi", &mut sink, &cancel).await;
        assert!(matches!(outcome, TurnOutcome::Interrupted));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn blank_input_and_oversized_input() {
        let (_dir, mut session) = scripted(Provider::Groq, vec![]);
        let mut sink = Sink::default();
        let cancel = CancellationToken::new();
        assert!(matches!(
            session.send("   ", &mut sink, &cancel).await,
            TurnOutcome::Skipped
        ));
        let long = "x".repeat(50_001);
        assert!(matches!(
            session.send(&long, &mut sink, &cancel).await,
            TurnOutcome::Rejected(_)
        ));
        assert_eq!(session.history().len(), 1);
        assert!(sink.errors[0].contains("Message too long"));
    }

    #[tokio::test]
    async fn gemini_folds_system_prompt_into_first_turn_only() {
        let reply = r#"data: {"candidates":[{"content":{"parts":[{"text":"ok"}]},"finishReason":"STOP"}]}"#;
        let (_dir, mut session) = scripted(
            Provider::Gemini,
            vec![Ok(vec![reply]), Ok(vec![reply])],
        );
        let mut sink = Sink::default();
        let cancel = CancellationToken::new();
        session.send("one", &mut sink, &cancel).await;
        session.send("two", &mut sink, &cancel).await;

        let bodies = session.transport.bodies.lock().unwrap();
        let first = bodies[0]["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(first.ends_with("\n\nUser: one"));
        assert!(first.starts_with("You are a helpful assistant"));
        assert_eq!(bodies[1]["contents"][2]["parts"][0]["text"], "two");
        assert_eq!(bodies[1]["contents"][1]["role"], "model");
    }

    #[tokio::test]
    async fn failed_first_turn_keeps_the_prompt_for_the_retry() {
        let reply = r#"data: {"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#;
        let (_dir, mut session) = scripted(
            Provider::Gemini,
            vec![Err(Error::api(Some(503), "busy")), Ok(vec![reply])],
        );
        let mut sink = Sink::default();
        let cancel = CancellationToken::new();
        session.send("one", &mut sink, &cancel).await;
        session.send("one", &mut sink, &cancel).await;
        let bodies = session.transport.bodies.lock().unwrap();
        let text = bodies[1]["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.ends_with("\n\nUser: one"));
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let (_dir, mut session) = scripted(Provider::Groq, vec![Ok(HELLO.to_vec())]);
        let mut sink = Sink::default();
        session
            .send("hi", &mut sink, &CancellationToken::new())
            .await;
        session.save("chat").unwrap();
        assert_eq!(session.sessions().unwrap(), vec!["chat".to_string()]);

        let (_other_dir, mut other) = session_in(session.store().clone());
        assert_eq!(other.load("chat").unwrap(), 3);
        assert_eq!(other.history(), session.history());
        assert!(!other.is_first);
    }

    fn session_in(store: SessionStore) -> (tempfile::TempDir, ChatSession<Scripted>) {
        let dir = tempfile::tempdir().unwrap();
        let session = ChatSession::new(
            Scripted::new(vec![]),
            Provider::Groq,
            "test-model",
            Config::default(),
            store,
        );
        (dir, session)
    }

    #[test]
    fn toggles_and_images() {
        let (dir, mut session) = scripted(Provider::Gemini, vec![]);
        assert!(session.show_thinking());
        assert!(!session.toggle_thinking());
        assert!(session.toggle_thinking());

        assert!(session.attach_image("/definitely/not/here.png").is_err());
        assert!(session.image().is_none());

        let path = dir.path().join("dot.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let attached = session.attach_image(path.to_str().unwrap()).unwrap();
        assert_eq!(attached.mime_type, "image/png");
        assert!(session.clear_image());
        assert!(!session.clear_image());
    }

    #[tokio::test]
    async fn image_is_consumed_by_the_next_message() {
        let reply = r#"data: {"candidates":[{"content":{"parts":[{"text":"a cat"}]}}]}"#;
        let (dir, mut session) = scripted(Provider::Gemini, vec![Ok(vec![reply])]);
        let path = dir.path().join("cat.jpg");
        std::fs::write(&path, [0xff, 0xd8, 0xff]).unwrap();
        session.attach_image(path.to_str().unwrap()).unwrap();

        let mut sink = Sink::default();
        session
            .send("", &mut sink, &CancellationToken::new())
            .await;
        assert!(session.image().is_none());
        let TurnContent::Parts(parts) = &session.history()[0].content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert!(session.history()[0].text().unwrap().contains(DEFAULT_IMAGE_PROMPT));
    }

    #[test]
    fn tools_only_apply_to_gemini() {
        let (_dir, session) = scripted(Provider::Groq, vec![]);
        assert!(!session.with_tools(true).tools_enabled());
        let (_dir, session) = scripted(Provider::Gemini, vec![]);
        assert!(session.with_tools(true).tools_enabled());
    }
}
