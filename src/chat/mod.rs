//! Chat application module for interactive conversations.
//!
//! This module provides the streaming REPL chat interface built on top of
//! the transport, payload and normalizer layers.  It supports:
//!
//! - Streaming responses with real-time token display
//! - Reasoning display that can be toggled mid-session
//! - Image attachments and saved sessions
//! - Slash commands for session control
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: conversation ownership, sending, commit and rollback
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, Config, DEFAULT_MAX_HISTORY, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_MESSAGE_LENGTH,
    DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
};
pub use session::{ChatSession, DEFAULT_IMAGE_PROMPT, TurnOutcome};
