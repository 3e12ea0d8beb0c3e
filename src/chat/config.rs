//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the validated,
//! immutable [`Config`] built from it once at startup.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_LIST_TIMEOUT, DEFAULT_STREAM_TIMEOUT};
use crate::error::{Error, Result};
use crate::payload::DecodingOptions;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default maximum tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 3000;

/// Default nucleus-sampling value.
pub const DEFAULT_TOP_P: f64 = 0.9;

/// Default number of conversational turns kept in context.
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Longest message, in characters, accepted from the user or kept from the
/// model.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 50_000;

/// Largest image accepted by `/upload`.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// System prompt used unless one is given or disabled.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant running in a command-line interface.";

/// Command-line arguments for polychat.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Run without any system prompt.
    #[arrrg(flag, "Disable the system prompt")]
    pub no_system: bool,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0-2 (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 3000)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling.
    #[arrrg(optional, "Top-p 0-1 (default: 0.9)", "P")]
    pub top_p: Option<String>,

    /// Conversational turns kept in context.
    #[arrrg(optional, "Turns kept in context (default: 20)", "TURNS")]
    pub max_history: Option<usize>,

    /// Enable Gemini's built-in tools without asking.
    #[arrrg(flag, "Enable Gemini tool calling (web search, URL context)")]
    pub tools: bool,

    /// Start with reasoning output hidden.
    #[arrrg(flag, "Hide reasoning/thinking output")]
    pub hide_thinking: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Sampling controls sent with every request.
    pub decoding: DecodingOptions,

    /// Conversational turns kept in context, excluding the system turn.
    pub max_history: usize,

    /// Longest message in characters.
    pub max_message_length: usize,

    /// Largest attachable image in bytes.
    pub max_image_bytes: u64,

    /// System prompt; `None` disables it.
    pub system_prompt: Option<String>,

    /// Whether reasoning is displayed at startup.
    pub show_thinking: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Enable Gemini tools without prompting.
    pub tools: bool,

    /// Time allowed for one streamed exchange.
    pub stream_timeout: Duration,

    /// Time allowed for a model listing.
    pub list_timeout: Duration,
}

impl Config {
    /// Checks every range-limited option.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "temperature",
            self.decoding.temperature,
            0.0,
            2.0,
        )?;
        check_range("top_p", self.decoding.top_p, 0.0, 1.0)?;
        check_range(
            "max_tokens",
            f64::from(self.decoding.max_tokens),
            1.0,
            1_000_000.0,
        )?;
        if self.max_history == 0 {
            return Err(Error::configuration(
                "max_history must be at least 1",
                Some("max_history".to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decoding: DecodingOptions {
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: DEFAULT_MAX_TOKENS,
                top_p: DEFAULT_TOP_P,
            },
            max_history: DEFAULT_MAX_HISTORY,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            show_thinking: true,
            use_color: true,
            tools: false,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            list_timeout: DEFAULT_LIST_TIMEOUT,
        }
    }
}

impl TryFrom<ChatArgs> for Config {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let defaults = Config::default();
        let system_prompt = if args.no_system {
            None
        } else {
            args.system
                .or(defaults.system_prompt)
                .filter(|prompt| !prompt.is_empty())
        };
        let config = Config {
            decoding: DecodingOptions {
                temperature: parse_float("temperature", args.temperature)?
                    .unwrap_or(DEFAULT_TEMPERATURE),
                max_tokens: args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                top_p: parse_float("top_p", args.top_p)?.unwrap_or(DEFAULT_TOP_P),
            },
            max_history: args.max_history.unwrap_or(DEFAULT_MAX_HISTORY),
            system_prompt,
            show_thinking: !args.hide_thinking,
            use_color: !args.no_color,
            tools: args.tools,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_float(name: &str, value: Option<String>) -> Result<Option<f64>> {
    value
        .map(|raw| {
            raw.trim().parse::<f64>().map_err(|_| {
                Error::configuration(
                    format!("{name}={raw} is not a number"),
                    Some(name.to_string()),
                )
            })
        })
        .transpose()
}

fn check_range(name: &str, value: f64, lo: f64, hi: f64) -> Result<()> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(Error::configuration(
            format!("{name}={value} must be between {lo} and {hi}"),
            Some(name.to_string()),
        ))
    }
}
