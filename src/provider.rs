//! The closed set of supported providers and their wire-protocol quirks.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A chat model provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Provider {
    Gemini,
    OpenRouter,
    Groq,
    Together,
    Cerebras,
    Novita,
    Ollama,
}

/// The two incompatible chat wire protocols.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    /// `contents`/`parts` shaped requests, no system role, strict
    /// user/model alternation.
    Gemini,
    /// `messages`/`content` shaped requests with a native system role.
    OpenAiCompatible,
}

/// Where sampling-cap and nucleus controls go in an OpenAI-compatible body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodingPlacement {
    /// `max_tokens` and `top_p` at the top level.
    TopLevel,
    /// `options.num_predict` and `options.top_p`.
    NestedOptions,
    /// Not sent at all; the backend rejects them.
    Omitted,
}

/// How the streamed response is framed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Framing {
    /// `data: <json>` lines terminated by `data: [DONE]`.
    Sse,
    /// One JSON object per line, terminated by `"done": true`.
    NdJson,
}

impl Provider {
    /// Every provider, in the order shown to users.
    pub const ALL: [Provider; 7] = [
        Provider::Gemini,
        Provider::OpenRouter,
        Provider::Groq,
        Provider::Together,
        Provider::Cerebras,
        Provider::Novita,
        Provider::Ollama,
    ];

    /// Returns the lowercase name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenRouter => "openrouter",
            Provider::Groq => "groq",
            Provider::Together => "together",
            Provider::Cerebras => "cerebras",
            Provider::Novita => "novita",
            Provider::Ollama => "ollama",
        }
    }

    pub fn family(&self) -> ProviderFamily {
        match self {
            Provider::Gemini => ProviderFamily::Gemini,
            _ => ProviderFamily::OpenAiCompatible,
        }
    }

    pub fn decoding_placement(&self) -> DecodingPlacement {
        match self {
            Provider::Ollama => DecodingPlacement::NestedOptions,
            Provider::Together => DecodingPlacement::Omitted,
            _ => DecodingPlacement::TopLevel,
        }
    }

    pub fn framing(&self) -> Framing {
        match self {
            Provider::Ollama => Framing::NdJson,
            _ => Framing::Sse,
        }
    }

    /// Base URL for chat requests.  For Gemini the model name and method
    /// are appended to it.
    pub fn chat_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/models/",
            Provider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            Provider::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Provider::Together => "https://api.together.ai/v1/chat/completions",
            Provider::Cerebras => "https://api.cerebras.ai/v1/chat/completions",
            Provider::Novita => "https://api.novita.ai/v3/openai/chat/completions",
            Provider::Ollama => "https://ollama.com/api/chat",
        }
    }

    /// URL of the model listing endpoint.
    pub fn models_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            Provider::OpenRouter => "https://openrouter.ai/api/v1/models",
            Provider::Groq => "https://api.groq.com/openai/v1/models",
            Provider::Together => "https://api.together.ai/v1/models",
            Provider::Cerebras => "https://api.cerebras.ai/v1/models",
            Provider::Novita => "https://api.novita.ai/v3/openai/models",
            Provider::Ollama => "https://ollama.com/api/tags",
        }
    }

    /// Name of the environment variable holding this provider's key.
    pub fn api_key_env(&self) -> String {
        format!("{}_API_KEY", self.name().to_uppercase())
    }

    /// Whether the tool-calling capability flag applies to this provider.
    pub fn supports_tools(&self) -> bool {
        self.family() == ProviderFamily::Gemini
    }

    /// Returns a reason when `key` looks empty, truncated or like a
    /// placeholder; `None` when it looks usable.
    pub fn placeholder_key_reason(&self, key: &str) -> Option<&'static str> {
        if key.is_empty() {
            return Some("is empty");
        }
        if key.starts_with("YOUR_") || key.ends_with("-HERE") || key.contains("...") {
            return Some("appears to be a placeholder");
        }
        match self {
            Provider::Gemini if key == "-" => Some("is the default placeholder '-'"),
            Provider::OpenRouter if key == "sk-or-v1-" => Some("is an incomplete OpenRouter key"),
            Provider::Groq if key.starts_with("gsk_") && key.len() < 10 => {
                Some("looks like an incomplete Groq key")
            }
            Provider::Cerebras if key == "csk-" => Some("is the bare Cerebras prefix"),
            Provider::Novita | Provider::Ollama if key.len() < 10 => {
                Some("is too short to be valid")
            }
            _ => None,
        }
    }
}

impl ProviderFamily {
    /// The alternation family must keep user/model pairs intact.
    pub fn requires_alternation(&self) -> bool {
        matches!(self, ProviderFamily::Gemini)
    }

    /// Whether the family carries the system prompt as its own turn.
    pub fn has_system_role(&self) -> bool {
        matches!(self, ProviderFamily::OpenAiCompatible)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        Provider::ALL
            .into_iter()
            .find(|provider| provider.name() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = Provider::ALL.iter().map(|p| p.name()).collect();
                Error::validation(
                    format!("unknown provider '{s}'. Choose from: {}", names.join(", ")),
                    Some("provider".to_string()),
                )
            })
    }
}
