//! Request bodies and stored-turn shapes for both protocol families.

use serde::{Deserialize, Serialize};

use crate::types::Role;

///////////////////////////////////////////// Gemini ////////////////////////////////////////////

/// A turn in Gemini's `contents` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    /// `user` or `model`.
    pub role: String,

    /// The typed segments of the turn.
    pub parts: Vec<GeminiPart>,
}

/// One segment of a Gemini turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeminiPart {
    /// `{"text": …}`
    Text(String),

    /// `{"inlineData": {"mimeType": …, "data": …}}`
    InlineData(InlineData),
}

/// Inline binary payload of a Gemini part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Gemini's nested generation options.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_p: f64,
}

/// Empty JSON object used by Gemini's built-in tool declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmptyObject {}

/// A built-in Gemini tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GeminiTool {
    UrlContext(EmptyObject),
    GoogleSearch(EmptyObject),
}

/// Body of a `streamGenerateContent` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GeminiTool>,
}

//////////////////////////////////////// OpenAI-compatible ///////////////////////////////////////

/// A message in an OpenAI-compatible `messages` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,

    /// Ollama's native image list; base64 without a data-URI prefix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Message content: a string, or typed segments for multimodal turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A typed segment of multimodal message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Reference to an image, normally a data URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Ollama's nested decoding options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaOptions {
    pub num_predict: u32,
    pub top_p: f64,
}

/// Body of a streaming chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

/// A provider-specific request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Gemini(GeminiRequest),
    ChatCompletion(ChatCompletionRequest),
}

////////////////////////////////////////// Stored turns //////////////////////////////////////////

/// A turn as written to a session file, in the family's own shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireTurn {
    Gemini(GeminiContent),
    Chat(ChatMessage),
}

/// A turn as read back from a session file.  Either shape is accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredTurn {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub parts: Option<Vec<GeminiPart>>,
    #[serde(default)]
    pub images: Vec<String>,
}
