//! Conversation data types and provider wire shapes.

mod image_attachment;
mod part;
mod role;
mod stream_chunk;
mod turn;
mod wire;

pub use image_attachment::{ImageAttachment, SUPPORTED_MIME_TYPES};
pub use part::{ImagePart, Part};
pub use role::Role;
pub use stream_chunk::{
    CandidateContent, ChatCompletionChunk, ChunkChoice, ChunkDelta, GeminiCandidate, GeminiChunk,
    OllamaChunk, OllamaMessage, PromptFeedback, SafetyRating,
};
pub use turn::{Turn, TurnContent};
pub use wire::{
    ChatCompletionRequest, ChatMessage, ContentPart, EmptyObject, GeminiContent, GeminiPart,
    GeminiRequest, GeminiTool, GenerationConfig, ImageUrl, InlineData, MessageContent,
    OllamaOptions, RequestBody, StoredTurn, WireTurn,
};
