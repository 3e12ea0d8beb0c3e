//! Streamed response objects, one per protocol shape.
//!
//! Every field is optional: providers omit, null out and add fields
//! freely, and a chunk that does not fit is skipped rather than fatal.

use serde::Deserialize;
use serde_json::Value;

/// A Gemini `streamGenerateContent` chunk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiChunk {
    #[serde(default)]
    pub candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Option<Vec<SafetyRating>>,
}

/// Candidate parts are kept as raw JSON so function calls can be echoed verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SafetyRating {
    #[serde(default)]
    pub blocked: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GeminiChunk {
    pub fn first_candidate(&self) -> Option<&GeminiCandidate> {
        self.candidates.as_ref()?.first()
    }

    pub fn parts(&self) -> &[Value] {
        self.first_candidate()
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[])
    }
}

/// An OpenAI-compatible `chat.completion.chunk`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Option<Vec<ChunkChoice>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

impl ChatCompletionChunk {
    pub fn first_choice(&self) -> Option<&ChunkChoice> {
        self.choices.as_ref()?.first()
    }
}

/// A line of Ollama's native `/api/chat` stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaChunk {
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gemini_chunk_tolerates_nulls() {
        let chunk: GeminiChunk = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "hi"}]}, "finishReason": null}]
        }))
        .unwrap();
        assert_eq!(chunk.parts().len(), 1);
        assert!(chunk.first_candidate().unwrap().finish_reason.is_none());
    }

    #[test]
    fn chat_chunk_with_empty_delta() {
        let chunk: ChatCompletionChunk = serde_json::from_value(json!({
            "choices": [{"delta": {}, "finish_reason": "stop"}]
        }))
        .unwrap();
        let choice = chunk.first_choice().unwrap();
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));
        assert!(choice.delta.as_ref().unwrap().content.is_none());
    }

    #[test]
    fn ollama_done_line() {
        let chunk: OllamaChunk = serde_json::from_value(json!({
            "message": {"role": "assistant", "content": ""},
            "done": true
        }))
        .unwrap();
        assert_eq!(chunk.done, Some(true));
    }
}
