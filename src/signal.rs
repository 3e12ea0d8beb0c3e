//! Interpretation of one parsed stream object.
//!
//! Each provider shape is reduced to a [`Signal`]: the text and reasoning
//! it adds, the finish reason it reports, any tool calls it requests, or
//! the error that ends the stream.

use serde_json::Value;

use crate::provider::{Provider, ProviderFamily};
use crate::types::{ChatCompletionChunk, GeminiChunk, OllamaChunk};
use crate::{Error, Result};

/// Gemini finish reasons that end the stream early.
pub const ABNORMAL_FINISH_REASONS: [&str; 3] = ["SAFETY", "RECITATION", "OTHER"];

/// What a single stream object contributes to the reply.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Signal {
    /// Visible text delta.  May contain inline reasoning markers.
    pub text: String,
    /// Native reasoning delta.
    pub thinking: String,
    /// Finish reason reported by this object, if any.
    pub finish: Option<String>,
    /// Function-call parts to echo; never executed.
    pub tool_calls: Vec<Value>,
}

/// Reduces one parsed JSON object to a [`Signal`].
///
/// An in-band error object, or a Gemini prompt block, is returned as
/// `Err` and ends the stream.  Objects of an unexpected shape produce an
/// empty signal.
pub fn interpret(provider: Provider, tools_enabled: bool, value: &Value) -> Result<Signal> {
    if let Some(message) = in_band_error(value) {
        return Err(Error::api(None, message));
    }
    match (provider.family(), provider) {
        (ProviderFamily::Gemini, _) => interpret_gemini(tools_enabled, value),
        (ProviderFamily::OpenAiCompatible, Provider::Ollama) => Ok(interpret_ollama(value)),
        (ProviderFamily::OpenAiCompatible, _) => Ok(interpret_chat_completion(value)),
    }
}

/// Extracts the message of an object-level `error` (object or string) or
/// string `detail` field.  Empty messages do not count.
pub fn in_band_error(value: &Value) -> Option<String> {
    let message = match (value.get("error"), value.get("detail")) {
        (Some(Value::Object(error)), _) => match error.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => Value::Object(error.clone()).to_string(),
        },
        (Some(Value::String(error)), _) => error.clone(),
        (_, Some(Value::String(detail))) => detail.clone(),
        _ => return None,
    };
    if message.is_empty() { None } else { Some(message) }
}

fn interpret_gemini(tools_enabled: bool, value: &Value) -> Result<Signal> {
    let chunk: GeminiChunk = serde_json::from_value(value.clone()).unwrap_or_default();

    if let Some(reason) = chunk
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
        .filter(|reason| !reason.is_empty())
    {
        return Err(Error::content_policy(
            format!("Content blocked (reason: {reason})"),
            reason,
        ));
    }

    let parts = chunk.parts();
    let text = parts
        .first()
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let candidate = chunk.first_candidate();
    let mut finish = candidate
        .and_then(|candidate| candidate.finish_reason.clone())
        .filter(|reason| !reason.is_empty() && reason != "null");
    if finish.is_none() {
        let blocked = candidate
            .and_then(|candidate| candidate.safety_ratings.as_ref())
            .is_some_and(|ratings| ratings.iter().any(|rating| rating.blocked == Some(true)));
        if blocked {
            finish = Some("SAFETY".to_string());
        }
    }

    let tool_calls = if tools_enabled {
        parts
            .iter()
            .filter(|part| part.get("functionCall").is_some())
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    Ok(Signal {
        text,
        thinking: String::new(),
        finish,
        tool_calls,
    })
}

fn interpret_ollama(value: &Value) -> Signal {
    let chunk: OllamaChunk = serde_json::from_value(value.clone()).unwrap_or_default();
    let message = chunk.message.unwrap_or_default();
    Signal {
        text: message.content.unwrap_or_default(),
        thinking: message.thinking.unwrap_or_default(),
        finish: (chunk.done == Some(true)).then(|| "stop".to_string()),
        tool_calls: Vec::new(),
    }
}

fn interpret_chat_completion(value: &Value) -> Signal {
    let chunk: ChatCompletionChunk = serde_json::from_value(value.clone()).unwrap_or_default();
    let Some(choice) = chunk.first_choice() else {
        return Signal::default();
    };
    let delta = choice.delta.clone().unwrap_or_default();
    Signal {
        text: delta.content.unwrap_or_default(),
        thinking: delta
            .reasoning
            .filter(|reasoning| !reasoning.is_empty())
            .or(delta.reasoning_content)
            .unwrap_or_default(),
        finish: choice.finish_reason.clone().filter(|reason| !reason.is_empty()),
        tool_calls: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_completion_delta() {
        let signal = interpret(
            Provider::Groq,
            false,
            &json!({"choices": [{"delta": {"content": "Hel"}, "finish_reason": null}]}),
        )
        .unwrap();
        assert_eq!(signal.text, "Hel");
        assert_eq!(signal.finish, None);
    }

    #[test]
    fn chat_completion_reasoning_alias() {
        let signal = interpret(
            Provider::Novita,
            false,
            &json!({"choices": [{"delta": {"reasoning_content": "hmm"}}]}),
        )
        .unwrap();
        assert_eq!(signal.thinking, "hmm");
    }

    #[test]
    fn ollama_done_finishes_with_stop() {
        let signal = interpret(
            Provider::Ollama,
            false,
            &json!({"message": {"content": "x", "thinking": "t"}, "done": true}),
        )
        .unwrap();
        assert_eq!(signal.text, "x");
        assert_eq!(signal.thinking, "t");
        assert_eq!(signal.finish.as_deref(), Some("stop"));
    }

    #[test]
    fn gemini_first_part_and_finish() {
        let signal = interpret(
            Provider::Gemini,
            false,
            &json!({"candidates": [{
                "content": {"parts": [{"text": "a"}, {"text": "b"}]},
                "finishReason": "STOP"
            }]}),
        )
        .unwrap();
        assert_eq!(signal.text, "a");
        assert_eq!(signal.finish.as_deref(), Some("STOP"));
    }

    #[test]
    fn gemini_blocked_rating_means_safety() {
        let signal = interpret(
            Provider::Gemini,
            false,
            &json!({"candidates": [{
                "content": {"parts": [{"text": ""}]},
                "safetyRatings": [{"category": "X", "blocked": true}]
            }]}),
        )
        .unwrap();
        assert_eq!(signal.finish.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn gemini_prompt_block_is_an_error() {
        let err = interpret(
            Provider::Gemini,
            false,
            &json!({"promptFeedback": {"blockReason": "PROHIBITED_CONTENT"}}),
        )
        .unwrap_err();
        assert!(err.is_content_policy());
        assert_eq!(err.to_string(), "Content blocked (reason: PROHIBITED_CONTENT)");
    }

    #[test]
    fn gemini_tool_calls_only_when_enabled() {
        let chunk = json!({"candidates": [{"content": {"parts": [
            {"functionCall": {"name": "search", "args": {"q": "rust"}}}
        ]}}]});
        assert_eq!(
            interpret(Provider::Gemini, true, &chunk).unwrap().tool_calls.len(),
            1
        );
        assert!(
            interpret(Provider::Gemini, false, &chunk)
                .unwrap()
                .tool_calls
                .is_empty()
        );
    }

    #[test]
    fn in_band_errors() {
        assert_eq!(
            in_band_error(&json!({"error": {"message": "overloaded"}})).as_deref(),
            Some("overloaded")
        );
        assert_eq!(
            in_band_error(&json!({"error": "bad key"})).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            in_band_error(&json!({"detail": "not found"})).as_deref(),
            Some("not found")
        );
        assert!(in_band_error(&json!({"error": {"code": 5}})).unwrap().contains("5"));
        assert_eq!(in_band_error(&json!({"error": ""})), None);
        assert_eq!(in_band_error(&json!({"choices": []})), None);

        let err = interpret(Provider::Groq, false, &json!({"error": "bad key"})).unwrap_err();
        assert_eq!(err.to_string(), "API error: bad key");
    }

    #[test]
    fn unexpected_shapes_are_empty() {
        let signal = interpret(Provider::OpenRouter, false, &json!({"choices": "nope"})).unwrap();
        assert_eq!(signal, Signal::default());
    }
}
