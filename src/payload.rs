//! Provider-specific request bodies and turn shapes.
//!
//! Everything here is a pure mapping from provider-agnostic turns to the
//! JSON each protocol family expects, and back for session files.

use crate::history::Conversation;
use crate::provider::{DecodingPlacement, Provider, ProviderFamily};
use crate::types::{
    ChatCompletionRequest, ChatMessage, ContentPart, EmptyObject, GeminiContent, GeminiPart,
    GeminiRequest, GeminiTool, GenerationConfig, ImageAttachment, ImagePart, ImageUrl, InlineData,
    MessageContent, OllamaOptions, Part, RequestBody, Role, StoredTurn, Turn, TurnContent,
    WireTurn,
};
use crate::{Error, Result};

/// Sampling controls sent with every request.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DecodingOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

/// Builds the request body for one streamed exchange.
pub fn build_request_body(
    provider: Provider,
    model: &str,
    conversation: &Conversation,
    options: &DecodingOptions,
    tools_enabled: bool,
) -> RequestBody {
    match provider.family() {
        ProviderFamily::Gemini => {
            let contents = conversation
                .turns()
                .iter()
                .filter_map(gemini_content)
                .collect();
            let tools = if tools_enabled {
                vec![
                    GeminiTool::UrlContext(EmptyObject {}),
                    GeminiTool::GoogleSearch(EmptyObject {}),
                ]
            } else {
                Vec::new()
            };
            RequestBody::Gemini(GeminiRequest {
                contents,
                generation_config: GenerationConfig {
                    temperature: options.temperature,
                    max_output_tokens: options.max_tokens,
                    top_p: options.top_p,
                },
                tools,
            })
        }
        ProviderFamily::OpenAiCompatible => {
            let messages = conversation
                .turns()
                .iter()
                .map(|turn| chat_message(turn, provider))
                .collect();
            let mut request = ChatCompletionRequest {
                model: model.to_string(),
                messages,
                temperature: options.temperature,
                stream: true,
                max_tokens: None,
                top_p: None,
                options: None,
            };
            match provider.decoding_placement() {
                DecodingPlacement::TopLevel => {
                    request.max_tokens = Some(options.max_tokens);
                    request.top_p = Some(options.top_p);
                }
                DecodingPlacement::NestedOptions => {
                    request.options = Some(OllamaOptions {
                        num_predict: options.max_tokens,
                        top_p: options.top_p,
                    });
                }
                DecodingPlacement::Omitted => {}
            }
            RequestBody::ChatCompletion(request)
        }
    }
}

/// Builds the user turn for `text` and an optional image.
///
/// The alternation family has no system role, so on the first turn the
/// system prompt is folded into the text.  Its turns always use parts.
pub fn build_user_turn(
    text: &str,
    image: Option<&ImageAttachment>,
    family: ProviderFamily,
    system_prompt: Option<&str>,
    is_first: bool,
) -> Turn {
    let prompt = system_prompt.filter(|prompt| is_first && !prompt.is_empty());
    match family {
        ProviderFamily::Gemini => {
            let text = match (prompt, image) {
                (Some(prompt), Some(_)) => format!("{prompt}\n\n{text}"),
                (Some(prompt), None) => format!("{prompt}\n\nUser: {text}"),
                (None, _) => text.to_string(),
            };
            let mut parts = vec![Part::Text(text)];
            parts.extend(image.map(ImageAttachment::to_part));
            Turn::user_parts(parts)
        }
        ProviderFamily::OpenAiCompatible => match image {
            Some(image) => Turn::user_parts(vec![Part::Text(text.to_string()), image.to_part()]),
            None => Turn::user(text),
        },
    }
}

/// Builds the assistant turn recorded after a successful reply.
pub fn assistant_turn(text: &str, family: ProviderFamily) -> Turn {
    match family {
        ProviderFamily::Gemini => Turn::assistant_parts(vec![Part::Text(text.to_string())]),
        ProviderFamily::OpenAiCompatible => Turn::assistant(text),
    }
}

/// Renders a turn in `provider`'s wire shape.  System turns have no shape
/// in the alternation family.
pub fn wire_turn(turn: &Turn, provider: Provider) -> Option<WireTurn> {
    match provider.family() {
        ProviderFamily::Gemini => gemini_content(turn).map(WireTurn::Gemini),
        ProviderFamily::OpenAiCompatible => Some(WireTurn::Chat(chat_message(turn, provider))),
    }
}

/// Converts a turn read from a session file back into a [`Turn`].
pub fn turn_from_stored(stored: StoredTurn) -> Result<Turn> {
    if stored.role == Role::System {
        return match stored.content {
            Some(MessageContent::Text(text)) => Ok(Turn::system(text)),
            _ => Err(Error::validation(
                "system message missing string content",
                Some("content".to_string()),
            )),
        };
    }

    let content = match (stored.content, stored.parts) {
        (Some(MessageContent::Text(text)), _) if stored.images.is_empty() => {
            TurnContent::Text(text)
        }
        (Some(MessageContent::Text(text)), _) => {
            let mut parts = vec![Part::Text(text)];
            parts.extend(
                stored
                    .images
                    .into_iter()
                    .map(|data| Part::Image(ImagePart::from_base64_sniffed(data))),
            );
            TurnContent::Parts(parts)
        }
        (Some(MessageContent::Parts(content)), _) => TurnContent::Parts(
            content
                .into_iter()
                .map(|part| match part {
                    ContentPart::Text { text } => Ok(Part::Text(text)),
                    ContentPart::ImageUrl { image_url } => {
                        ImagePart::from_data_uri(&image_url.url).map(Part::Image)
                    }
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        (None, Some(parts)) => TurnContent::Parts(
            parts
                .into_iter()
                .map(|part| match part {
                    GeminiPart::Text(text) => Part::Text(text),
                    GeminiPart::InlineData(inline) => {
                        Part::Image(ImagePart::new(inline.mime_type, inline.data))
                    }
                })
                .collect(),
        ),
        (None, None) => {
            return Err(Error::validation(
                format!(
                    "message role='{}' has no content or parts",
                    stored.role.wire_name(ProviderFamily::OpenAiCompatible)
                ),
                Some("content".to_string()),
            ));
        }
    };
    Ok(Turn {
        role: stored.role,
        content,
    })
}

fn gemini_content(turn: &Turn) -> Option<GeminiContent> {
    if turn.role == Role::System {
        return None;
    }
    let parts = match &turn.content {
        TurnContent::Text(text) => vec![GeminiPart::Text(text.clone())],
        TurnContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => GeminiPart::Text(text.clone()),
                Part::Image(image) => GeminiPart::InlineData(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                }),
            })
            .collect(),
    };
    Some(GeminiContent {
        role: turn.role.wire_name(ProviderFamily::Gemini).to_string(),
        parts,
    })
}

fn chat_message(turn: &Turn, provider: Provider) -> ChatMessage {
    let (content, images) = match &turn.content {
        TurnContent::Text(text) => (MessageContent::Text(text.clone()), Vec::new()),
        TurnContent::Parts(parts) if turn.images().next().is_none() => {
            (MessageContent::Text(joined_text(parts)), Vec::new())
        }
        TurnContent::Parts(parts) if provider == Provider::Ollama => (
            MessageContent::Text(joined_text(parts)),
            turn.images().map(|image| image.data.clone()).collect(),
        ),
        TurnContent::Parts(parts) => (
            MessageContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        Part::Text(text) => ContentPart::Text { text: text.clone() },
                        Part::Image(image) => ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_uri(),
                            },
                        },
                    })
                    .collect(),
            ),
            Vec::new(),
        ),
    };
    ChatMessage {
        role: turn.role,
        content,
        images,
    }
}

fn joined_text(parts: &[Part]) -> String {
    parts
        .iter()
        .filter_map(Part::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::{json, to_value};

    use super::*;

    const OPTIONS: DecodingOptions = DecodingOptions {
        temperature: 0.7,
        max_tokens: 3000,
        top_p: 0.9,
    };

    fn image() -> ImageAttachment {
        ImageAttachment {
            path: PathBuf::from("/tmp/cat.png"),
            mime_type: "image/png".to_string(),
            data: "iVBORw0K".to_string(),
            size_bytes: 6,
        }
    }

    fn conversation(provider: Provider, turns: Vec<Turn>) -> Conversation {
        let mut conversation = Conversation::initialize(Some("sys"), provider.family());
        for turn in turns {
            conversation.append(turn);
        }
        conversation
    }

    #[test]
    fn gemini_body_drops_system_and_adds_tools() {
        let mut conversation = Conversation::default();
        conversation.append(Turn::system("ignored"));
        conversation.append(build_user_turn(
            "hi",
            None,
            ProviderFamily::Gemini,
            Some("sys"),
            true,
        ));
        conversation.append(assistant_turn("hello", ProviderFamily::Gemini));
        let body = build_request_body(Provider::Gemini, "gemini-pro", &conversation, &OPTIONS, true);
        assert_eq!(
            to_value(&body).unwrap(),
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "sys\n\nUser: hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]}
                ],
                "generationConfig": {"temperature": 0.7, "maxOutputTokens": 3000, "topP": 0.9},
                "tools": [{"urlContext": {}}, {"googleSearch": {}}]
            })
        );
    }

    #[test]
    fn gemini_body_without_tools_has_no_tools_key() {
        let conversation = conversation(Provider::Gemini, vec![Turn::user("hi")]);
        let body = build_request_body(Provider::Gemini, "m", &conversation, &OPTIONS, false);
        assert!(to_value(&body).unwrap().get("tools").is_none());
    }

    #[test]
    fn chat_body_top_level_controls() {
        let conversation = conversation(Provider::Groq, vec![Turn::user("hi")]);
        let body = build_request_body(Provider::Groq, "llama", &conversation, &OPTIONS, false);
        assert_eq!(
            to_value(&body).unwrap(),
            json!({
                "model": "llama",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.7,
                "stream": true,
                "max_tokens": 3000,
                "top_p": 0.9
            })
        );
    }

    #[test]
    fn together_omits_controls() {
        let conversation = conversation(Provider::Together, vec![Turn::user("hi")]);
        let value = to_value(build_request_body(
            Provider::Together,
            "m",
            &conversation,
            &OPTIONS,
            false,
        ))
        .unwrap();
        assert!(value.get("max_tokens").is_none());
        assert!(value.get("top_p").is_none());
        assert!(value.get("options").is_none());
    }

    #[test]
    fn ollama_nests_controls_and_images() {
        let turn = build_user_turn(
            "what is this",
            Some(&image()),
            ProviderFamily::OpenAiCompatible,
            Some("sys"),
            true,
        );
        let conversation = conversation(Provider::Ollama, vec![turn]);
        let value =
            to_value(build_request_body(Provider::Ollama, "llava", &conversation, &OPTIONS, false))
                .unwrap();
        assert_eq!(value["options"], json!({"num_predict": 3000, "top_p": 0.9}));
        assert!(value.get("max_tokens").is_none());
        assert_eq!(
            value["messages"][1],
            json!({"role": "user", "content": "what is this", "images": ["iVBORw0K"]})
        );
    }

    #[test]
    fn openai_image_parts() {
        let turn = build_user_turn(
            "what is this",
            Some(&image()),
            ProviderFamily::OpenAiCompatible,
            None,
            false,
        );
        let value = to_value(wire_turn(&turn, Provider::OpenRouter).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,iVBORw0K"}}
                ]
            })
        );
    }

    #[test]
    fn gemini_first_turn_with_image() {
        let turn = build_user_turn("look", Some(&image()), ProviderFamily::Gemini, Some("sys"), true);
        let value = to_value(wire_turn(&turn, Provider::Gemini).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "parts": [
                    {"text": "sys\n\nlook"},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw0K"}}
                ]
            })
        );
    }

    #[test]
    fn later_gemini_turns_skip_prompt() {
        let turn = build_user_turn("again", None, ProviderFamily::Gemini, Some("sys"), false);
        assert_eq!(turn, Turn::user_parts(vec![Part::Text("again".to_string())]));
        let turn = build_user_turn("first", None, ProviderFamily::Gemini, Some(""), true);
        assert_eq!(turn.text(), Some("first"));
    }

    #[test]
    fn system_turn_has_no_gemini_shape() {
        assert!(wire_turn(&Turn::system("x"), Provider::Gemini).is_none());
    }

    #[test]
    fn stored_turns_convert_back() {
        let stored: StoredTurn = serde_json::from_value(json!({
            "role": "model", "parts": [{"text": "hi"}, {"inlineData": {"mimeType": "image/gif", "data": "R0lG"}}]
        }))
        .unwrap();
        let turn = turn_from_stored(stored).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.images().count(), 1);

        let stored: StoredTurn = serde_json::from_value(json!({
            "role": "user", "content": "look", "images": ["iVBORw0K"]
        }))
        .unwrap();
        let turn = turn_from_stored(stored).unwrap();
        assert_eq!(turn.images().next().unwrap().mime_type, "image/png");

        let stored: StoredTurn = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}]
        }))
        .unwrap();
        assert!(turn_from_stored(stored).unwrap_err().is_validation());
    }

    #[test]
    fn wire_turn_round_trips_through_storage() {
        let turn = build_user_turn(
            "describe",
            Some(&image()),
            ProviderFamily::OpenAiCompatible,
            None,
            false,
        );
        for provider in [Provider::Groq, Provider::Ollama, Provider::Gemini] {
            let value = to_value(wire_turn(&turn, provider).unwrap()).unwrap();
            let stored: StoredTurn = serde_json::from_value(value).unwrap();
            assert_eq!(turn_from_stored(stored).unwrap(), turn, "{provider}");
        }
    }
}
