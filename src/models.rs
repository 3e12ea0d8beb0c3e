//! Model catalogues: parsing each provider's listing and filtering it.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::provider::Provider;
use crate::render::ellipsize;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NamedModelList {
    #[serde(default)]
    models: Vec<NamedModel>,
}

#[derive(Debug, Deserialize)]
struct NamedModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DataModelList {
    #[serde(default)]
    data: Vec<ModelId>,
}

#[derive(Debug, Deserialize)]
struct ModelId {
    id: String,
}

/// Parses a model-listing response body into model identifiers.
///
/// Gemini lists only chat-capable, non-embedding models without their
/// `models/` prefix; Ollama keeps its order; every other provider's ids are
/// sorted.  Empty names are dropped.
pub fn parse_model_list(provider: Provider, body: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(body).map_err(|err| {
        Error::serialization(
            format!(
                "invalid JSON from model endpoint; raw (first 300): {}",
                ellipsize(body, 300)
            ),
            Some(Box::new(err)),
        )
    })?;

    if let Some(error) = value.get("error").filter(|error| is_truthy(error)) {
        let message = match error {
            Value::Object(map) => match map.get("message") {
                Some(Value::String(message)) => message.clone(),
                _ => error.to_string(),
            },
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return Err(Error::api(None, message));
    }

    let shape_error = |err: serde_json::Error| {
        Error::protocol(format!(
            "could not parse model list: {err}; raw (first 300): {}",
            ellipsize(body, 300)
        ))
    };

    let mut models = match provider {
        Provider::Gemini => {
            let list: GeminiModelList = serde_json::from_value(value).map_err(shape_error)?;
            list.models
                .into_iter()
                .filter(|model| {
                    model
                        .supported_generation_methods
                        .iter()
                        .any(|method| method.contains("generateContent"))
                        && !model.name.starts_with("models/embedding")
                })
                .map(|model| model.name.replace("models/", ""))
                .collect::<Vec<_>>()
        }
        Provider::Ollama => {
            let list: NamedModelList = serde_json::from_value(value).map_err(shape_error)?;
            list.models.into_iter().map(|model| model.name).collect()
        }
        Provider::Together if value.is_array() => {
            let ids: Vec<ModelId> = serde_json::from_value(value).map_err(shape_error)?;
            sorted_ids(ids)
        }
        _ => {
            let list: DataModelList = serde_json::from_value(value).map_err(shape_error)?;
            sorted_ids(list.data)
        }
    };
    models.retain(|model| !model.is_empty());
    Ok(models)
}

fn sorted_ids(ids: Vec<ModelId>) -> Vec<String> {
    let mut ids: Vec<String> = ids.into_iter().map(|model| model.id).collect();
    ids.sort();
    ids
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

/// Keeps the models matched by every filter.
///
/// A filter matches case-insensitively when it is not embedded in a longer
/// run of letters or digits: `3` matches `gpt-3` but not `13b`.
pub fn filter_models(models: Vec<String>, filters: &[String]) -> Result<Vec<String>> {
    if filters.is_empty() {
        return Ok(models);
    }
    let patterns = filters
        .iter()
        .map(|filter| {
            let pattern = format!(
                "(?:^|[^a-z0-9]){}(?:[^a-z0-9]|$)",
                regex::escape(&filter.to_lowercase())
            );
            Regex::new(&pattern).map_err(|err| {
                Error::validation(
                    format!("invalid model filter '{filter}': {err}"),
                    Some("filter".to_string()),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(models
        .into_iter()
        .filter(|model| {
            let lower = model.to_lowercase();
            patterns.iter().all(|pattern| pattern.is_match(&lower))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn gemini_listing() {
        let body = r#"{"models": [
            {"name": "models/gemini-2.5-pro", "supportedGenerationMethods": ["generateContent", "countTokens"]},
            {"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent", "generateContent"]},
            {"name": "models/aqa", "supportedGenerationMethods": ["generateAnswer"]}
        ]}"#;
        assert_eq!(
            parse_model_list(Provider::Gemini, body).unwrap(),
            strings(&["gemini-2.5-pro"])
        );
    }

    #[test]
    fn ollama_listing_keeps_order() {
        let body = r#"{"models": [{"name": "qwen3:8b"}, {"name": ""}, {"name": "gemma3:4b"}]}"#;
        assert_eq!(
            parse_model_list(Provider::Ollama, body).unwrap(),
            strings(&["qwen3:8b", "gemma3:4b"])
        );
    }

    #[test]
    fn together_accepts_array_or_data() {
        let array = r#"[{"id": "b"}, {"id": "a"}]"#;
        let data = r#"{"data": [{"id": "b"}, {"id": "a"}]}"#;
        assert_eq!(
            parse_model_list(Provider::Together, array).unwrap(),
            strings(&["a", "b"])
        );
        assert_eq!(
            parse_model_list(Provider::Together, data).unwrap(),
            strings(&["a", "b"])
        );
    }

    #[test]
    fn openai_style_listing_is_sorted() {
        let body = r#"{"object": "list", "data": [{"id": "llama-3.3-70b"}, {"id": "gemma2-9b-it"}]}"#;
        assert_eq!(
            parse_model_list(Provider::Groq, body).unwrap(),
            strings(&["gemma2-9b-it", "llama-3.3-70b"])
        );
    }

    #[test]
    fn listing_errors() {
        let err = parse_model_list(Provider::Groq, r#"{"error": {"message": "invalid key"}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "API error: invalid key");

        let err = parse_model_list(Provider::Groq, "<html>").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));

        let err = parse_model_list(Provider::Groq, r#"{"data": [{"name": "x"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn filters_match_at_word_boundaries() {
        let models = strings(&["gpt-3", "llama-13b", "llama-3-8b", "Qwen-3-Coder"]);
        assert_eq!(
            filter_models(models.clone(), &strings(&["3"])).unwrap(),
            strings(&["gpt-3", "llama-3-8b", "Qwen-3-Coder"])
        );
        assert_eq!(
            filter_models(models.clone(), &strings(&["llama", "8b"])).unwrap(),
            strings(&["llama-3-8b"])
        );
        assert_eq!(
            filter_models(models.clone(), &strings(&["qwen"])).unwrap(),
            strings(&["Qwen-3-Coder"])
        );
        assert_eq!(filter_models(models.clone(), &[]).unwrap(), models);
    }

    #[test]
    fn filters_are_literal() {
        let models = strings(&["a.b", "axb"]);
        assert_eq!(
            filter_models(models, &strings(&["a.b"])).unwrap(),
            strings(&["a.b"])
        );
    }
}
