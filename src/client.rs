//! HTTP transport for chat requests and model listings.
//!
//! [`ChatTransport`] is the seam between the chat session and the network.
//! [`HttpTransport`] implements it with reqwest; tests substitute scripted
//! transports.

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use url::Url;

use crate::error::{Error, Result};
use crate::models::parse_model_list;
use crate::observability::{
    CLIENT_MODEL_LISTINGS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
};
use crate::provider::{Provider, ProviderFamily};
use crate::render::ellipsize;
use crate::types::RequestBody;

/// Time allowed for one streamed exchange, body included.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Time allowed for a model listing.
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// The raw body of a streamed response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can open chat streams and list models.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `body` and returns the response body as a byte stream once the
    /// provider has accepted the request.
    async fn open_stream(&self, model: &str, body: &RequestBody) -> Result<ByteStream>;

    /// Fetches the identifiers of the models the provider offers.
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Client for one provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    provider: Provider,
    api_key: String,
    client: ReqwestClient,
    chat_url: String,
    models_url: String,
    stream_timeout: Duration,
    list_timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport using the provider's public endpoints.
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(
            provider,
            api_key,
            None,
            DEFAULT_STREAM_TIMEOUT,
            DEFAULT_LIST_TIMEOUT,
        )
    }

    /// Create a new transport with custom settings.
    ///
    /// `endpoints` replaces the chat and model-listing URLs, e.g. to reach a
    /// local Ollama.  For Gemini the chat URL is a base that the model name
    /// is appended to.
    pub fn with_options(
        provider: Provider,
        api_key: impl Into<String>,
        endpoints: Option<(String, String)>,
        stream_timeout: Duration,
        list_timeout: Duration,
    ) -> Result<Self> {
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;
        let (chat_url, models_url) = endpoints.unwrap_or_else(|| {
            (
                provider.chat_url().to_string(),
                provider.models_url().to_string(),
            )
        });
        Ok(Self {
            provider,
            api_key: api_key.into(),
            client,
            chat_url,
            models_url,
            stream_timeout,
            list_timeout,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Returns the URL for a streamed chat request.
    fn chat_endpoint(&self, model: &str) -> Result<Url> {
        match self.provider.family() {
            ProviderFamily::Gemini => {
                let mut url = Url::parse(&format!(
                    "{}{model}:streamGenerateContent",
                    self.chat_url
                ))?;
                url.query_pairs_mut()
                    .append_pair("key", &self.api_key)
                    .append_pair("alt", "sse");
                Ok(url)
            }
            ProviderFamily::OpenAiCompatible => Ok(Url::parse(&self.chat_url)?),
        }
    }

    /// Returns the URL of the model listing.
    fn models_endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.models_url)?;
        if self.provider.family() == ProviderFamily::Gemini {
            url.query_pairs_mut().append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if self.provider.family() == ProviderFamily::OpenAiCompatible && !self.api_key.is_empty()
        {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|_| Error::authentication("API key contains invalid characters"))?;
            headers.insert(header::AUTHORIZATION, bearer);
        }
        if self.provider == Provider::OpenRouter {
            headers.insert("HTTP-Referer", HeaderValue::from_static("urn:polychat"));
            headers.insert("X-Title", HeaderValue::from_static("polychat"));
        }
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        let message = ellipsize(&body, 200);
        match status_code {
            401 | 403 => Error::authentication(format!("HTTP {status_code}: {message}")),
            _ => Error::api(Some(status_code), message),
        }
    }

    fn request_error(&self, e: reqwest::Error, timeout: Duration) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        Error::from_reqwest(e, Some(timeout.as_secs_f64()))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(&self, model: &str, body: &RequestBody) -> Result<ByteStream> {
        let url = self.chat_endpoint(model)?;
        tracing::debug!(
            provider = %self.provider,
            model = model,
            endpoint = %self.chat_url,
            "opening chat stream"
        );
        CLIENT_REQUESTS.click();
        let start = Instant::now();

        let timeout = self.stream_timeout;
        let response = self
            .client
            .post(url)
            .headers(self.default_headers()?)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e, timeout))?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| Error::from_reqwest(e, Some(timeout.as_secs_f64())))
        });
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.models_endpoint()?;
        tracing::debug!(provider = %self.provider, endpoint = %self.models_url, "listing models");
        CLIENT_MODEL_LISTINGS.click();

        let timeout = self.list_timeout;
        let mut request = self.client.get(url).timeout(timeout);
        if self.provider.family() == ProviderFamily::OpenAiCompatible {
            request = request.headers(self.default_headers()?);
        }
        let response = request
            .send()
            .await
            .map_err(|e| self.request_error(e, timeout))?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(e, timeout))?;
        parse_model_list(self.provider, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_chat_endpoint_carries_key_and_alt() {
        let transport = HttpTransport::new(Provider::Gemini, "k3y").unwrap();
        let url = transport.chat_endpoint("gemini-2.5-flash").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?key=k3y&alt=sse"
        );
        let headers = transport.default_headers().unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn bearer_header_only_with_key() {
        let transport = HttpTransport::new(Provider::Groq, "gsk_0123456789").unwrap();
        let headers = transport.default_headers().unwrap();
        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer gsk_0123456789"
        );

        let keyless = HttpTransport::new(Provider::Ollama, "").unwrap();
        assert!(
            keyless
                .default_headers()
                .unwrap()
                .get(header::AUTHORIZATION)
                .is_none()
        );
    }

    #[test]
    fn openrouter_sends_attribution_headers() {
        let transport = HttpTransport::new(Provider::OpenRouter, "sk-or-v1-abc").unwrap();
        let headers = transport.default_headers().unwrap();
        assert!(headers.get("HTTP-Referer").is_some());
        assert!(headers.get("X-Title").is_some());
    }

    #[test]
    fn gemini_models_endpoint_has_key() {
        let transport = HttpTransport::new(Provider::Gemini, "abc").unwrap();
        assert!(
            transport
                .models_endpoint()
                .unwrap()
                .as_str()
                .ends_with("/models?key=abc")
        );
    }

    #[test]
    fn invalid_key_characters_are_rejected() {
        let transport = HttpTransport::new(Provider::Groq, "bad\nkey").unwrap();
        assert!(transport.default_headers().unwrap_err().is_authentication());
    }
}
