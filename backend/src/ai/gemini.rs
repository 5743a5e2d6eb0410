//! Google Gemini `generateContent` client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{prompt, TypeInferrer, TypePrediction};
use crate::config::AiSettings;
use crate::error::{AiError, AiResult, RateLimitKind};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> AiResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AiError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn from_settings(settings: &AiSettings) -> AiResult<Self> {
        let key = settings.api_key.clone().ok_or(AiError::MissingApiKey)?;
        Self::new(key, settings.model.clone())
    }

    /// Point the client at another server (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send one prompt and return the concatenated answer text.
    pub async fn generate(&self, prompt: &str) -> AiResult<String> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 512,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<GeminiErrorBody>(&body).ok().map(|b| b.error);
            let exhausted = detail.as_ref().is_some_and(|d| d.status == "RESOURCE_EXHAUSTED");
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || exhausted {
                return Err(AiError::RateLimited(RateLimitKind::ProviderQuota));
            }
            return Err(AiError::ApiError(match detail {
                Some(detail) => detail.message,
                None => format!("HTTP {}: {}", status, body),
            }));
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AiError::InvalidResponse("Empty response".to_string()));
        }
        Ok(text.trim().to_string())
    }
}

impl TypeInferrer for GeminiClient {
    async fn infer(&self, prompt_text: &str, valid_types: &[String]) -> AiResult<TypePrediction> {
        let answer = self.generate(prompt_text).await?;
        Ok(TypePrediction {
            label: prompt::pick_label(&answer, valid_types),
            rationale: answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(GeminiClient::new("  ", "m"), Err(AiError::MissingApiKey)));
        assert!(matches!(
            GeminiClient::from_settings(&AiSettings::default()),
            Err(AiError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_infer_reads_candidate_text() {
        let router = Router::new().route(
            "/{model}",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["generationConfig"]["temperature"], json!(0.0));
                Json(json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": "VOC 유형: 장애\n이유: 접속 불가" }] }
                    }]
                }))
            }),
        );
        let base = serve(router).await;

        let client = GeminiClient::new("k", "gemini-test").unwrap().with_base_url(base);
        let prediction = client.infer("prompt", &["장애".to_string()]).await.unwrap();

        assert_eq!(prediction.label.as_deref(), Some("장애"));
        assert!(prediction.rationale.contains("접속 불가"));
    }

    #[tokio::test]
    async fn test_api_error_message_surfaced() {
        let router = Router::new().route(
            "/{model}",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({ "error": { "message": "API key not valid" } })),
                )
            }),
        );
        let base = serve(router).await;

        let client = GeminiClient::new("k", "gemini-test").unwrap().with_base_url(base);
        match client.generate("prompt").await {
            Err(AiError::ApiError(message)) => assert_eq!(message, "API key not valid"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quota_response_is_rate_limited() {
        let router = Router::new().route(
            "/{model}",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": { "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
                    })),
                )
            }),
        );
        let base = serve(router).await;

        let client = GeminiClient::new("k", "gemini-test").unwrap().with_base_url(base);
        assert!(matches!(
            client.generate("prompt").await,
            Err(AiError::RateLimited(RateLimitKind::ProviderQuota))
        ));
    }

    #[tokio::test]
    async fn test_enrichment_stops_at_provider_quota() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use crate::ai::{RateLimiter, TypeEnricher};
        use crate::models::{VocBatch, VocRow};
        use crate::reference::CodeMapping;

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/{model}",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        axum::http::StatusCode::TOO_MANY_REQUESTS,
                        Json(json!({
                            "error": { "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
                        })),
                    )
                }
            }),
        );
        let base = serve(router).await;

        let rows = (0..5)
            .map(|i| VocRow {
                line: i + 2,
                content: Some(format!("row {}", i)),
                ..Default::default()
            })
            .collect();
        let mut batch = VocBatch::new(rows);
        let dir = tempfile::tempdir().unwrap();

        let client = GeminiClient::new("k", "gemini-test").unwrap().with_base_url(base);
        let enricher = TypeEnricher::new(client, RateLimiter::unlimited(), dir.path()).with_delay(Duration::ZERO);
        let summary = enricher.enrich(&mut batch, &CodeMapping::from_pairs([("장애", "01")])).await;

        assert!(summary.stopped_by_limit);
        assert_eq!(summary.attempted, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
