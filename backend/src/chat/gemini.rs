use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ChatError, LanguageModel};
use crate::config::Settings;

/// `batchEmbedContents` accepts at most this many requests per call.
const EMBED_BATCH: usize = 100;

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn user_content(text: &str) -> Content<'_> {
    Content {
        role: Some("user"),
        parts: vec![Part { text }],
    }
}

fn embed_content(text: &str) -> Content<'_> {
    Content {
        role: None,
        parts: vec![Part { text }],
    }
}

/// Client for the Gemini `generateContent` and embedding endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    llm_model: String,
    embedding_model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Result<Self, ChatError> {
        let api_key = settings
            .gemini_api_key
            .clone()
            .ok_or(ChatError::MissingApiKey)?;
        Ok(Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: settings.gemini_api_url.clone(),
            llm_model: model_path(&settings.llm_model),
            embedding_model: model_path(&settings.embedding_model),
            temperature: settings.llm_temperature,
        })
    }

    pub fn endpoint(&self, model: &str, method: &str) -> Result<Url, ChatError> {
        let mut url = Url::parse(&format!(
            "{}/{}:{}",
            self.api_url.trim_end_matches('/'),
            model,
            method
        ))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<R, ChatError> {
        let response = self.http_client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            log::error!("Gemini request failed with {}: {}", status, body);
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let url = self.endpoint(&self.llm_model, "generateContent")?;
        let request = GenerateRequest {
            contents: vec![user_content(prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };
        let response: GenerateResponse = self.post(url, &request).await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| ChatError::Response("no candidates returned".into()))?
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        Ok(text.trim().to_string())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ChatError> {
        let url = self.endpoint(&self.embedding_model, "embedContent")?;
        let request = EmbedRequest {
            model: &self.embedding_model,
            content: embed_content(text),
            task_type: "RETRIEVAL_QUERY",
        };
        let response: EmbedResponse = self.post(url, &request).await?;
        Ok(response.embedding.values)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            let url = self.endpoint(&self.embedding_model, "batchEmbedContents")?;
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedRequest {
                        model: &self.embedding_model,
                        content: embed_content(text),
                        task_type: "RETRIEVAL_DOCUMENT",
                    })
                    .collect(),
            };
            let response: BatchEmbedResponse = self.post(url, &request).await?;
            if response.embeddings.len() != batch.len() {
                return Err(ChatError::Response(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }
            embeddings.extend(response.embeddings.into_iter().map(|e| e.values));
            log::debug!("Embedded {}/{} chunks", embeddings.len(), texts.len());
        }
        Ok(embeddings)
    }
}
