//! Retrieval-augmented chat over the timber corpus.

pub mod chunker;
pub mod gemini;
pub mod index;
pub mod memory;
pub mod prompt;
pub mod routes;
pub mod service;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chatbot not initialized")]
    NotInitialized,
    #[error("GOOGLE_API_KEY not found")]
    MissingApiKey,
    #[error("Dataset file '{0}' not found.")]
    DatasetMissing(String),
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid vector index: {0}")]
    Index(#[from] serde_json::Error),
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("URL parsing failed: {0}")]
    Url(#[from] url::ParseError),
    #[error("LLM service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Unexpected LLM response: {0}")]
    Response(String),
    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Text generation and embedding backend used by the chat pipeline.
#[allow(async_fn_in_trait)]
pub trait LanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String, ChatError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ChatError>;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError>;
}
