use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use tokio::sync::OnceCell;

use super::chunker::TextSplitter;
use super::index::{IndexedChunk, VectorIndex};
use super::memory::SessionStore;
use super::prompt::{condense_prompt, format_chat_history, qa_prompt};
use super::{ChatError, LanguageModel};
use crate::config::Settings;

pub struct ChatAnswer {
    pub answer: String,
    pub documents: Vec<IndexedChunk>,
}

/// Conversational retrieval over a loaded vector index.
pub struct ChatManager<M> {
    model: M,
    index: VectorIndex,
    retrieval_k: usize,
}

impl<M: LanguageModel> ChatManager<M> {
    pub fn new(model: M, index: VectorIndex, retrieval_k: usize) -> Self {
        Self {
            model,
            index,
            retrieval_k,
        }
    }

    /// Loads the persisted index, or builds and persists it from the dataset.
    pub async fn initialize(model: M, settings: &Settings) -> Result<Self, ChatError> {
        let index = match VectorIndex::load(&settings.index_path)? {
            Some(index) if !index.is_empty() => {
                info!("Existing vector index loaded ({} chunks)", index.len());
                index
            }
            _ => {
                info!("Creating new vector index from {}", settings.dataset_path);
                let index = build_index(&model, settings).await?;
                index.save(&settings.index_path)?;
                info!("Vector index created ({} chunks)", index.len());
                index
            }
        };
        Ok(Self::new(model, index, settings.retrieval_doc_k))
    }

    pub async fn get_response(
        &self,
        question: &str,
        session_id: &str,
        sessions: &SessionStore,
    ) -> Result<ChatAnswer, ChatError> {
        let history = sessions.history(session_id)?;
        let chat_history = format_chat_history(&history);

        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            let condensed = self
                .model
                .generate(&condense_prompt(&chat_history, question))
                .await?;
            log::debug!("Condensed follow-up to: {}", condensed);
            condensed
        };

        let query = self.model.embed_query(&standalone).await?;
        let documents: Vec<IndexedChunk> = self
            .index
            .top_k(&query, self.retrieval_k)
            .into_iter()
            .cloned()
            .collect();
        let context: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();

        let answer = self
            .model
            .generate(&qa_prompt(&chat_history, &context, &standalone))
            .await?;
        sessions.record(session_id, question, &answer)?;

        Ok(ChatAnswer { answer, documents })
    }
}

async fn build_index<M: LanguageModel>(model: &M, settings: &Settings) -> Result<VectorIndex, ChatError> {
    let text = fs::read_to_string(&settings.dataset_path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ChatError::DatasetMissing(settings.dataset_path.clone())
        } else {
            ChatError::Io {
                path: settings.dataset_path.clone(),
                source,
            }
        }
    })?;

    let chunks = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)
        .split_document(&text, &settings.dataset_path);
    if chunks.is_empty() {
        warn!("Dataset {} produced no chunks", settings.dataset_path);
    }
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = model.embed_documents(&texts).await?;
    VectorIndex::from_chunks(settings.embedding_model.clone(), chunks, embeddings)
}

/// Slot for a chat manager that finishes initializing after the server is up.
pub struct ChatHandle<M> {
    manager: OnceCell<ChatManager<M>>,
}

impl<M> Default for ChatHandle<M> {
    fn default() -> Self {
        Self {
            manager: OnceCell::new(),
        }
    }
}

impl<M> ChatHandle<M> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn ready(manager: ChatManager<M>) -> Self {
        Self {
            manager: OnceCell::new_with(Some(manager)),
        }
    }

    /// Returns false when a manager was already installed.
    pub fn set(&self, manager: ChatManager<M>) -> bool {
        self.manager.set(manager).is_ok()
    }

    pub fn get(&self) -> Result<&ChatManager<M>, ChatError> {
        self.manager.get().ok_or(ChatError::NotInitialized)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Embeds text as keyword counts and answers with a canned reply.
    #[derive(Default)]
    pub(crate) struct FakeModel {
        pub prompts: Mutex<Vec<String>>,
    }

    pub(crate) fn keyword_embedding(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        vec![
            lower.matches("teak").count() as f32,
            lower.matches("sal").count() as f32,
            0.1,
        ]
    }

    impl LanguageModel for FakeModel {
        async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.starts_with("Given the following conversation") {
                Ok("What is sal used for?".into())
            } else {
                Ok("Sal is used for railway sleepers.".into())
            }
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ChatError> {
            Ok(keyword_embedding(text))
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
            Ok(texts.iter().map(|t| keyword_embedding(t)).collect())
        }
    }

    pub(crate) fn corpus_index() -> VectorIndex {
        let docs = [
            "Teak is prized for furniture.",
            "Sal wood is used for railway sleepers.",
            "Gamari grows fast.",
        ];
        let chunks = docs
            .iter()
            .map(|d| super::super::chunker::Chunk {
                content: d.to_string(),
                metadata: serde_json::json!({ "source": "data/timber.txt" }),
            })
            .collect();
        let embeddings = docs.iter().map(|d| keyword_embedding(d)).collect();
        VectorIndex::from_chunks("fake", chunks, embeddings).unwrap()
    }

    #[actix_web::test]
    async fn first_question_is_answered_from_retrieved_context() {
        let manager = ChatManager::new(FakeModel::default(), corpus_index(), 1);
        let sessions = SessionStore::new(5, 60);

        let answer = manager
            .get_response("Tell me about sal", "s1", &sessions)
            .await
            .unwrap();
        assert_eq!(answer.documents.len(), 1);
        assert!(answer.documents[0].content.starts_with("Sal wood"));

        let prompts = manager.model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Sal wood is used for railway sleepers."));
        assert!(prompts[0].contains("User: Tell me about sal"));
        assert_eq!(sessions.history("s1").unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn follow_ups_are_condensed_first() {
        let manager = ChatManager::new(FakeModel::default(), corpus_index(), 2);
        let sessions = SessionStore::new(5, 60);
        sessions.record("s1", "Tell me about teak", "Teak is prized.").unwrap();

        manager.get_response("and that other one?", "s1", &sessions).await.unwrap();

        let prompts = manager.model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Follow Up Input: and that other one?"));
        assert!(prompts[1].contains("User: What is sal used for?"));
        assert!(prompts[1].contains("Human: Tell me about teak"));

        let history = sessions.history("s1").unwrap();
        assert_eq!(history[1].question, "and that other one?");
    }

    #[actix_web::test]
    async fn initialize_builds_then_reuses_the_index() {
        let dir = std::env::temp_dir().join(format!("timber-chat-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let mut settings = Settings::for_tests();
        settings.dataset_path = dir.join("timber.txt").display().to_string();
        settings.index_path = dir.join("index").join("index.json").display().to_string();

        let missing = ChatManager::initialize(FakeModel::default(), &settings).await;
        assert!(matches!(missing, Err(ChatError::DatasetMissing(_))));

        fs::write(&settings.dataset_path, "Teak is prized.\n\nSal is hard.").unwrap();
        let manager = ChatManager::initialize(FakeModel::default(), &settings).await.unwrap();
        assert_eq!(manager.index.len(), 1);

        fs::remove_file(&settings.dataset_path).unwrap();
        let reloaded = ChatManager::initialize(FakeModel::default(), &settings).await.unwrap();
        assert_eq!(reloaded.index.len(), 1);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn handle_reports_uninitialized_state() {
        let handle: ChatHandle<FakeModel> = ChatHandle::new();
        assert!(matches!(handle.get(), Err(ChatError::NotInitialized)));
        assert!(handle.set(ChatManager::new(FakeModel::default(), corpus_index(), 1)));
        assert!(handle.get().is_ok());
        assert!(!handle.set(ChatManager::new(FakeModel::default(), corpus_index(), 1)));
    }
}
