use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::chunker::Chunk;
use super::ChatError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedChunk {
    pub content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// Embedded chunks persisted as a single JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    pub embedding_model: String,
    entries: Vec<IndexedChunk>,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (a, b) = (ArrayView1::from(a), ArrayView1::from(b));
    let norms = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if norms == 0.0 { 0.0 } else { a.dot(&b) / norms }
}

impl VectorIndex {
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            entries: Vec::new(),
        }
    }

    pub fn from_chunks(
        embedding_model: impl Into<String>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, ChatError> {
        if chunks.len() != embeddings.len() {
            return Err(ChatError::Response(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let mut index = Self::new(embedding_model);
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            index.push(chunk, embedding);
        }
        Ok(index)
    }

    pub fn push(&mut self, chunk: Chunk, embedding: Vec<f32>) {
        self.entries.push(IndexedChunk {
            content: chunk.content,
            metadata: chunk.metadata,
            embedding,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Ok(None)` when no index has been written yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, ChatError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ChatError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ChatError> {
        let path = path.as_ref();
        let io_error = |source| ChatError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, serde_json::to_vec(self)?).map_err(io_error)
    }

    /// The `k` entries most similar to `query`, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<&IndexedChunk> {
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(k).map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.into(),
            metadata: json!({ "source": "test" }),
        }
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn top_k_orders_by_similarity() {
        let index = VectorIndex::from_chunks(
            "models/embedding-001",
            vec![chunk("teak"), chunk("sal"), chunk("mixed")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
        .unwrap();

        let hits: Vec<&str> = index
            .top_k(&[1.0, 0.1], 2)
            .into_iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(hits, vec!["teak", "mixed"]);
        assert_eq!(index.top_k(&[1.0, 0.0], 10).len(), 3);
    }

    #[test]
    fn mismatched_embeddings_are_rejected() {
        let result = VectorIndex::from_chunks("m", vec![chunk("a")], vec![]);
        assert!(matches!(result, Err(ChatError::Response(_))));
    }

    #[test]
    fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("timber-index-{}", uuid::Uuid::new_v4()));
        let path = dir.join("index.json");
        assert!(VectorIndex::load(&path).unwrap().is_none());

        let mut index = VectorIndex::new("models/embedding-001");
        index.push(chunk("Gamari is used for furniture."), vec![0.5, 0.25]);
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.embedding_model, "models/embedding-001");
        assert_eq!(loaded.top_k(&[1.0, 0.0], 1)[0].content, "Gamari is used for furniture.");

        fs::remove_dir_all(dir).unwrap();
    }
}
