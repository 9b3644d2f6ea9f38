//! Versioned in-memory knowledge snapshot
//!
//! Readers take an `Arc<KnowledgeSnapshot>` and keep a consistent view for
//! as long as they hold it. `reload()` and document writes swap in a new
//! snapshot with a higher version.

use super::store::DocumentStore;
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Immutable view of every knowledge document
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSnapshot {
    /// Monotonic version, bumped on every change
    pub version: u64,
    /// Document name to full text
    pub documents: BTreeMap<String, String>,
}

impl KnowledgeSnapshot {
    /// Text of a document
    pub fn get(&self, name: &str) -> Option<&str> {
        self.documents.get(name).map(String::as_str)
    }
}

/// Owner of the current snapshot and the backing document store
pub struct KnowledgeBase {
    store: Arc<dyn DocumentStore>,
    current: RwLock<Arc<KnowledgeSnapshot>>,
}

impl KnowledgeBase {
    /// Create an empty knowledge base; call `reload()` to populate it
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(KnowledgeSnapshot::default())),
        }
    }

    /// Create and load
    pub async fn load(store: Arc<dyn DocumentStore>) -> Result<Self> {
        let base = Self::new(store);
        base.reload().await?;
        Ok(base)
    }

    /// The backing document store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        self.current.read().await.clone()
    }

    /// Re-read every document and publish a new snapshot, returning its version
    pub async fn reload(&self) -> Result<u64> {
        let mut documents = BTreeMap::new();
        for name in self.store.list().await? {
            if let Some(text) = self.store.read(&name).await? {
                documents.insert(name, text);
            }
        }

        let mut current = self.current.write().await;
        let version = current.version + 1;
        *current = Arc::new(KnowledgeSnapshot { version, documents });
        tracing::info!(
            version,
            documents = current.documents.len(),
            "Knowledge base reloaded"
        );
        Ok(version)
    }

    /// Publish new text for one document after it has been written
    pub async fn refresh_document(&self, name: &str, text: String) -> u64 {
        let mut current = self.current.write().await;
        let mut documents = current.documents.clone();
        documents.insert(name.to_string(), text);
        let version = current.version + 1;
        *current = Arc::new(KnowledgeSnapshot { version, documents });
        version
    }
}
