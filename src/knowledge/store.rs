//! Knowledge document storage
//!
//! Documents are read whole and written whole. `FsDocumentStore` writes to
//! a temporary file and renames it over the target so a reader never sees
//! a torn document.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Named text documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document; `None` if it does not exist
    async fn read(&self, name: &str) -> Result<Option<String>>;

    /// Replace a document's full text in one operation
    async fn write(&self, name: &str, text: &str) -> Result<()>;

    /// Names of all documents
    async fn list(&self) -> Result<Vec<String>>;
}

/// `<dir>/<name>.md` files on the local filesystem
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.contains("..")
        {
            return Err(Error::Knowledge(format!("invalid document name: {}", name)));
        }
        Ok(self.dir.join(format!("{}.md", name)))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, name: &str, text: &str) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = self
            .dir
            .join(format!(".{}.md.{}.tmp", name, uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, text).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path().join("knowledge"));

        assert!(store.read("customers").await.unwrap().is_none());
        store.write("customers", "# Customers\n").await.unwrap();
        assert_eq!(
            store.read("customers").await.unwrap().as_deref(),
            Some("# Customers\n")
        );

        store.write("customers", "# Replaced\n").await.unwrap();
        assert_eq!(
            store.read("customers").await.unwrap().as_deref(),
            Some("# Replaced\n")
        );
    }

    #[tokio::test]
    async fn test_list_only_markdown() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());
        store.write("priorities", "p").await.unwrap();
        store.write("customers", "c").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["customers", "priorities"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());
        assert!(store.write("../escape", "x").await.is_err());
        assert!(store.read("a/b").await.is_err());
        assert!(store.read("").await.is_err());
    }
}
