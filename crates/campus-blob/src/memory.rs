//! In-memory [`BlobStore`] for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{BlobError, BlobResult, BlobStore};

#[derive(Debug, Clone)]
struct Entry {
    content_type: String,
    public: bool,
    len: usize,
}

/// A process-local blob store. Cheap to clone; clones share contents.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    entries: Arc<Mutex<BTreeMap<String, Entry>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without going through `upload` (test convenience).
    pub fn put(&self, path: &str, content_type: &str) {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            Entry {
                content_type: content_type.to_string(),
                public: false,
                len: 0,
            },
        );
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        public: bool,
    ) -> BlobResult<()> {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            Entry {
                content_type: content_type.to_string(),
                public,
                len: bytes.len(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> BlobResult<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn delete_prefix(&self, prefix: &str) -> BlobResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let doomed: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn copy(&self, src: &str, dst: &str) -> BlobResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get(src)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(src.to_string()))?;
        entries.insert(dst.to_string(), entry);
        Ok(())
    }

    async fn exists(&self, path: &str) -> BlobResult<bool> {
        Ok(self.entries.lock().unwrap().contains_key(path))
    }

    async fn content_type(&self, path: &str) -> BlobResult<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(path)
            .map(|e| e.content_type.clone()))
    }

    async fn list_prefix(&self, prefix: &str) -> BlobResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn signed_upload_url(
        &self,
        path: &str,
        content_type: &str,
        ttl: Duration,
    ) -> BlobResult<String> {
        Ok(format!(
            "memory://upload/{path}?ct={content_type}&ttl={}",
            ttl.as_secs()
        ))
    }

    async fn signed_download_url(&self, path: &str, ttl: Duration) -> BlobResult<String> {
        if !self.entries.lock().unwrap().contains_key(path) {
            return Err(BlobError::NotFound(path.to_string()));
        }
        Ok(format!("memory://download/{path}?ttl={}", ttl.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaStore;

    #[tokio::test]
    async fn promote_moves_listed_files_and_clears_edit_folder() {
        let store = MemoryBlobStore::new();
        store.put("lesson_edits/l1/p1/0-a.png", "image/png");
        store.put("lesson_edits/l1/p1/1-b.png", "image/png");

        let media = MediaStore::new(store.clone());
        media
            .promote_edit_files("l1", &["lesson_edits/l1/p1/0-a.png".to_string()])
            .await
            .unwrap();

        assert!(store.contains("lessons/l1/p1/0-a.png"));
        // The unlisted leftover is dropped with the edit folder.
        assert!(!store.contains("lesson_edits/l1/p1/1-b.png"));
        assert!(!store.contains("lesson_edits/l1/p1/0-a.png"));
    }

    #[tokio::test]
    async fn duplicate_copies_the_whole_folder() {
        let store = MemoryBlobStore::new();
        store.put("lessons/old/p1/0-a.png", "image/png");
        store.put("lessons/old/thumbnail-x.png", "image/png");

        let media = MediaStore::new(store.clone());
        media.duplicate_lesson("old", "new").await.unwrap();

        assert!(store.contains("lessons/new/p1/0-a.png"));
        assert!(store.contains("lessons/new/thumbnail-x.png"));
        assert!(store.contains("lessons/old/p1/0-a.png"));
    }

    #[tokio::test]
    async fn delete_files_tolerates_missing_paths() {
        let store = MemoryBlobStore::new();
        store.put("lessons/l1/p1/0-a.png", "image/png");

        let media = MediaStore::new(store.clone());
        media
            .delete_files(&[
                "lessons/l1/p1/0-a.png".to_string(),
                "lessons/l1/p1/already-gone.png".to_string(),
            ])
            .await
            .unwrap();

        assert!(!store.contains("lessons/l1/p1/0-a.png"));
    }
}
