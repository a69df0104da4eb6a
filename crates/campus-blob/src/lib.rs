//! Campus Blob — the blob-store boundary.
//!
//! The lifecycle machine only ever calls the store with paths it computed
//! itself through [`paths`]; caller-supplied paths are validated to sit
//! under the expected lesson folder before use. Upload/download URL
//! signing and the physical backend live outside this workspace.

pub mod memory;
pub mod paths;

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob backend error: {0}")]
    Backend(String),
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Operations the physical blob backend must provide.
pub trait BlobStore: Send + Sync {
    fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        public: bool,
    ) -> impl Future<Output = BlobResult<()>> + Send;

    fn delete(&self, path: &str) -> impl Future<Output = BlobResult<()>> + Send;

    /// Delete every blob under `prefix`; returns how many were removed.
    /// Deleting an empty prefix is not an error.
    fn delete_prefix(&self, prefix: &str) -> impl Future<Output = BlobResult<u64>> + Send;

    /// Copy a single blob, preserving content type and visibility.
    fn copy(&self, src: &str, dst: &str) -> impl Future<Output = BlobResult<()>> + Send;

    fn exists(&self, path: &str) -> impl Future<Output = BlobResult<bool>> + Send;

    /// Content type of a stored blob, `None` when absent.
    fn content_type(
        &self,
        path: &str,
    ) -> impl Future<Output = BlobResult<Option<String>>> + Send;

    fn list_prefix(&self, prefix: &str) -> impl Future<Output = BlobResult<Vec<String>>> + Send;

    fn signed_upload_url(
        &self,
        path: &str,
        content_type: &str,
        ttl: Duration,
    ) -> impl Future<Output = BlobResult<String>> + Send;

    fn signed_download_url(
        &self,
        path: &str,
        ttl: Duration,
    ) -> impl Future<Output = BlobResult<String>> + Send;
}

/// Lesson-level file operations composed from the raw [`BlobStore`]
/// primitives: whole-folder deletes, the edit→published migration, and
/// folder duplication.
#[derive(Clone)]
pub struct MediaStore<B: BlobStore> {
    blobs: B,
}

impl<B: BlobStore> MediaStore<B> {
    pub fn new(blobs: B) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Delete every file of a lesson, published and edit folders both.
    pub async fn delete_lesson(&self, lesson_id: &str) -> BlobResult<()> {
        self.blobs
            .delete_prefix(&paths::lesson_folder(paths::LESSONS, lesson_id))
            .await?;
        self.blobs
            .delete_prefix(&paths::lesson_folder(paths::LESSON_EDITS, lesson_id))
            .await?;
        Ok(())
    }

    pub async fn delete_edit_folder(&self, lesson_id: &str) -> BlobResult<()> {
        self.blobs
            .delete_prefix(&paths::lesson_folder(paths::LESSON_EDITS, lesson_id))
            .await?;
        Ok(())
    }

    pub async fn delete_part(&self, lesson_id: &str, part_id: &str, edit: bool) -> BlobResult<()> {
        let folder = if edit {
            paths::LESSON_EDITS
        } else {
            paths::LESSONS
        };
        self.blobs
            .delete_prefix(&paths::part_folder(folder, lesson_id, part_id))
            .await?;
        Ok(())
    }

    /// Delete the listed files, skipping paths that are already gone.
    pub async fn delete_files(&self, files: &[String]) -> BlobResult<()> {
        for file in files {
            match self.blobs.delete(file).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Move the listed edit-folder files into the published folder, then
    /// drop whatever remains of the edit folder. Deletions must already
    /// have happened; see the submit ordering in the lifecycle machine.
    pub async fn promote_edit_files(&self, lesson_id: &str, files: &[String]) -> BlobResult<()> {
        for file in files {
            let target = paths::edit_to_published(file);
            match self.blobs.copy(file, &target).await {
                Ok(()) => self.blobs.delete(file).await?,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.delete_edit_folder(lesson_id).await
    }

    /// Copy a whole lesson folder under a new lesson id (duplication).
    pub async fn duplicate_lesson(&self, lesson_id: &str, new_lesson_id: &str) -> BlobResult<()> {
        let src_folder = paths::lesson_folder(paths::LESSONS, lesson_id);
        let dst_folder = paths::lesson_folder(paths::LESSONS, new_lesson_id);
        for blob in self.blobs.list_prefix(&src_folder).await? {
            let target = blob.replacen(&src_folder, &dst_folder, 1);
            self.blobs.copy(&blob, &target).await?;
        }
        Ok(())
    }

    /// Delete stale thumbnail uploads of a lesson, keeping `keep`.
    pub async fn delete_old_thumbnails(
        &self,
        folder: &str,
        lesson_id: &str,
        keep: Option<&str>,
    ) -> BlobResult<()> {
        let prefix = paths::thumbnail_prefix(folder, lesson_id);
        for blob in self.blobs.list_prefix(&prefix).await? {
            if keep != Some(blob.as_str()) {
                self.blobs.delete(&blob).await?;
            }
        }
        Ok(())
    }

    /// Delete stale panoramic uploads of a part, keeping `keep`.
    pub async fn delete_old_panoramics(
        &self,
        folder: &str,
        lesson_id: &str,
        part_id: &str,
        keep: Option<&str>,
    ) -> BlobResult<()> {
        let prefix = paths::panoramic_prefix(folder, lesson_id, part_id);
        for blob in self.blobs.list_prefix(&prefix).await? {
            if keep != Some(blob.as_str()) {
                self.blobs.delete(&blob).await?;
            }
        }
        Ok(())
    }

    /// Delete stale uploads for one screen slot, keeping `keep`.
    pub async fn delete_old_screen_media(
        &self,
        folder: &str,
        lesson_id: &str,
        part_id: &str,
        screen: usize,
        keep: Option<&str>,
    ) -> BlobResult<()> {
        let prefix = paths::screen_prefix(folder, lesson_id, part_id, screen);
        for blob in self.blobs.list_prefix(&prefix).await? {
            if keep != Some(blob.as_str()) {
                self.blobs.delete(&blob).await?;
            }
        }
        Ok(())
    }
}
