//! The lesson lifecycle machine.
//!
//! Generic over the store gateway, the user store and the blob backend so
//! the transition logic has no dependency on the database crate. Every
//! operation authorizes through the policy compiler first; document
//! mutations execute as conditional or transactional store operations;
//! blob-store side effects run strictly after the document commit and are
//! logged rather than surfaced when they fail (the document layer already
//! succeeded).

use std::collections::HashMap;
use std::time::Duration;

use campus_blob::{BlobStore, MediaStore, paths};
use campus_core::error::{CampusError, CampusResult};
use campus_core::models::lesson::{
    DraftLesson, EditData, LessonBasicsPatch, Part, PartKind, PublishedLesson, Screen,
    ScreenKind,
};
use campus_core::models::role::{Action, Resource};
use campus_core::models::user::CurrentUser;
use campus_core::store::{
    ArchivedLessonStore, DraftLessonStore, LessonTransactions, PaginatedResult, Pagination,
    PublishedLessonStore, UserStore,
};
use campus_policy::compiler::compile;
use campus_policy::guard::check_access;
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::error::LifecycleError;
use crate::reconcile::plan_submit;
use crate::validate;

/// Signed-URL lifetime for issued upload/download slots.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Outcome of a start-edit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartEditOutcome {
    /// The caller opened a fresh edit session.
    Started,
    /// The caller already holds the session; a no-op success.
    AlreadyCurrentEditor,
    /// The caller opened the session originally but someone else holds it
    /// now; nothing changed.
    InitialEditorElsewhere,
    /// The caller outranked the initial editor and took the session over.
    Seized,
}

/// A screen slot mutation. Media-ness follows from the kind: video and
/// image screens carry blob paths, browser screens carry external links.
#[derive(Debug, Clone)]
pub struct ScreenUpdate {
    pub url: String,
    pub kind: ScreenKind,
    pub comment: Option<String>,
}

/// A panoramic part mutation: an uploaded asset or an external URL,
/// mutually exclusive by construction.
#[derive(Debug, Clone)]
pub enum PanoramicUpdate {
    Asset { path: String },
    External { url: String },
}

/// An issued upload location: the blob path the client must use and the
/// pre-signed URL to push bytes to.
#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub path: String,
    pub upload_url: String,
}

/// Whether the current editor of an edit session may be displaced by a
/// caller of the given rank. Lower rank is more privileged; the top rank
/// (0) may always seize, which matters only between two rank-0 peers.
pub fn can_seize(caller_rank: i64, initial_editor_rank: i64) -> bool {
    caller_rank < initial_editor_rank || caller_rank == 0
}

pub struct LessonService<S, U, B>
where
    S: DraftLessonStore + PublishedLessonStore + ArchivedLessonStore + LessonTransactions,
    U: UserStore,
    B: BlobStore,
{
    store: S,
    users: U,
    media: MediaStore<B>,
}

impl<S, U, B> LessonService<S, U, B>
where
    S: DraftLessonStore + PublishedLessonStore + ArchivedLessonStore + LessonTransactions,
    U: UserStore,
    B: BlobStore,
{
    pub fn new(store: S, users: U, media: MediaStore<B>) -> Self {
        Self {
            store,
            users,
            media,
        }
    }

    // -----------------------------------------------------------------
    // Drafts
    // -----------------------------------------------------------------

    /// Create the caller's draft. Each creator owns at most one.
    pub async fn create_draft(&self, user: &CurrentUser) -> CampusResult<DraftLesson> {
        check_access(user, &[(Resource::DraftLessons, &[Action::Create])])?;
        self.store.create_draft(user.id()).await
    }

    /// The caller's own draft.
    pub async fn draft(&self, user: &CurrentUser) -> CampusResult<DraftLesson> {
        compile(user, Resource::DraftLessons, Action::Read)
            .map_err(|e| CampusError::from(e).disguise_as_not_found("draft_lesson", user.id()))?;
        self.store.get_draft_by_creator(user.id()).await
    }

    pub async fn update_draft_basics(
        &self,
        user: &CurrentUser,
        draft_id: Uuid,
        patch: LessonBasicsPatch,
    ) -> CampusResult<DraftLesson> {
        let scope = compile(user, Resource::DraftLessons, Action::Update)?;
        // Draft assets upload straight into the published folder, keyed by
        // the draft id the lesson keeps for life.
        if let Some(thumbnail) = &patch.thumbnail {
            require_scoped(thumbnail, paths::LESSONS, draft_id)?;
        }
        if let Some(file) = &patch.description_file {
            require_scoped(file, paths::LESSONS, draft_id)?;
        }

        let new_thumbnail = patch.thumbnail.clone();
        let draft = self.store.update_draft_basics(draft_id, &scope, patch).await?;

        if let Some(thumbnail) = new_thumbnail
            && let Err(e) = self
                .media
                .delete_old_thumbnails(paths::LESSONS, &draft_id.to_string(), Some(&thumbnail))
                .await
        {
            warn!(lesson = %draft_id, error = %e, "stale thumbnail uploads not removed");
        }
        Ok(draft)
    }

    pub async fn add_draft_part(
        &self,
        user: &CurrentUser,
        draft_id: Uuid,
        kind: PartKind,
        new_order: i64,
        old_orders: &HashMap<String, i64>,
    ) -> CampusResult<String> {
        let scope = compile(user, Resource::DraftLessons, Action::Update)?;
        let draft = self.store.get_draft(draft_id, &scope).await?;

        let mut parts = draft.content.parts;
        let part_id = add_part(&mut parts, kind, new_order, old_orders)?;
        self.store.set_draft_parts(draft_id, &scope, parts).await?;
        Ok(part_id)
    }

    pub async fn remove_draft_part(
        &self,
        user: &CurrentUser,
        draft_id: Uuid,
        part_id: &str,
    ) -> CampusResult<()> {
        let scope = compile(user, Resource::DraftLessons, Action::Update)?;
        let draft = self.store.get_draft(draft_id, &scope).await?;

        let mut parts = draft.content.parts;
        remove_part(&mut parts, part_id)?;
        self.store.set_draft_parts(draft_id, &scope, parts).await?;

        if let Err(e) = self
            .media
            .delete_part(&draft_id.to_string(), part_id, false)
            .await
        {
            warn!(lesson = %draft_id, part = part_id, error = %e, "draft part files not fully removed");
        }
        Ok(())
    }

    pub async fn reorder_draft_parts(
        &self,
        user: &CurrentUser,
        draft_id: Uuid,
        orders: &HashMap<String, i64>,
    ) -> CampusResult<()> {
        let scope = compile(user, Resource::DraftLessons, Action::Update)?;
        let draft = self.store.get_draft(draft_id, &scope).await?;

        let mut parts = draft.content.parts;
        apply_orders(&mut parts, orders)?;
        self.store.set_draft_parts(draft_id, &scope, parts).await?;
        Ok(())
    }

    pub async fn set_draft_part_title(
        &self,
        user: &CurrentUser,
        draft_id: Uuid,
        part_id: &str,
        title: String,
    ) -> CampusResult<()> {
        let scope = compile(user, Resource::DraftLessons, Action::Update)?;
        let draft = self.store.get_draft(draft_id, &scope).await?;

        let mut parts = draft.content.parts;
        set_part_title(&mut parts, part_id, title)?;
        self.store.set_draft_parts(draft_id, &scope, parts).await?;
        Ok(())
    }

    pub async fn set_draft_screen(
        &self,
        user: &CurrentUser,
        draft_id: Uuid,
        part_id: &str,
        screen_index: usize,
        update: ScreenUpdate,
    ) -> CampusResult<()> {
        let scope = compile(user, Resource::DraftLessons, Action::Update)?;
        let draft = self.store.get_draft(draft_id, &scope).await?;
        let screen = self
            .resolve_screen(draft_id, paths::LESSONS, update)
            .await?;

        let mut parts = draft.content.parts;
        let old = set_screen(&mut parts, part_id, screen_index, screen.clone())?;
        self.store.set_draft_parts(draft_id, &scope, parts).await?;

        self.retire_screen_media(draft_id, paths::LESSONS, part_id, screen_index, &screen, old)
            .await;
        Ok(())
    }

    pub async fn set_draft_panoramic(
        &self,
        user: &CurrentUser,
        draft_id: Uuid,
        part_id: &str,
        update: PanoramicUpdate,
    ) -> CampusResult<()> {
        let scope = compile(user, Resource::DraftLessons, Action::Update)?;
        let draft = self.store.get_draft(draft_id, &scope).await?;

        let mut parts = draft.content.parts;
        let keep = set_panoramic(&mut parts, part_id, draft_id, paths::LESSONS, &update)?;
        self.store.set_draft_parts(draft_id, &scope, parts).await?;

        if let Err(e) = self
            .media
            .delete_old_panoramics(paths::LESSONS, &draft_id.to_string(), part_id, keep.as_deref())
            .await
        {
            warn!(lesson = %draft_id, part = part_id, error = %e, "stale panoramic uploads not removed");
        }
        Ok(())
    }

    /// Delete the caller's draft and all of its files.
    pub async fn delete_draft(&self, user: &CurrentUser, draft_id: Uuid) -> CampusResult<()> {
        let scope = compile(user, Resource::DraftLessons, Action::Delete)?;
        let draft = self.store.delete_draft(draft_id, &scope).await?;

        if let Err(e) = self.media.delete_lesson(&draft.id.to_string()).await {
            warn!(lesson = %draft.id, error = %e, "draft files not fully removed");
        }
        Ok(())
    }

    /// Draft → Published. Validates completeness, moves the document in
    /// one transaction, and appends the lesson to the creator account's
    /// allow-list. The draft's files already live under the lesson id, so
    /// publication moves no files.
    pub async fn publish(&self, user: &CurrentUser) -> CampusResult<PublishedLesson> {
        check_access(
            user,
            &[
                (Resource::DraftLessons, &[Action::Read, Action::Delete]),
                (Resource::PublishedLessons, &[Action::Create]),
            ],
        )?;

        let draft = self.store.get_draft_by_creator(user.id()).await?;
        validate::draft_ready_for_publish(&draft.content)?;

        let lesson = PublishedLesson::from_draft(draft, Utc::now());
        self.store
            .publish(lesson.id, lesson.clone(), user.user.account)
            .await?;
        Ok(lesson)
    }

    // -----------------------------------------------------------------
    // Published lessons
    // -----------------------------------------------------------------

    pub async fn published(&self, user: &CurrentUser, id: Uuid) -> CampusResult<PublishedLesson> {
        let scope = compile(user, Resource::PublishedLessons, Action::Read)
            .map_err(|e| CampusError::from(e).disguise_as_not_found("published_lesson", id))?;
        self.store.get_published(id, &scope).await
    }

    pub async fn list_published(
        &self,
        user: &CurrentUser,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<PublishedLesson>> {
        let scope = compile(user, Resource::PublishedLessons, Action::ReadMany)?;
        self.store.list_published(&scope, pagination).await
    }

    /// Count a view against a lesson the caller may read.
    pub async fn record_view(&self, user: &CurrentUser, id: Uuid) -> CampusResult<()> {
        let scope = compile(user, Resource::PublishedLessons, Action::Read)
            .map_err(|e| CampusError::from(e).disguise_as_not_found("published_lesson", id))?;
        self.store.increment_viewed(id, &scope).await
    }

    /// Enter (or take over) the edit session of a published lesson.
    ///
    /// First entry shadow-copies the live fields under a conditional
    /// update, so two racing callers cannot both open the session. A
    /// caller finding the lesson mid-edit may seize it only by outranking
    /// the initial editor; the seizure itself is a compare-and-swap on
    /// `current_editor`, re-checked atomically with the write.
    pub async fn start_edit(
        &self,
        user: &CurrentUser,
        id: Uuid,
    ) -> CampusResult<StartEditOutcome> {
        let scope = compile(user, Resource::PublishedLessons, Action::Update)?;
        let lesson = self.store.get_published(id, &scope).await?;

        if !lesson.content.mid_edit {
            let edit = EditData::shadow_of(&lesson.content, user.id(), Utc::now());
            if self.store.begin_edit(id, edit).await? {
                return Ok(StartEditOutcome::Started);
            }
            // Lost the race; fall through to the mid-edit rules below.
        }

        let lesson = self.store.get_published(id, &scope).await?;
        let edit = lesson
            .content
            .edit_data
            .as_ref()
            .ok_or_else(|| CampusError::Internal("mid-edit lesson without edit data".into()))?;

        if edit.current_editor == user.id() {
            return Ok(StartEditOutcome::AlreadyCurrentEditor);
        }
        if edit.initial_editor == user.id() {
            return Ok(StartEditOutcome::InitialEditorElsewhere);
        }

        let initial_editor = self.users.resolve_current(edit.initial_editor).await?;
        if !can_seize(user.rank(), initial_editor.rank()) {
            return Err(LifecycleError::SeizureDenied.into());
        }

        if self
            .store
            .swap_current_editor(id, edit.current_editor, user.id())
            .await?
        {
            Ok(StartEditOutcome::Seized)
        } else {
            // The session changed hands between read and swap.
            Err(CampusError::Conflict {
                entity: "edit_session".into(),
            })
        }
    }

    /// The lesson including its shadow copy, for edit-mode rendering.
    pub async fn edit_session(
        &self,
        user: &CurrentUser,
        id: Uuid,
    ) -> CampusResult<PublishedLesson> {
        let scope = compile(user, Resource::PublishedLessons, Action::Update)
            .map_err(|e| CampusError::from(e).disguise_as_not_found("published_lesson", id))?;
        let lesson = self.store.get_published(id, &scope).await?;
        if !lesson.content.mid_edit {
            return Err(LifecycleError::NotMidEdit.into());
        }
        Ok(lesson)
    }

    pub async fn update_edit_basics(
        &self,
        user: &CurrentUser,
        id: Uuid,
        patch: LessonBasicsPatch,
    ) -> CampusResult<()> {
        let lesson = self.published_for_update(user, id).await?;
        require_current_editor(&lesson, user)?;

        if let Some(thumbnail) = &patch.thumbnail {
            require_scoped(thumbnail, paths::LESSON_EDITS, id)?;
        }
        if let Some(file) = &patch.description_file {
            require_scoped(file, paths::LESSON_EDITS, id)?;
        }

        let new_thumbnail = patch.thumbnail.clone();
        self.store.update_edit_basics(id, user.id(), patch).await?;

        if let Some(thumbnail) = new_thumbnail
            && let Err(e) = self
                .media
                .delete_old_thumbnails(paths::LESSON_EDITS, &id.to_string(), Some(&thumbnail))
                .await
        {
            warn!(lesson = %id, error = %e, "stale thumbnail uploads not removed");
        }
        Ok(())
    }

    pub async fn add_edit_part(
        &self,
        user: &CurrentUser,
        id: Uuid,
        kind: PartKind,
        new_order: i64,
        old_orders: &HashMap<String, i64>,
    ) -> CampusResult<String> {
        let lesson = self.published_for_update(user, id).await?;
        let edit = require_current_editor(&lesson, user)?;

        let mut parts = edit.parts.clone();
        let part_id = add_part(&mut parts, kind, new_order, old_orders)?;
        self.store.set_edit_parts(id, user.id(), parts).await?;
        Ok(part_id)
    }

    pub async fn remove_edit_part(
        &self,
        user: &CurrentUser,
        id: Uuid,
        part_id: &str,
    ) -> CampusResult<()> {
        let lesson = self.published_for_update(user, id).await?;
        let edit = require_current_editor(&lesson, user)?;

        let mut parts = edit.parts.clone();
        remove_part(&mut parts, part_id)?;
        self.store.set_edit_parts(id, user.id(), parts).await?;

        // Only the edit-scoped uploads go; the published copies stay until
        // submit decides their fate.
        if let Err(e) = self.media.delete_part(&id.to_string(), part_id, true).await {
            warn!(lesson = %id, part = part_id, error = %e, "edit part files not fully removed");
        }
        Ok(())
    }

    pub async fn reorder_edit_parts(
        &self,
        user: &CurrentUser,
        id: Uuid,
        orders: &HashMap<String, i64>,
    ) -> CampusResult<()> {
        let lesson = self.published_for_update(user, id).await?;
        let edit = require_current_editor(&lesson, user)?;

        let mut parts = edit.parts.clone();
        apply_orders(&mut parts, orders)?;
        self.store.set_edit_parts(id, user.id(), parts).await
    }

    pub async fn set_edit_part_title(
        &self,
        user: &CurrentUser,
        id: Uuid,
        part_id: &str,
        title: String,
    ) -> CampusResult<()> {
        let lesson = self.published_for_update(user, id).await?;
        let edit = require_current_editor(&lesson, user)?;

        let mut parts = edit.parts.clone();
        set_part_title(&mut parts, part_id, title)?;
        self.store.set_edit_parts(id, user.id(), parts).await
    }

    pub async fn set_edit_screen(
        &self,
        user: &CurrentUser,
        id: Uuid,
        part_id: &str,
        screen_index: usize,
        update: ScreenUpdate,
    ) -> CampusResult<()> {
        let lesson = self.published_for_update(user, id).await?;
        let edit = require_current_editor(&lesson, user)?;
        let screen = self.resolve_screen(id, paths::LESSON_EDITS, update).await?;

        let mut parts = edit.parts.clone();
        let old = set_screen(&mut parts, part_id, screen_index, screen.clone())?;
        self.store.set_edit_parts(id, user.id(), parts).await?;

        self.retire_screen_media(id, paths::LESSON_EDITS, part_id, screen_index, &screen, old)
            .await;
        Ok(())
    }

    pub async fn set_edit_panoramic(
        &self,
        user: &CurrentUser,
        id: Uuid,
        part_id: &str,
        update: PanoramicUpdate,
    ) -> CampusResult<()> {
        let lesson = self.published_for_update(user, id).await?;
        let edit = require_current_editor(&lesson, user)?;

        let mut parts = edit.parts.clone();
        let keep = set_panoramic(&mut parts, part_id, id, paths::LESSON_EDITS, &update)?;
        self.store.set_edit_parts(id, user.id(), parts).await?;

        if let Err(e) = self
            .media
            .delete_old_panoramics(paths::LESSON_EDITS, &id.to_string(), part_id, keep.as_deref())
            .await
        {
            warn!(lesson = %id, part = part_id, error = %e, "stale panoramic uploads not removed");
        }
        Ok(())
    }

    /// Hand the session back to whoever opened it.
    pub async fn return_to_initial_editor(
        &self,
        user: &CurrentUser,
        id: Uuid,
    ) -> CampusResult<()> {
        let scope = compile(user, Resource::PublishedLessons, Action::Update)?;
        self.store.return_to_initial_editor(id, &scope).await
    }

    /// Submit the edit session: merge the shadow copy into the live
    /// fields, commit the document, then apply file deletions and moves in
    /// that order. A blob failure after the commit leaves the operation
    /// successful at the document layer and is logged for manual cleanup.
    pub async fn submit(&self, user: &CurrentUser, id: Uuid) -> CampusResult<PublishedLesson> {
        let lesson = self.published_for_update(user, id).await?;
        let edit = lesson
            .content
            .edit_data
            .as_ref()
            .filter(|_| lesson.content.mid_edit)
            .ok_or(LifecycleError::NotMidEdit)?;

        let (merged, plan) = plan_submit(&lesson.content, edit);
        self.store.replace_content(id, merged.clone()).await?;

        if let Err(e) = self.media.delete_files(&plan.deletes).await {
            warn!(lesson = %id, error = %e, "submit committed but file deletions failed");
        } else if let Err(e) = self.media.promote_edit_files(&id.to_string(), &plan.moves).await {
            warn!(lesson = %id, error = %e, "submit committed but file moves failed");
        }

        Ok(PublishedLesson {
            id,
            content: merged,
            created_at: lesson.created_at,
            updated_at: Utc::now(),
        })
    }

    /// Drop the shadow copy and every edit-scoped upload.
    pub async fn discard_edit(&self, user: &CurrentUser, id: Uuid) -> CampusResult<()> {
        let lesson = self.published_for_update(user, id).await?;
        require_current_editor(&lesson, user)?;

        self.store.discard_edit(id, user.id()).await?;

        if let Err(e) = self.media.delete_edit_folder(&id.to_string()).await {
            warn!(lesson = %id, error = %e, "edit files not fully removed after discard");
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Archive
    // -----------------------------------------------------------------

    /// Published → Archived, one atomic move, stamped with who and when.
    pub async fn archive(&self, user: &CurrentUser, id: Uuid) -> CampusResult<()> {
        let scope = compile(user, Resource::PublishedLessons, Action::Delete)?;
        self.store.archive(id, &scope, user.id(), Utc::now()).await?;
        Ok(())
    }

    /// Archived → Published. Fails when the lesson was republished in the
    /// meantime.
    pub async fn restore(&self, user: &CurrentUser, id: Uuid) -> CampusResult<PublishedLesson> {
        let scope = compile(user, Resource::ArchivedLessons, Action::Update)?;
        self.store.restore(id, &scope).await
    }

    pub async fn archived(
        &self,
        user: &CurrentUser,
        id: Uuid,
    ) -> CampusResult<campus_core::models::lesson::ArchivedLesson> {
        let scope = compile(user, Resource::ArchivedLessons, Action::Read)
            .map_err(|e| CampusError::from(e).disguise_as_not_found("archived_lesson", id))?;
        self.store.get_archived(id, &scope).await
    }

    pub async fn list_archived(
        &self,
        user: &CurrentUser,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<campus_core::models::lesson::ArchivedLesson>> {
        let scope = compile(user, Resource::ArchivedLessons, Action::ReadMany)?;
        self.store.list_archived(&scope, pagination).await
    }

    /// Permanently delete an archived lesson: document, allow-list
    /// references, then files.
    pub async fn purge(&self, user: &CurrentUser, id: Uuid) -> CampusResult<()> {
        check_access(user, &[(Resource::ArchivedLessons, &[Action::Delete])])?;
        self.purge_unchecked(id).await
    }

    /// The sweep entry point: no caller, system authority.
    pub(crate) async fn purge_unchecked(&self, id: Uuid) -> CampusResult<()> {
        let lesson = self.store.purge_archived(id).await?;
        if let Err(e) = self.media.delete_lesson(&lesson.id.to_string()).await {
            warn!(lesson = %id, error = %e, "purge committed but file deletion failed");
        }
        Ok(())
    }

    /// Permanently delete every archived lesson past the retention
    /// window. Failures are logged per lesson and never abort the batch.
    pub async fn sweep_expired(&self) -> CampusResult<crate::sweep::SweepReport> {
        let cutoff = crate::sweep::retention_cutoff(Utc::now());
        let expired = self.store.list_expired(cutoff).await?;

        let mut report = crate::sweep::SweepReport::default();
        for id in expired {
            match self.purge_unchecked(id).await {
                Ok(()) => report.purged += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(lesson = %id, error = %e, "sweep failed to purge expired lesson");
                }
            }
        }
        Ok(report)
    }

    // -----------------------------------------------------------------
    // Duplication
    // -----------------------------------------------------------------

    /// Published → a fresh Draft owned by the caller, with every asset
    /// reference rewritten to the new lesson id and the backing files
    /// copied.
    pub async fn duplicate(&self, user: &CurrentUser, id: Uuid) -> CampusResult<DraftLesson> {
        let scope = compile(user, Resource::PublishedLessons, Action::Duplicate)
            .map_err(|e| CampusError::from(e).disguise_as_not_found("published_lesson", id))?;
        let source = self.store.get_published(id, &scope).await?;

        let new_id = Uuid::new_v4();
        let old_key = source.id.to_string();
        let new_key = new_id.to_string();

        let mut content = source.content;
        content.creator = user.id();
        content.mid_edit = false;
        content.edit_data = None;
        for part in &mut content.parts {
            for screen in &mut part.screens {
                if screen.is_media()
                    && let Some(url) = &screen.url
                {
                    screen.url = Some(paths::rebase_lesson_path(url, &old_key, &new_key));
                }
            }
            if let Some(path) = &part.blob_path {
                part.blob_path = Some(paths::rebase_lesson_path(path, &old_key, &new_key));
            }
        }
        content.thumbnail = content
            .thumbnail
            .map(|t| paths::rebase_lesson_path(&t, &old_key, &new_key));
        content.description_file = content
            .description_file
            .map(|f| paths::rebase_lesson_path(&f, &old_key, &new_key));

        let now = Utc::now();
        let draft = self
            .store
            .insert_draft(DraftLesson {
                id: new_id,
                content,
                created_at: now,
                updated_at: now,
            })
            .await?;

        if let Err(e) = self.media.duplicate_lesson(&old_key, &new_key).await {
            warn!(source = %id, draft = %new_id, error = %e, "draft created but file copy failed");
        }
        Ok(draft)
    }

    // -----------------------------------------------------------------
    // Upload slots
    // -----------------------------------------------------------------

    /// Issue an upload location for one screen slot of a normal part.
    pub async fn screen_upload_slot(
        &self,
        user: &CurrentUser,
        lesson_id: Uuid,
        part_id: &str,
        screen_index: usize,
        file_ext: &str,
        content_type: &str,
        edit: bool,
    ) -> CampusResult<UploadSlot> {
        if screen_index >= campus_core::models::lesson::SCREENS_PER_PART {
            return Err(LifecycleError::ScreenOutOfRange {
                index: screen_index,
            }
            .into());
        }
        let part = self.locate_part(user, lesson_id, part_id, edit).await?;
        if !part.is_normal() {
            return Err(LifecycleError::WrongPartKind {
                part_id: part_id.to_string(),
            }
            .into());
        }

        let folder = target_folder(edit);
        let path = paths::screen_path(folder, &lesson_id.to_string(), part_id, screen_index, file_ext);
        self.sign_upload(path, content_type).await
    }

    pub async fn panoramic_upload_slot(
        &self,
        user: &CurrentUser,
        lesson_id: Uuid,
        part_id: &str,
        file_ext: &str,
        content_type: &str,
        edit: bool,
    ) -> CampusResult<UploadSlot> {
        if !content_type.starts_with("image/") {
            return Err(CampusError::Validation {
                message: format!("panoramic uploads must be images, got {content_type}"),
            });
        }
        let part = self.locate_part(user, lesson_id, part_id, edit).await?;
        if !part.is_panoramic() {
            return Err(LifecycleError::WrongPartKind {
                part_id: part_id.to_string(),
            }
            .into());
        }

        let folder = target_folder(edit);
        let path = paths::panoramic_path(folder, &lesson_id.to_string(), part_id, file_ext);
        self.sign_upload(path, content_type).await
    }

    pub async fn thumbnail_upload_slot(
        &self,
        user: &CurrentUser,
        lesson_id: Uuid,
        file_ext: &str,
        content_type: &str,
        edit: bool,
    ) -> CampusResult<UploadSlot> {
        if !content_type.starts_with("image/") {
            return Err(CampusError::Validation {
                message: format!("thumbnails must be images, got {content_type}"),
            });
        }
        self.authorize_upload(user, lesson_id, edit).await?;

        let folder = target_folder(edit);
        let path = paths::thumbnail_path(folder, &lesson_id.to_string(), file_ext);
        self.sign_upload(path, content_type).await
    }

    pub async fn description_file_upload_slot(
        &self,
        user: &CurrentUser,
        lesson_id: Uuid,
        edit: bool,
    ) -> CampusResult<UploadSlot> {
        self.authorize_upload(user, lesson_id, edit).await?;

        let folder = target_folder(edit);
        let path = paths::description_file_path(folder, &lesson_id.to_string());
        self.sign_upload(path, "application/pdf").await
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    async fn published_for_update(
        &self,
        user: &CurrentUser,
        id: Uuid,
    ) -> CampusResult<PublishedLesson> {
        let scope = compile(user, Resource::PublishedLessons, Action::Update)?;
        self.store.get_published(id, &scope).await
    }

    /// Fetch a part for slot issuance: the edit shadow for published
    /// lessons, the draft itself otherwise.
    async fn locate_part(
        &self,
        user: &CurrentUser,
        lesson_id: Uuid,
        part_id: &str,
        edit: bool,
    ) -> CampusResult<Part> {
        if edit {
            let lesson = self.published_for_update(user, lesson_id).await?;
            let session = require_current_editor(&lesson, user)?;
            session
                .part(part_id)
                .cloned()
                .ok_or_else(|| {
                    LifecycleError::PartNotFound {
                        part_id: part_id.to_string(),
                    }
                    .into()
                })
        } else {
            let scope = compile(user, Resource::DraftLessons, Action::Update)?;
            let draft = self.store.get_draft(lesson_id, &scope).await?;
            draft
                .content
                .part(part_id)
                .cloned()
                .ok_or_else(|| {
                    LifecycleError::PartNotFound {
                        part_id: part_id.to_string(),
                    }
                    .into()
                })
        }
    }

    async fn authorize_upload(
        &self,
        user: &CurrentUser,
        lesson_id: Uuid,
        edit: bool,
    ) -> CampusResult<()> {
        if edit {
            let lesson = self.published_for_update(user, lesson_id).await?;
            require_current_editor(&lesson, user)?;
        } else {
            let scope = compile(user, Resource::DraftLessons, Action::Update)?;
            self.store.get_draft(lesson_id, &scope).await?;
        }
        Ok(())
    }

    async fn sign_upload(&self, path: String, content_type: &str) -> CampusResult<UploadSlot> {
        let upload_url = self
            .media
            .blobs()
            .signed_upload_url(&path, content_type, UPLOAD_URL_TTL)
            .await
            .map_err(|e| CampusError::StorageFailure(e.to_string()))?;
        Ok(UploadSlot { path, upload_url })
    }

    /// Build the stored screen for an update: media URLs are validated to
    /// be lesson-scoped and existing, and pick up their stored mime type;
    /// browser URLs must be http(s).
    async fn resolve_screen(
        &self,
        lesson_id: Uuid,
        folder: &str,
        update: ScreenUpdate,
    ) -> CampusResult<Screen> {
        if update.kind.is_media() {
            require_scoped(&update.url, folder, lesson_id)?;
            let mime_type = self
                .media
                .blobs()
                .content_type(&update.url)
                .await
                .map_err(|e| CampusError::StorageFailure(e.to_string()))?
                .ok_or_else(|| {
                    CampusError::from(LifecycleError::InvalidMediaPath {
                        path: update.url.clone(),
                    })
                })?;
            Ok(Screen {
                url: Some(update.url),
                kind: Some(update.kind),
                mime_type: Some(mime_type),
                comment: update.comment,
            })
        } else {
            if !update.url.starts_with("http://") && !update.url.starts_with("https://") {
                return Err(CampusError::Validation {
                    message: format!("invalid external url: {}", update.url),
                });
            }
            Ok(Screen {
                url: Some(update.url),
                kind: Some(update.kind),
                mime_type: None,
                comment: update.comment,
            })
        }
    }

    /// After a screen write commits, drop superseded uploads for that
    /// slot. Never fails the operation.
    async fn retire_screen_media(
        &self,
        lesson_id: Uuid,
        folder: &str,
        part_id: &str,
        screen_index: usize,
        screen: &Screen,
        _old: Option<Screen>,
    ) {
        let keep = screen.is_media().then(|| screen.url.clone()).flatten();
        if let Err(e) = self
            .media
            .delete_old_screen_media(
                folder,
                &lesson_id.to_string(),
                part_id,
                screen_index,
                keep.as_deref(),
            )
            .await
        {
            warn!(lesson = %lesson_id, part = part_id, screen = screen_index, error = %e,
                "stale screen uploads not removed");
        }
    }
}

fn target_folder(edit: bool) -> &'static str {
    if edit { paths::LESSON_EDITS } else { paths::LESSONS }
}

fn require_scoped(path: &str, folder: &str, lesson_id: Uuid) -> Result<(), LifecycleError> {
    if paths::is_scoped_to(path, folder, &lesson_id.to_string()) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidMediaPath {
            path: path.to_string(),
        })
    }
}

fn require_current_editor<'a>(
    lesson: &'a PublishedLesson,
    user: &CurrentUser,
) -> Result<&'a EditData, LifecycleError> {
    let edit = lesson
        .content
        .edit_data
        .as_ref()
        .filter(|_| lesson.content.mid_edit)
        .ok_or(LifecycleError::NotMidEdit)?;
    if edit.current_editor != user.id() {
        return Err(LifecycleError::NotCurrentEditor);
    }
    Ok(edit)
}

// ---------------------------------------------------------------------
// Pure part-list edits, shared by draft and edit-session flows
// ---------------------------------------------------------------------

/// Re-number existing parts, then append a fresh one at `new_order`.
/// Every existing part must appear in `old_orders` with a non-negative
/// position.
fn add_part(
    parts: &mut Vec<Part>,
    kind: PartKind,
    new_order: i64,
    old_orders: &HashMap<String, i64>,
) -> Result<String, LifecycleError> {
    apply_orders(parts, old_orders)?;
    if new_order < 0 {
        return Err(LifecycleError::InvalidOrder {
            part_id: "<new>".into(),
        });
    }
    let part = match kind {
        PartKind::Normal => Part::normal(new_order),
        PartKind::Panoramic => Part::panoramic(new_order),
    };
    let id = part.id.clone();
    parts.push(part);
    Ok(id)
}

fn remove_part(parts: &mut Vec<Part>, part_id: &str) -> Result<(), LifecycleError> {
    let before = parts.len();
    parts.retain(|p| p.id != part_id);
    if parts.len() == before {
        return Err(LifecycleError::PartNotFound {
            part_id: part_id.to_string(),
        });
    }
    Ok(())
}

fn apply_orders(
    parts: &mut [Part],
    orders: &HashMap<String, i64>,
) -> Result<(), LifecycleError> {
    for part in parts.iter_mut() {
        let order = *orders
            .get(&part.id)
            .ok_or_else(|| LifecycleError::InvalidOrder {
                part_id: part.id.clone(),
            })?;
        if order < 0 {
            return Err(LifecycleError::InvalidOrder {
                part_id: part.id.clone(),
            });
        }
        part.order = order;
    }
    Ok(())
}

fn set_part_title(
    parts: &mut [Part],
    part_id: &str,
    title: String,
) -> Result<(), LifecycleError> {
    let part = parts
        .iter_mut()
        .find(|p| p.id == part_id)
        .ok_or_else(|| LifecycleError::PartNotFound {
            part_id: part_id.to_string(),
        })?;
    part.title = Some(title);
    Ok(())
}

/// Replace one screen slot; returns the previous screen.
fn set_screen(
    parts: &mut [Part],
    part_id: &str,
    index: usize,
    screen: Screen,
) -> Result<Option<Screen>, LifecycleError> {
    let part = parts
        .iter_mut()
        .find(|p| p.id == part_id)
        .ok_or_else(|| LifecycleError::PartNotFound {
            part_id: part_id.to_string(),
        })?;
    if !part.is_normal() {
        return Err(LifecycleError::WrongPartKind {
            part_id: part_id.to_string(),
        });
    }
    let slot = part
        .screens
        .get_mut(index)
        .ok_or(LifecycleError::ScreenOutOfRange { index })?;
    Ok(Some(std::mem::replace(slot, screen)))
}

/// Apply a panoramic update; returns the asset path to keep when stale
/// uploads are cleaned afterwards.
fn set_panoramic(
    parts: &mut [Part],
    part_id: &str,
    lesson_id: Uuid,
    folder: &str,
    update: &PanoramicUpdate,
) -> Result<Option<String>, LifecycleError> {
    let part = parts
        .iter_mut()
        .find(|p| p.id == part_id)
        .ok_or_else(|| LifecycleError::PartNotFound {
            part_id: part_id.to_string(),
        })?;
    if !part.is_panoramic() {
        return Err(LifecycleError::WrongPartKind {
            part_id: part_id.to_string(),
        });
    }

    match update {
        PanoramicUpdate::Asset { path } => {
            require_scoped(path, folder, lesson_id)?;
            part.blob_path = Some(path.clone());
            part.panoramic_url = None;
            Ok(Some(path.clone()))
        }
        PanoramicUpdate::External { url } => {
            part.blob_path = None;
            part.panoramic_url = Some(url.clone());
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seizure_requires_strictly_higher_privilege_or_top_rank() {
        // Lower rank number = more privileged.
        assert!(can_seize(1, 2), "supervisor reclaims from subordinate");
        assert!(!can_seize(2, 2), "peers cannot interrupt each other");
        assert!(!can_seize(3, 2), "subordinates cannot interrupt");
        assert!(can_seize(0, 0), "top rank may always seize");
    }

    #[test]
    fn add_part_renumbers_and_appends() {
        let mut parts = vec![Part::normal(0), Part::panoramic(1)];
        let orders: HashMap<String, i64> = parts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), (i as i64) + 1))
            .collect();

        let id = add_part(&mut parts, PartKind::Normal, 0, &orders).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].order, 1);
        assert_eq!(parts[1].order, 2);
        assert_eq!(parts[2].id, id);
        assert_eq!(parts[2].order, 0);
    }

    #[test]
    fn add_part_rejects_a_missing_old_order() {
        let mut parts = vec![Part::normal(0)];
        let err = add_part(&mut parts, PartKind::Normal, 1, &HashMap::new()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidOrder { .. }));
    }

    #[test]
    fn set_screen_rejects_panoramic_parts() {
        let mut parts = vec![Part::panoramic(0)];
        let id = parts[0].id.clone();
        let err = set_screen(&mut parts, &id, 0, Screen::default()).unwrap_err();
        assert!(matches!(err, LifecycleError::WrongPartKind { .. }));
    }

    #[test]
    fn set_panoramic_switches_between_asset_and_external() {
        let lesson = Uuid::new_v4();
        let mut parts = vec![Part::panoramic(0)];
        let id = parts[0].id.clone();

        let path = format!("lessons/{lesson}/{id}/panoramic-x.jpg");
        let keep = set_panoramic(
            &mut parts,
            &id,
            lesson,
            paths::LESSONS,
            &PanoramicUpdate::Asset { path: path.clone() },
        )
        .unwrap();
        assert_eq!(keep.as_deref(), Some(path.as_str()));
        assert_eq!(parts[0].blob_path.as_deref(), Some(path.as_str()));

        set_panoramic(
            &mut parts,
            &id,
            lesson,
            paths::LESSONS,
            &PanoramicUpdate::External {
                url: "https://example.com/p.jpg".into(),
            },
        )
        .unwrap();
        assert!(parts[0].blob_path.is_none());
        assert_eq!(
            parts[0].panoramic_url.as_deref(),
            Some("https://example.com/p.jpg")
        );
    }

    #[test]
    fn foreign_paths_are_rejected() {
        let lesson = Uuid::new_v4();
        let other = Uuid::new_v4();
        let err = require_scoped(
            &format!("lesson_edits/{other}/p1/0-a.png"),
            paths::LESSON_EDITS,
            lesson,
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidMediaPath { .. }));
    }
}
