//! Content Store Gateway trait definitions.
//!
//! All store operations are async. Operations that read or mutate on
//! behalf of a caller take the compiled [`Predicate`] as a scope argument;
//! the implementation combines it with the operation's own conditions so
//! that a document outside the caller's scope behaves exactly like an
//! absent one. No engine query syntax exists outside the db crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CampusResult;
use crate::models::{
    account::{Account, AccountPatch, NewAccount},
    category::{Category, CategoryPatch, NewCategory},
    lesson::{
        ArchivedLesson, DraftLesson, EditData, LessonBasicsPatch, LessonContent, Part,
        PublishedLesson,
    },
    review::{NewReview, Review},
    role::{NewRole, Role, RoleArchetype},
    user::{CurrentUser, NewUser, User, UserPatch},
};
use crate::predicate::Predicate;

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

pub trait RoleStore: Send + Sync {
    /// Insert a role. Fails with `Conflict` when a role with the same
    /// internal name already exists.
    fn insert(&self, input: NewRole) -> impl Future<Output = CampusResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CampusResult<Role>> + Send;
    fn get_by_internal_name(
        &self,
        name: RoleArchetype,
    ) -> impl Future<Output = CampusResult<Role>> + Send;
    fn list(&self) -> impl Future<Output = CampusResult<Vec<Role>>> + Send;
}

pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with `Conflict` on a duplicate email.
    fn insert(&self, input: NewUser) -> impl Future<Output = CampusResult<User>> + Send;
    fn get(&self, id: Uuid, scope: &Predicate)
    -> impl Future<Output = CampusResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = CampusResult<User>> + Send;
    /// Load a user with role and account populated, for policy evaluation.
    fn resolve_current(&self, id: Uuid) -> impl Future<Output = CampusResult<CurrentUser>> + Send;
    fn list(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> impl Future<Output = CampusResult<PaginatedResult<User>>> + Send;
    fn update(
        &self,
        id: Uuid,
        scope: &Predicate,
        patch: UserPatch,
    ) -> impl Future<Output = CampusResult<User>> + Send;
    fn delete(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<()>> + Send;
}

pub trait AccountStore: Send + Sync {
    /// Insert an account. Fails with `Conflict` when (institution_name,
    /// city) is taken.
    fn insert(&self, input: NewAccount) -> impl Future<Output = CampusResult<Account>> + Send;
    fn get(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<Account>> + Send;
    fn list(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> impl Future<Output = CampusResult<PaginatedResult<Account>>> + Send;
    fn update(
        &self,
        id: Uuid,
        scope: &Predicate,
        patch: AccountPatch,
    ) -> impl Future<Output = CampusResult<Account>> + Send;
    /// Atomically bump the seat counter (`current_users`) by `delta`.
    fn adjust_current_users(
        &self,
        id: Uuid,
        delta: i64,
    ) -> impl Future<Output = CampusResult<Account>> + Send;
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub trait CategoryStore: Send + Sync {
    fn insert(&self, input: NewCategory) -> impl Future<Output = CampusResult<Category>> + Send;
    fn get(&self, id: Uuid) -> impl Future<Output = CampusResult<Category>> + Send;
    fn list(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> impl Future<Output = CampusResult<PaginatedResult<Category>>> + Send;
    fn update(
        &self,
        id: Uuid,
        patch: CategoryPatch,
    ) -> impl Future<Output = CampusResult<Category>> + Send;
    /// Whether every id refers to an existing category.
    fn all_exist(&self, ids: &[Uuid]) -> impl Future<Output = CampusResult<bool>> + Send;
}

pub trait ReviewStore: Send + Sync {
    fn insert(&self, input: NewReview) -> impl Future<Output = CampusResult<Review>> + Send;
    fn list_for_lesson(
        &self,
        lesson: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CampusResult<PaginatedResult<Review>>> + Send;
    fn delete(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Lessons
// ---------------------------------------------------------------------------

pub trait DraftLessonStore: Send + Sync {
    /// Create an empty draft for `creator`. Fails with `Conflict` when the
    /// creator already owns one.
    fn create_draft(
        &self,
        creator: Uuid,
    ) -> impl Future<Output = CampusResult<DraftLesson>> + Send;
    /// Insert a fully-formed draft (lesson duplication). Same uniqueness
    /// rule as [`DraftLessonStore::create_draft`].
    fn insert_draft(
        &self,
        draft: DraftLesson,
    ) -> impl Future<Output = CampusResult<DraftLesson>> + Send;
    fn get_draft(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<DraftLesson>> + Send;
    fn get_draft_by_creator(
        &self,
        creator: Uuid,
    ) -> impl Future<Output = CampusResult<DraftLesson>> + Send;
    fn update_draft_basics(
        &self,
        id: Uuid,
        scope: &Predicate,
        patch: LessonBasicsPatch,
    ) -> impl Future<Output = CampusResult<DraftLesson>> + Send;
    fn set_draft_parts(
        &self,
        id: Uuid,
        scope: &Predicate,
        parts: Vec<Part>,
    ) -> impl Future<Output = CampusResult<DraftLesson>> + Send;
    /// Delete and return the draft, so callers can clean up its files.
    fn delete_draft(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<DraftLesson>> + Send;
}

pub trait PublishedLessonStore: Send + Sync {
    fn get_published(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<PublishedLesson>> + Send;
    fn list_published(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> impl Future<Output = CampusResult<PaginatedResult<PublishedLesson>>> + Send;
    fn increment_viewed(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<()>> + Send;

    /// Open an edit session: set `edit_data`/`mid_edit` if and only if the
    /// lesson is not already mid-edit, in one conditional update. Returns
    /// `false` when someone beat the caller to it.
    fn begin_edit(
        &self,
        id: Uuid,
        edit: EditData,
    ) -> impl Future<Output = CampusResult<bool>> + Send;

    /// Editor seizure compare-and-swap: replace `current_editor` only if
    /// it still equals `expected`. Returns `false` when the session moved
    /// under the caller.
    fn swap_current_editor(
        &self,
        id: Uuid,
        expected: Uuid,
        new: Uuid,
    ) -> impl Future<Output = CampusResult<bool>> + Send;

    fn return_to_initial_editor(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<()>> + Send;

    /// Mutate shadow basics. Conditioned on `editor` holding the session;
    /// a seizure between read and write makes the update match nothing.
    fn update_edit_basics(
        &self,
        id: Uuid,
        editor: Uuid,
        patch: LessonBasicsPatch,
    ) -> impl Future<Output = CampusResult<()>> + Send;

    /// Replace the shadow parts list, same editor condition.
    fn set_edit_parts(
        &self,
        id: Uuid,
        editor: Uuid,
        parts: Vec<Part>,
    ) -> impl Future<Output = CampusResult<()>> + Send;

    /// Drop the edit session. Only the current editor can.
    fn discard_edit(
        &self,
        id: Uuid,
        editor: Uuid,
    ) -> impl Future<Output = CampusResult<()>> + Send;

    /// Submit commit: replace the live content wholesale.
    fn replace_content(
        &self,
        id: Uuid,
        content: LessonContent,
    ) -> impl Future<Output = CampusResult<()>> + Send;
}

pub trait ArchivedLessonStore: Send + Sync {
    fn get_archived(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<ArchivedLesson>> + Send;
    fn list_archived(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> impl Future<Output = CampusResult<PaginatedResult<ArchivedLesson>>> + Send;
    /// Ids of archived lessons whose `archive_at` is before `cutoff`.
    fn list_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = CampusResult<Vec<Uuid>>> + Send;
}

/// Multi-document lesson moves. Each executes as one storage transaction:
/// every sub-step commits or none do, and no blob-store side effect
/// happens inside.
pub trait LessonTransactions: Send + Sync {
    /// Insert into published, delete the draft, and append the lesson to
    /// the creator account's allow-list when an account is given.
    fn publish(
        &self,
        draft_id: Uuid,
        lesson: PublishedLesson,
        account: Option<Uuid>,
    ) -> impl Future<Output = CampusResult<()>> + Send;

    /// Move a published lesson into the archive, stamping who and when.
    fn archive(
        &self,
        id: Uuid,
        scope: &Predicate,
        by: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = CampusResult<ArchivedLesson>> + Send;

    /// Move an archived lesson back to published. Fails with `Conflict`
    /// when a published lesson with the same identity already exists.
    fn restore(
        &self,
        id: Uuid,
        scope: &Predicate,
    ) -> impl Future<Output = CampusResult<PublishedLesson>> + Send;

    /// Permanently delete an archived lesson and pull its id from every
    /// user/account allow-list. Returns the deleted document so callers
    /// can remove its backing files.
    fn purge_archived(
        &self,
        id: Uuid,
    ) -> impl Future<Output = CampusResult<ArchivedLesson>> + Send;
}
