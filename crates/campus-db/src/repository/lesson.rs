//! SurrealDB implementation of the lesson stores.
//!
//! One struct backs all four lesson traits: the three physical
//! collections share a content shape, and the multi-collection moves
//! (publish, archive, restore, purge) run as multi-statement
//! transactions so every sub-step commits or none do. Conditional
//! updates return the matched record keys (`RETURN VALUE meta::id(id)`),
//! which is how compare-and-swap outcomes are observed.

use campus_core::error::CampusResult;
use campus_core::models::lesson::{
    ArchivedLesson, DraftLesson, EditData, LessonBasicsPatch, LessonContent, Part,
    PublishedLesson,
};
use campus_core::predicate::Predicate;
use campus_core::store::{
    ArchivedLessonStore, DraftLessonStore, LessonTransactions, PaginatedResult, Pagination,
    PublishedLessonStore,
};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::predicate::render;
use crate::repository::rows::{self, ArchivedLessonRow, CountRow, IdRow, LessonRow};

const LESSON_PROJECTION: &str = "SELECT meta::id(id) AS record_id, *";

/// SET fragment covering every content field; pair with
/// [`bind_lesson_content!`].
const LESSON_SET: &str = "\
title = $c_title, description = $c_description, creator = $c_creator, \
description_file = $c_description_file, parts = $c_parts, viewed = $c_viewed, \
categories = $c_categories, thumbnail = $c_thumbnail, public = $c_public, \
credit = $c_credit, mid_edit = $c_mid_edit, edit_data = $c_edit_data";

macro_rules! bind_lesson_content {
    ($query:expr, $content:expr) => {
        $query
            .bind(("c_title", $content.title.clone()))
            .bind(("c_description", $content.description.clone()))
            .bind(("c_creator", $content.creator.to_string()))
            .bind(("c_description_file", $content.description_file.clone()))
            .bind(("c_parts", rows::to_json(&$content.parts)))
            .bind(("c_viewed", $content.viewed))
            .bind(("c_categories", rows::uuid_strings(&$content.categories)))
            .bind(("c_thumbnail", $content.thumbnail.clone()))
            .bind(("c_public", $content.public))
            .bind(("c_credit", $content.credit.clone()))
            .bind(("c_mid_edit", $content.mid_edit))
            .bind(("c_edit_data", rows::to_json(&$content.edit_data)))
    };
}

/// SurrealDB implementation of the draft, published and archived lesson
/// stores and their cross-collection transactions.
#[derive(Clone)]
pub struct SurrealLessonStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealLessonStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> DraftLessonStore for SurrealLessonStore<C> {
    async fn create_draft(&self, creator: Uuid) -> CampusResult<DraftLesson> {
        let content = LessonContent::empty(creator);
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let query = self
            .db
            .query(format!(
                "CREATE type::record('draft_lesson', $id) SET {LESSON_SET}, \
                 created_at = time::now(), updated_at = time::now(); \
                 {LESSON_PROJECTION} FROM type::record('draft_lesson', $id)"
            ))
            .bind(("id", id_str.clone()));
        let result = bind_lesson_content!(query, content)
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "draft_lesson", &id_str))?;

        let lessons: Vec<LessonRow> = result.take(1).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_draft()?)
    }

    async fn insert_draft(&self, draft: DraftLesson) -> CampusResult<DraftLesson> {
        let id_str = draft.id.to_string();

        let query = self
            .db
            .query(format!(
                "CREATE type::record('draft_lesson', $id) SET {LESSON_SET}, \
                 created_at = $created_at, updated_at = $updated_at; \
                 {LESSON_PROJECTION} FROM type::record('draft_lesson', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("created_at", draft.created_at))
            .bind(("updated_at", draft.updated_at));
        let result = bind_lesson_content!(query, draft.content)
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "draft_lesson", &id_str))?;

        let lessons: Vec<LessonRow> = result.take(1).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_draft()?)
    }

    async fn get_draft(&self, id: Uuid, scope: &Predicate) -> CampusResult<DraftLesson> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "{LESSON_PROJECTION} FROM type::record('draft_lesson', $id){}",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let lessons: Vec<LessonRow> = result.take(0).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_draft()?)
    }

    async fn get_draft_by_creator(&self, creator: Uuid) -> CampusResult<DraftLesson> {
        let creator_key = creator.to_string();

        let mut result = self
            .db
            .query(format!(
                "{LESSON_PROJECTION} FROM draft_lesson WHERE creator = $creator"
            ))
            .bind(("creator", creator_key.clone()))
            .await
            .map_err(DbError::from)?;

        let lessons: Vec<LessonRow> = result.take(0).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "draft_lesson".into(),
                id: creator_key,
            })?;

        Ok(row.try_into_draft()?)
    }

    async fn update_draft_basics(
        &self,
        id: Uuid,
        scope: &Predicate,
        patch: LessonBasicsPatch,
    ) -> CampusResult<DraftLesson> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut sets = Vec::new();
        if patch.title.is_some() {
            sets.push("title = $title");
        }
        if patch.description.is_some() {
            sets.push("description = $description");
        }
        if patch.description_file.is_some() {
            sets.push("description_file = $description_file");
        }
        if patch.categories.is_some() {
            sets.push("categories = $categories");
        }
        if patch.thumbnail.is_some() {
            sets.push("thumbnail = $thumbnail");
        }
        if patch.credit.is_some() {
            sets.push("credit = $credit");
        }
        sets.push("updated_at = time::now()");

        let query_str = format!(
            "UPDATE type::record('draft_lesson', $id) SET {}{} \
             RETURN VALUE meta::id(id); \
             {LESSON_PROJECTION} FROM type::record('draft_lesson', $id)",
            sets.join(", "),
            rendered.where_clause(),
        );

        let mut query = self.db.query(&query_str).bind(("id", id_str.clone()));
        if let Some(title) = patch.title {
            query = query.bind(("title", title));
        }
        if let Some(description) = patch.description {
            query = query.bind(("description", description));
        }
        if let Some(description_file) = patch.description_file {
            query = query.bind(("description_file", description_file));
        }
        if let Some(categories) = patch.categories {
            query = query.bind(("categories", rows::uuid_strings(&categories)));
        }
        if let Some(thumbnail) = patch.thumbnail {
            query = query.bind(("thumbnail", thumbnail));
        }
        if let Some(credit) = patch.credit {
            query = query.bind(("credit", credit));
        }
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }

        let mut result = query.await.map_err(DbError::from)?;
        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            }
            .into());
        }

        let lessons: Vec<LessonRow> = result.take(1).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_draft()?)
    }

    async fn set_draft_parts(
        &self,
        id: Uuid,
        scope: &Predicate,
        parts: Vec<Part>,
    ) -> CampusResult<DraftLesson> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "UPDATE type::record('draft_lesson', $id) SET \
                 parts = $parts, updated_at = time::now(){} \
                 RETURN VALUE meta::id(id); \
                 {LESSON_PROJECTION} FROM type::record('draft_lesson', $id)",
                rendered.where_clause(),
            ))
            .bind(("id", id_str.clone()))
            .bind(("parts", rows::to_json(&parts)));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }

        let mut result = query.await.map_err(DbError::from)?;
        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            }
            .into());
        }

        let lessons: Vec<LessonRow> = result.take(1).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_draft()?)
    }

    async fn delete_draft(&self, id: Uuid, scope: &Predicate) -> CampusResult<DraftLesson> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "{LESSON_PROJECTION} FROM type::record('draft_lesson', $id){}; \
                 DELETE type::record('draft_lesson', $id){}",
                rendered.where_clause(),
                rendered.where_clause(),
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let lessons: Vec<LessonRow> = result.take(0).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "draft_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_draft()?)
    }
}

impl<C: Connection> PublishedLessonStore for SurrealLessonStore<C> {
    async fn get_published(&self, id: Uuid, scope: &Predicate) -> CampusResult<PublishedLesson> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "{LESSON_PROJECTION} FROM type::record('published_lesson', $id){}",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let lessons: Vec<LessonRow> = result.take(0).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "published_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_published()?)
    }

    async fn list_published(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<PublishedLesson>> {
        let rendered = render(scope, "w");

        let mut count_query = self.db.query(format!(
            "SELECT count() AS total FROM published_lesson{} GROUP ALL",
            rendered.where_clause()
        ));
        for (name, value) in rendered.binds.clone() {
            count_query = count_query.bind((name, value));
        }
        let mut count_result = count_query.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut query = self
            .db
            .query(format!(
                "{LESSON_PROJECTION} FROM published_lesson{} \
                 ORDER BY created_at DESC LIMIT $limit START $offset",
                rendered.where_clause()
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let lessons: Vec<LessonRow> = result.take(0).map_err(DbError::from)?;
        let items = lessons
            .into_iter()
            .map(|row| row.try_into_published())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn increment_viewed(&self, id: Uuid, scope: &Predicate) -> CampusResult<()> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "UPDATE type::record('published_lesson', $id) SET viewed += 1{} \
                 RETURN VALUE meta::id(id)",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "published_lesson".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn begin_edit(&self, id: Uuid, edit: EditData) -> CampusResult<bool> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('published_lesson', $id) SET \
                 mid_edit = true, edit_data = $edit, updated_at = time::now() \
                 WHERE mid_edit = false \
                 RETURN VALUE meta::id(id)",
            )
            .bind(("id", id.to_string()))
            .bind(("edit", rows::to_json(&edit)))
            .await
            .map_err(DbError::from)?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(!updated.is_empty())
    }

    async fn swap_current_editor(
        &self,
        id: Uuid,
        expected: Uuid,
        new: Uuid,
    ) -> CampusResult<bool> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('published_lesson', $id) SET \
                 edit_data.current_editor = $new, updated_at = time::now() \
                 WHERE mid_edit = true AND edit_data.current_editor = $expected \
                 RETURN VALUE meta::id(id)",
            )
            .bind(("id", id.to_string()))
            .bind(("expected", expected.to_string()))
            .bind(("new", new.to_string()))
            .await
            .map_err(DbError::from)?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(!updated.is_empty())
    }

    async fn return_to_initial_editor(&self, id: Uuid, scope: &Predicate) -> CampusResult<()> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "UPDATE type::record('published_lesson', $id) SET \
                 edit_data.current_editor = edit_data.initial_editor, \
                 updated_at = time::now() \
                 WHERE mid_edit = true{} \
                 RETURN VALUE meta::id(id)",
                rendered.and_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "published_lesson".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn update_edit_basics(
        &self,
        id: Uuid,
        editor: Uuid,
        patch: LessonBasicsPatch,
    ) -> CampusResult<()> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if patch.title.is_some() {
            sets.push("edit_data.title = $title");
        }
        if patch.description.is_some() {
            sets.push("edit_data.description = $description");
        }
        if patch.description_file.is_some() {
            sets.push("edit_data.description_file = $description_file");
        }
        if patch.categories.is_some() {
            sets.push("edit_data.categories = $categories");
        }
        if patch.thumbnail.is_some() {
            sets.push("edit_data.thumbnail = $thumbnail");
        }
        if patch.credit.is_some() {
            sets.push("edit_data.credit = $credit");
        }
        sets.push("updated_at = time::now()");

        let query_str = format!(
            "UPDATE type::record('published_lesson', $id) SET {} \
             WHERE mid_edit = true AND edit_data.current_editor = $editor \
             RETURN VALUE meta::id(id)",
            sets.join(", "),
        );

        let mut query = self
            .db
            .query(&query_str)
            .bind(("id", id_str.clone()))
            .bind(("editor", editor.to_string()));
        if let Some(title) = patch.title {
            query = query.bind(("title", title));
        }
        if let Some(description) = patch.description {
            query = query.bind(("description", description));
        }
        if let Some(description_file) = patch.description_file {
            query = query.bind(("description_file", description_file));
        }
        if let Some(categories) = patch.categories {
            query = query.bind(("categories", rows::uuid_strings(&categories)));
        }
        if let Some(thumbnail) = patch.thumbnail {
            query = query.bind(("thumbnail", thumbnail));
        }
        if let Some(credit) = patch.credit {
            query = query.bind(("credit", credit));
        }

        let mut result = query.await.map_err(DbError::from)?;
        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "published_lesson".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn set_edit_parts(&self, id: Uuid, editor: Uuid, parts: Vec<Part>) -> CampusResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('published_lesson', $id) SET \
                 edit_data.parts = $parts, updated_at = time::now() \
                 WHERE mid_edit = true AND edit_data.current_editor = $editor \
                 RETURN VALUE meta::id(id)",
            )
            .bind(("id", id_str.clone()))
            .bind(("editor", editor.to_string()))
            .bind(("parts", rows::to_json(&parts)))
            .await
            .map_err(DbError::from)?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "published_lesson".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn discard_edit(&self, id: Uuid, editor: Uuid) -> CampusResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('published_lesson', $id) SET \
                 mid_edit = false, edit_data = NONE, updated_at = time::now() \
                 WHERE mid_edit = true AND edit_data.current_editor = $editor \
                 RETURN VALUE meta::id(id)",
            )
            .bind(("id", id_str.clone()))
            .bind(("editor", editor.to_string()))
            .await
            .map_err(DbError::from)?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "published_lesson".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn replace_content(&self, id: Uuid, content: LessonContent) -> CampusResult<()> {
        let id_str = id.to_string();

        let query = self
            .db
            .query(format!(
                "UPDATE type::record('published_lesson', $id) SET {LESSON_SET}, \
                 updated_at = time::now() \
                 RETURN VALUE meta::id(id)"
            ))
            .bind(("id", id_str.clone()));
        let mut result = bind_lesson_content!(query, content)
            .await
            .map_err(DbError::from)?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "published_lesson".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }
}

impl<C: Connection> ArchivedLessonStore for SurrealLessonStore<C> {
    async fn get_archived(&self, id: Uuid, scope: &Predicate) -> CampusResult<ArchivedLesson> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "{LESSON_PROJECTION} FROM type::record('archived_lesson', $id){}",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let lessons: Vec<ArchivedLessonRow> = result.take(0).map_err(DbError::from)?;
        let row = lessons
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "archived_lesson".into(),
                id: id_str,
            })?;

        Ok(row.try_into_archived()?)
    }

    async fn list_archived(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<ArchivedLesson>> {
        let rendered = render(scope, "w");

        let mut count_query = self.db.query(format!(
            "SELECT count() AS total FROM archived_lesson{} GROUP ALL",
            rendered.where_clause()
        ));
        for (name, value) in rendered.binds.clone() {
            count_query = count_query.bind((name, value));
        }
        let mut count_result = count_query.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut query = self
            .db
            .query(format!(
                "{LESSON_PROJECTION} FROM archived_lesson{} \
                 ORDER BY archive_at DESC LIMIT $limit START $offset",
                rendered.where_clause()
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let lessons: Vec<ArchivedLessonRow> = result.take(0).map_err(DbError::from)?;
        let items = lessons
            .into_iter()
            .map(|row| row.try_into_archived())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_expired(&self, cutoff: DateTime<Utc>) -> CampusResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM archived_lesson \
                 WHERE archive_at < $cutoff",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;

        let ids: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        let uuids = ids
            .into_iter()
            .map(|row| row.into_uuid("archived_lesson"))
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(uuids)
    }
}

impl<C: Connection> LessonTransactions for SurrealLessonStore<C> {
    async fn publish(
        &self,
        draft_id: Uuid,
        lesson: PublishedLesson,
        account: Option<Uuid>,
    ) -> CampusResult<()> {
        let id_str = lesson.id.to_string();

        let account_step = if account.is_some() {
            "UPDATE type::record('account', $account) SET \
             allowed_lessons += $lesson_key, updated_at = time::now();"
        } else {
            ""
        };

        let query_str = format!(
            "BEGIN TRANSACTION; \
             CREATE type::record('published_lesson', $id) SET {LESSON_SET}, \
             created_at = $created_at, updated_at = $updated_at; \
             LET $deleted = (DELETE type::record('draft_lesson', $draft_id) RETURN BEFORE); \
             IF array::len($deleted) == 0 {{ THROW 'campus:not_found:draft_lesson' }}; \
             {account_step} \
             COMMIT TRANSACTION;"
        );

        let mut query = self
            .db
            .query(&query_str)
            .bind(("id", id_str.clone()))
            .bind(("draft_id", draft_id.to_string()))
            .bind(("lesson_key", id_str.clone()))
            .bind(("created_at", lesson.created_at))
            .bind(("updated_at", lesson.updated_at));
        if let Some(account) = account {
            query = query.bind(("account", account.to_string()));
        }
        let result = bind_lesson_content!(query, lesson.content)
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement(e, "published_lesson", &id_str))?;
        Ok(())
    }

    async fn archive(
        &self,
        id: Uuid,
        scope: &Predicate,
        by: Uuid,
        at: DateTime<Utc>,
    ) -> CampusResult<ArchivedLesson> {
        let lesson = self.get_published(id, scope).await?;
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let query_str = format!(
            "BEGIN TRANSACTION; \
             LET $deleted = (DELETE type::record('published_lesson', $id){} RETURN BEFORE); \
             IF array::len($deleted) == 0 {{ THROW 'campus:not_found:published_lesson' }}; \
             CREATE type::record('archived_lesson', $id) SET {LESSON_SET}, \
             archive_at = $archive_at, archive_by = $archive_by, \
             created_at = $created_at, updated_at = $updated_at; \
             COMMIT TRANSACTION;",
            rendered.where_clause(),
        );

        let mut query = self
            .db
            .query(&query_str)
            .bind(("id", id_str.clone()))
            .bind(("archive_at", at))
            .bind(("archive_by", by.to_string()))
            .bind(("created_at", lesson.created_at))
            .bind(("updated_at", lesson.updated_at));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let result = bind_lesson_content!(query, lesson.content)
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement(e, "published_lesson", &id_str))?;

        Ok(ArchivedLesson::from_published(lesson, by, at))
    }

    async fn restore(&self, id: Uuid, scope: &Predicate) -> CampusResult<PublishedLesson> {
        let archived = self.get_archived(id, scope).await?;
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let query_str = format!(
            "BEGIN TRANSACTION; \
             LET $deleted = (DELETE type::record('archived_lesson', $id){} RETURN BEFORE); \
             IF array::len($deleted) == 0 {{ THROW 'campus:not_found:archived_lesson' }}; \
             CREATE type::record('published_lesson', $id) SET {LESSON_SET}, \
             created_at = $created_at, updated_at = time::now(); \
             COMMIT TRANSACTION;",
            rendered.where_clause(),
        );

        let mut query = self
            .db
            .query(&query_str)
            .bind(("id", id_str.clone()))
            .bind(("created_at", archived.created_at));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let result = bind_lesson_content!(query, archived.content)
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement(e, "published_lesson", &id_str))?;

        Ok(PublishedLesson::from_archived(archived, Utc::now()))
    }

    async fn purge_archived(&self, id: Uuid) -> CampusResult<ArchivedLesson> {
        let archived = self
            .get_archived(id, &Predicate::unrestricted())
            .await?;
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $deleted = (DELETE type::record('archived_lesson', $id) RETURN BEFORE); \
                 IF array::len($deleted) == 0 { THROW 'campus:not_found:archived_lesson' }; \
                 UPDATE user SET allowed_lessons -= $lesson_key \
                 WHERE allowed_lessons CONTAINS $lesson_key; \
                 UPDATE account SET allowed_lessons -= $lesson_key \
                 WHERE allowed_lessons CONTAINS $lesson_key; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str.clone()))
            .bind(("lesson_key", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement(e, "archived_lesson", &id_str))?;

        Ok(archived)
    }
}
