//! SurrealDB implementation of [`ReviewStore`].

use campus_core::error::CampusResult;
use campus_core::models::review::{NewReview, Review};
use campus_core::predicate::Predicate;
use campus_core::store::{PaginatedResult, Pagination, ReviewStore};
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::predicate::render;
use crate::repository::rows::{CountRow, ReviewRow};

const REVIEW_PROJECTION: &str = "SELECT meta::id(id) AS record_id, *";

/// SurrealDB implementation of the review store.
#[derive(Clone)]
pub struct SurrealReviewStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealReviewStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ReviewStore for SurrealReviewStore<C> {
    async fn insert(&self, input: NewReview) -> CampusResult<Review> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('review', $id) SET \
                 lesson = $lesson, reviewer = $reviewer, \
                 rating = $rating, comment = $comment; \
                 {REVIEW_PROJECTION} FROM type::record('review', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("lesson", input.lesson.to_string()))
            .bind(("reviewer", input.reviewer.to_string()))
            .bind(("rating", input.rating))
            .bind(("comment", input.comment))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "review", &id_str))?;

        let reviews: Vec<ReviewRow> = result.take(1).map_err(DbError::from)?;
        let row = reviews
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "review".into(),
                id: id_str,
            })?;

        Ok(row.try_into_review()?)
    }

    async fn list_for_lesson(
        &self,
        lesson: Uuid,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<Review>> {
        let lesson_key = lesson.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM review \
                 WHERE lesson = $lesson GROUP ALL",
            )
            .bind(("lesson", lesson_key.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "{REVIEW_PROJECTION} FROM review WHERE lesson = $lesson \
                 ORDER BY created_at DESC LIMIT $limit START $offset"
            ))
            .bind(("lesson", lesson_key))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let reviews: Vec<ReviewRow> = result.take(0).map_err(DbError::from)?;
        let items = reviews
            .into_iter()
            .map(|row| row.try_into_review())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn delete(&self, id: Uuid, scope: &Predicate) -> CampusResult<()> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "DELETE type::record('review', $id){} RETURN BEFORE",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let reviews: Vec<ReviewRow> = result.take(0).map_err(DbError::from)?;
        if reviews.is_empty() {
            return Err(DbError::NotFound {
                entity: "review".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }
}
