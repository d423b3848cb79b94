//! Database repository for awards.

use chrono::{DateTime, Utc};
use jobby_core::{AwardId, ProfileId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::extract::not_blank;
use crate::response::Pagination;

/// An award record from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardRecord {
    pub id: AwardId,
    pub profile_id: ProfileId,
    pub title: String,
    pub description: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a new award.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAward {
    #[validate(custom(function = "not_blank", message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1900, max = 2100, message = "Year must be between 1900 and 2100"))]
    pub year: i32,
}

/// Partial update of an award.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct AwardChanges {
    #[validate(custom(function = "not_blank", message = "title is required"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1900, max = 2100, message = "Year must be between 1900 and 2100"))]
    pub year: Option<i32>,
}

/// Filters for listing awards.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AwardFilter {
    /// Substring match.
    pub title: Option<String>,
    /// Exact match.
    pub description: Option<String>,
    /// Awards from this year onwards.
    pub year: Option<i32>,
}

#[derive(FromRow)]
struct AwardRow {
    id: Uuid,
    profile_id: Uuid,
    title: String,
    description: String,
    year: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AwardRow> for AwardRecord {
    fn from(row: AwardRow) -> Self {
        Self {
            id: AwardId::from_uuid(row.id),
            profile_id: ProfileId::from_uuid(row.profile_id),
            title: row.title,
            description: row.description,
            year: row.year,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const AWARD_COLUMNS: &str = "id, profile_id, title, description, year, created_at, updated_at";

fn push_award_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AwardFilter) {
    builder.push(" WHERE deleted_at IS NULL");
    if let Some(title) = &filter.title {
        builder
            .push(" AND title LIKE ")
            .push_bind(super::like_pattern(title));
    }
    if let Some(description) = &filter.description {
        builder
            .push(" AND description = ")
            .push_bind(description.clone());
    }
    if let Some(year) = filter.year {
        builder.push(" AND year >= ").push_bind(year);
    }
}

/// Repository for award operations.
#[derive(Clone)]
pub struct AwardRepository {
    pool: PgPool,
}

impl AwardRepository {
    /// Creates a new award repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an award on `profile_id`.
    pub async fn create(
        &self,
        profile_id: ProfileId,
        award: &NewAward,
    ) -> Result<AwardRecord, sqlx::Error> {
        let row: AwardRow = sqlx::query_as(&format!(
            "INSERT INTO awards (id, profile_id, title, description, year, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING {AWARD_COLUMNS}"
        ))
        .bind(AwardId::new().as_uuid())
        .bind(profile_id.as_uuid())
        .bind(&award.title)
        .bind(&award.description)
        .bind(award.year)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Lists active awards matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &AwardFilter,
        pagination: Pagination,
    ) -> Result<(Vec<AwardRecord>, i64), sqlx::Error> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM awards");
        push_award_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {AWARD_COLUMNS} FROM awards"));
        push_award_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows: Vec<AwardRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Finds an active award by ID.
    pub async fn find_by_id(&self, id: AwardId) -> Result<Option<AwardRecord>, sqlx::Error> {
        let row: Option<AwardRow> = sqlx::query_as(&format!(
            "SELECT {AWARD_COLUMNS} FROM awards WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Merges `changes` into an active award.
    pub async fn update(
        &self,
        id: AwardId,
        changes: &AwardChanges,
    ) -> Result<Option<AwardRecord>, sqlx::Error> {
        let row: Option<AwardRow> = sqlx::query_as(&format!(
            "UPDATE awards SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                year = COALESCE($4, year),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {AWARD_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.year)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Soft-deletes an award. Returns false if no active award was affected.
    pub async fn soft_delete(&self, id: AwardId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE awards SET deleted_at = now(), updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::profiles::{CreateProfile, NewProfile, ProfileRepository};
    use crate::db::UserRepository;
    use jobby_platform_access::{Role, User};

    #[test]
    fn filters_are_appended_in_order() {
        let filter = AwardFilter {
            title: Some("best".to_string()),
            description: Some("desc".to_string()),
            year: Some(2020),
        };
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM awards");
        push_award_filters(&mut builder, &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM awards WHERE deleted_at IS NULL \
             AND title LIKE $1 AND description = $2 AND year >= $3"
        );
    }

    #[test]
    fn empty_filter_only_excludes_deleted() {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM awards");
        push_award_filters(&mut builder, &AwardFilter::default());
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM awards WHERE deleted_at IS NULL"
        );
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn update_merges_and_delete_is_idempotent(pool: PgPool) {
        let user = UserRepository::new(pool.clone())
            .create(&User::new("12345".to_string(), Role::User), None)
            .await
            .expect("user")
            .expect("not taken");
        let profile = NewProfile {
            bio: String::new(),
            resume_link: String::new(),
            current_salary: None,
            expected_salary: None,
        };
        let CreateProfile::Created(profile) = ProfileRepository::new(pool.clone())
            .create(user.id(), &profile)
            .await
            .expect("profile")
        else {
            panic!("profile not created");
        };

        let repo = AwardRepository::new(pool);
        let award = repo
            .create(
                profile.id,
                &NewAward {
                    title: "Best".to_string(),
                    description: "first".to_string(),
                    year: 2020,
                },
            )
            .await
            .expect("create");

        let updated = repo
            .update(
                award.id,
                &AwardChanges {
                    year: Some(2021),
                    ..AwardChanges::default()
                },
            )
            .await
            .expect("update")
            .expect("found");
        assert_eq!(updated.title, "Best");
        assert_eq!(updated.year, 2021);

        let (found, total) = repo
            .list(
                &AwardFilter {
                    year: Some(2021),
                    ..AwardFilter::default()
                },
                Pagination::default(),
            )
            .await
            .expect("list");
        assert_eq!(total, 1);
        assert_eq!(found[0].id, award.id);

        assert!(repo.soft_delete(award.id).await.expect("delete"));
        assert!(!repo.soft_delete(award.id).await.expect("delete again"));
        assert!(repo.find_by_id(award.id).await.expect("find").is_none());
    }
}
