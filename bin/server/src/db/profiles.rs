//! Database repository for profiles.

use chrono::{DateTime, Utc};
use jobby_core::{ProfileId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::response::Pagination;

/// A profile record from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: ProfileId,
    /// Owning user. One profile per user.
    pub user_id: UserId,
    pub bio: String,
    pub resume_link: String,
    pub current_salary: Option<i64>,
    pub expected_salary: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a new profile.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProfile {
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub resume_link: String,
    #[validate(range(min = 0, message = "salary cannot be negative"))]
    pub current_salary: Option<i64>,
    #[validate(range(min = 0, message = "salary cannot be negative"))]
    pub expected_salary: Option<i64>,
}

/// Partial update of a profile. `None` leaves a field unchanged.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct ProfileChanges {
    pub bio: Option<String>,
    pub resume_link: Option<String>,
    #[validate(range(min = 0, message = "salary cannot be negative"))]
    pub current_salary: Option<i64>,
    #[validate(range(min = 0, message = "salary cannot be negative"))]
    pub expected_salary: Option<i64>,
}

/// Outcome of creating a profile.
#[derive(Debug)]
pub enum CreateProfile {
    Created(ProfileRecord),
    /// The user already has an active profile.
    AlreadyExists,
    /// The user's profile was soft-deleted.
    Inactive,
}

/// Row type for profile queries.
#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    user_id: Uuid,
    bio: String,
    resume: String,
    current_salary: Option<i64>,
    expected_salary: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for ProfileRecord {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: ProfileId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            bio: row.bio,
            resume_link: row.resume,
            current_salary: row.current_salary,
            expected_salary: row.expected_salary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PROFILE_COLUMNS: &str =
    "id, user_id, bio, resume, current_salary, expected_salary, created_at, updated_at";

/// Repository for profile operations.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Creates a new profile repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the profile of `user_id`.
    pub async fn create(
        &self,
        user_id: UserId,
        profile: &NewProfile,
    ) -> Result<CreateProfile, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT deleted_at FROM profiles WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(Some(_)) => return Ok(CreateProfile::Inactive),
            Some(None) => return Ok(CreateProfile::AlreadyExists),
            None => {}
        }

        let now = Utc::now();
        let inserted = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO profiles (id, user_id, bio, resume, current_salary, expected_salary,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(ProfileId::new().as_uuid())
        .bind(user_id.as_uuid())
        .bind(&profile.bio)
        .bind(&profile.resume_link)
        .bind(profile.current_salary)
        .bind(profile.expected_salary)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if super::is_unique_violation(&e) => return Ok(CreateProfile::AlreadyExists),
            Err(e) => return Err(e),
        };
        tx.commit().await?;
        Ok(CreateProfile::Created(row.into()))
    }

    /// Lists active profiles, newest first.
    pub async fn list(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<ProfileRecord>, i64), sqlx::Error> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2"
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Finds an active profile by ID.
    pub async fn find_by_id(&self, id: ProfileId) -> Result<Option<ProfileRecord>, sqlx::Error> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Applies `changes` to an active profile.
    pub async fn update(
        &self,
        id: ProfileId,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, sqlx::Error> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "UPDATE profiles SET
                bio = COALESCE($2, bio),
                resume = COALESCE($3, resume),
                current_salary = COALESCE($4, current_salary),
                expected_salary = COALESCE($5, expected_salary),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(changes.bio.as_deref())
        .bind(changes.resume_link.as_deref())
        .bind(changes.current_salary)
        .bind(changes.expected_salary)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Soft-deletes a profile. Returns false if no active profile was affected.
    pub async fn soft_delete(&self, id: ProfileId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE profiles SET deleted_at = now(), updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
