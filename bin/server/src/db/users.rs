//! User repository.
//!
//! Soft-deleted users stay in the table. They are invisible to everything
//! except identity linking (so a deleted account cannot be re-created by
//! logging in again) and reinstatement.

use chrono::{DateTime, Utc};
use jobby_core::{CompanyId, JobApplicationId, ProfileId, SubscriberId, UserId};
use jobby_platform_access::{IdentityError, Role, User, UserAccount};
use serde::Deserialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use super::{decode_error, like_pattern};
use crate::response::Pagination;

macro_rules! user_columns {
    () => {
        "id, name, email, picture, role, provider_id, subscriber_id, mobile_number, \
         created_at, updated_at, deleted_at"
    };
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    picture: String,
    role: String,
    provider_id: String,
    subscriber_id: Uuid,
    mobile_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, sqlx::Error> {
        let role = Role::from_str(&self.role).map_err(|e| decode_error("role", e))?;
        Ok(User::with_all_fields(
            UserId::from_uuid(self.id),
            self.name,
            self.email,
            self.picture,
            role,
            self.provider_id,
            SubscriberId::from_uuid(self.subscriber_id),
            self.mobile_number,
            self.created_at,
            self.updated_at,
            self.deleted_at,
        ))
    }
}

/// Outcome of linking an external identity to a user.
#[derive(Debug)]
pub enum FindOrCreate {
    /// The identity already belonged to this user.
    Existing(User),
    /// A new user was inserted.
    Created(User),
    /// A matching user exists but may not sign in this way.
    Rejected(IdentityError),
}

/// Outcome of reinstating a soft-deleted user.
#[derive(Debug)]
pub enum Reinstate {
    Reinstated(User),
    NotDeleted,
    NotFound,
}

/// Filters for listing users. Text filters on name, picture and mobile
/// number match substrings; the rest match exactly.
#[derive(Debug, Default, Clone)]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub mobile_number: Option<String>,
    pub role: Option<Role>,
    pub provider_id: Option<String>,
    pub subscriber_id: Option<SubscriberId>,
}

/// Partial update of a user's own details. `None` leaves a field unchanged.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct UserChanges {
    pub name: Option<String>,
    #[validate(email(message = "a valid email is required"))]
    pub email: Option<String>,
    pub picture: Option<String>,
    pub mobile_number: Option<String>,
}

/// Stored login credentials of a user.
#[derive(Debug)]
pub struct Credentials {
    pub user: User,
    pub password_hash: Option<String>,
}

/// Repository for user operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Links `candidate` to an existing user or inserts it.
    ///
    /// A user matches on the same provider id, or on the same non-empty
    /// email. Soft-deleted users match too. Concurrent first logins for one
    /// identity create exactly one row; the loser sees `Existing`.
    #[instrument(skip(self, candidate), fields(provider_id = %candidate.provider_id()))]
    pub async fn find_or_create(&self, candidate: &User) -> Result<FindOrCreate, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<UserRow> = sqlx::query_as(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users
            WHERE provider_id = $1 OR ($2 <> '' AND email = $2)
            ORDER BY (provider_id = $1) DESC
            LIMIT 1
            FOR UPDATE"
        ))
        .bind(candidate.provider_id())
        .bind(candidate.email())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let user = row.try_into_user()?;
            tx.commit().await?;

            if user.is_deleted() {
                return Ok(FindOrCreate::Rejected(IdentityError::AccountDeleted));
            }
            if user.provider_id() != candidate.provider_id() {
                tracing::warn!(
                    existing_provider_id = %user.provider_id(),
                    "Email already linked to a different provider id"
                );
                return Ok(FindOrCreate::Rejected(IdentityError::ProviderMismatch));
            }
            return Ok(FindOrCreate::Existing(user));
        }

        let inserted: Option<UserRow> = sqlx::query_as(concat!(
            "INSERT INTO users (id, name, email, picture, role, provider_id, subscriber_id,
                mobile_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (provider_id) DO NOTHING
            RETURNING ",
            user_columns!()
        ))
        .bind(candidate.id().as_uuid())
        .bind(candidate.name())
        .bind(candidate.email())
        .bind(candidate.picture())
        .bind(candidate.role().as_str())
        .bind(candidate.provider_id())
        .bind(candidate.subscriber_id().as_uuid())
        .bind(candidate.mobile_number())
        .bind(candidate.created_at())
        .bind(candidate.updated_at())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match inserted {
            Some(row) => FindOrCreate::Created(row.try_into_user()?),
            None => {
                // Another request inserted the same provider id first.
                let row: UserRow = sqlx::query_as(concat!(
                    "SELECT ",
                    user_columns!(),
                    " FROM users WHERE provider_id = $1"
                ))
                .bind(candidate.provider_id())
                .fetch_one(&mut *tx)
                .await?;
                FindOrCreate::Existing(row.try_into_user()?)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Loads an active user with the relations the authenticator attaches.
    #[instrument(skip(self))]
    pub async fn find_account_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<UserAccount>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE provider_id = $1 AND deleted_at IS NULL"
        ))
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = row.try_into_user()?;
        let user_id = user.id().as_uuid();

        let profile_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM profiles WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let company_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM companies WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let job_application_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM job_applications WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(
            UserAccount::new(user)
                .with_profile_id(profile_id.map(ProfileId::from_uuid))
                .with_company_ids(company_ids.into_iter().map(CompanyId::from_uuid).collect())
                .with_job_application_ids(
                    job_application_ids
                        .into_iter()
                        .map(JobApplicationId::from_uuid)
                        .collect(),
                ),
        ))
    }

    /// Finds an active user by email, with its password hash.
    pub async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credentials>, sqlx::Error> {
        let row: Option<(UserRow, Option<String>)> = sqlx::query_as::<_, CredentialsRow>(concat!(
            "SELECT ",
            user_columns!(),
            ", password_hash FROM users
            WHERE email = $1 AND email <> '' AND deleted_at IS NULL
            ORDER BY created_at
            LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(|r| (r.user, r.password_hash));

        match row {
            Some((user, password_hash)) => Ok(Some(Credentials {
                user: user.try_into_user()?,
                password_hash,
            })),
            None => Ok(None),
        }
    }

    /// Lists active users, newest first.
    pub async fn list(
        &self,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(concat!("SELECT ", user_columns!(), " FROM users"));
        push_user_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<UserRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let users = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    /// Inserts a locally managed user.
    ///
    /// Returns `None` if a user with the same email or mobile number exists.
    #[instrument(skip(self, user, password_hash), fields(provider_id = %user.provider_id()))]
    pub async fn create(
        &self,
        user: &User,
        password_hash: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM users
                WHERE ($1 <> '' AND email = $1) OR ($2::TEXT IS NOT NULL AND mobile_number = $2)
            )",
        )
        .bind(user.email())
        .bind(user.mobile_number())
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Ok(None);
        }

        let row: UserRow = match sqlx::query_as(concat!(
            "INSERT INTO users (id, name, email, picture, role, provider_id, subscriber_id,
                mobile_number, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING ",
            user_columns!()
        ))
        .bind(user.id().as_uuid())
        .bind(user.name())
        .bind(user.email())
        .bind(user.picture())
        .bind(user.role().as_str())
        .bind(user.provider_id())
        .bind(user.subscriber_id().as_uuid())
        .bind(user.mobile_number())
        .bind(password_hash)
        .bind(user.created_at())
        .bind(user.updated_at())
        .fetch_one(&mut *tx)
        .await
        {
            Ok(row) => row,
            Err(e) if super::is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        Ok(Some(row.try_into_user()?))
    }

    /// Applies `changes` to an active user.
    pub async fn update(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(concat!(
            "UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                picture = COALESCE($4, picture),
                mobile_number = COALESCE($5, mobile_number),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING ",
            user_columns!()
        ))
        .bind(id.as_uuid())
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.picture.as_deref())
        .bind(changes.mobile_number.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::try_into_user).transpose()
    }

    /// Soft-deletes a user. Returns false if no active user was affected.
    pub async fn soft_delete(&self, id: UserId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = now(), updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns the provider id of a user, deleted or not.
    pub async fn find_provider_id(&self, id: UserId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT provider_id FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
    }

    /// Clears the soft-delete marker of a user.
    #[instrument(skip(self))]
    pub async fn reinstate(&self, id: UserId) -> Result<Reinstate, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(concat!(
            "UPDATE users SET deleted_at = NULL, updated_at = now()
            WHERE id = $1 AND deleted_at IS NOT NULL
            RETURNING ",
            user_columns!()
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Reinstate::Reinstated(row.try_into_user()?));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(if exists {
            Reinstate::NotDeleted
        } else {
            Reinstate::NotFound
        })
    }

    /// Stores a one-time login code for a user.
    pub async fn set_verification_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET verification_token = $2, verification_expires_at = $3
            WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clears the unexpired `token` of the active user with `email`.
    ///
    /// Returns that user, or `None` when email and code do not match. A
    /// code can be consumed at most once.
    pub async fn consume_verification_token(
        &self,
        email: &str,
        token: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(concat!(
            "UPDATE users SET verification_token = NULL, verification_expires_at = NULL
            WHERE id = (
                SELECT id FROM users
                WHERE email = $1
                  AND email <> ''
                  AND verification_token = $2
                  AND verification_expires_at >= now()
                  AND deleted_at IS NULL
                LIMIT 1
                FOR UPDATE
            )
            RETURNING ",
            user_columns!()
        ))
        .bind(email)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::try_into_user).transpose()
    }

    /// Returns true if any super-admin exists, deleted or not.
    pub async fn super_admin_exists(&self) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = $1)")
            .bind(Role::SuperAdmin.as_str())
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

fn push_user_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    query.push(" WHERE deleted_at IS NULL");
    if let Some(name) = &filter.name {
        query.push(" AND name LIKE ").push_bind(like_pattern(name));
    }
    if let Some(email) = &filter.email {
        query.push(" AND email = ").push_bind(email.clone());
    }
    if let Some(picture) = &filter.picture {
        query.push(" AND picture LIKE ").push_bind(like_pattern(picture));
    }
    if let Some(mobile_number) = &filter.mobile_number {
        query
            .push(" AND mobile_number LIKE ")
            .push_bind(like_pattern(mobile_number));
    }
    if let Some(role) = filter.role {
        query.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(provider_id) = &filter.provider_id {
        query.push(" AND provider_id = ").push_bind(provider_id.clone());
    }
    if let Some(subscriber_id) = filter.subscriber_id {
        query
            .push(" AND subscriber_id = ")
            .push_bind(subscriber_id.as_uuid());
    }
}
