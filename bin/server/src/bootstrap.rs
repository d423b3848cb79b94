//! First-start seeding of the super-admin account.

use jobby_core::SubscriberId;
use jobby_platform_access::{Role, User, hash_password, require_password};
use std::fmt;
use uuid::Uuid;

use crate::config::AdminConfig;
use crate::db::UserRepository;
use crate::notify::{NotificationDispatcher, NotificationJob};

/// Errors that abort startup while seeding the super-admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// No super-admin exists and the `admin` section is missing.
    MissingConfig,
    /// A field of the `admin` section is blank.
    MissingField { field: &'static str },
    /// The configured password could not be hashed.
    Password { details: String },
    /// Database operation failed.
    Database { details: String },
    /// The configured email or mobile number belongs to another account.
    Conflict,
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfig => {
                write!(f, "no super-admin exists and ADMIN__* is not configured")
            }
            Self::MissingField { field } => write!(f, "ADMIN__{} must not be empty", field),
            Self::Password { details } => write!(f, "cannot hash super-admin password: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Conflict => write!(
                f,
                "super-admin email or mobile number is already used by another account"
            ),
        }
    }
}

impl std::error::Error for BootstrapError {}

impl From<sqlx::Error> for BootstrapError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database {
            details: e.to_string(),
        }
    }
}

/// Builds the super-admin row and its password hash from configuration.
fn super_admin(config: &AdminConfig) -> Result<(User, String), BootstrapError> {
    let fields = [
        ("NAME", &config.name),
        ("EMAIL", &config.email),
        ("PICTURE", &config.picture),
        ("MOBILE_NUMBER", &config.mobile_number),
    ];
    if let Some(&(field, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(BootstrapError::MissingField { field });
    }

    let password = require_password(&config.password)
        .map_err(|_| BootstrapError::MissingField { field: "PASSWORD" })?;
    let password_hash = hash_password(password).map_err(|e| BootstrapError::Password {
        details: e.to_string(),
    })?;

    let user = User::new(format!("superadmin|{}", Uuid::new_v4()), Role::SuperAdmin)
        .with_subscriber_id(SubscriberId::new())
        .with_name(config.name.trim())
        .with_email(config.email.trim())
        .with_picture(config.picture.trim())
        .with_mobile_number(Some(config.mobile_number.trim().to_string()));
    Ok((user, password_hash))
}

/// Creates the super-admin unless one already exists.
///
/// Returns the new account, or `None` when nothing had to be done.
///
/// # Errors
///
/// Fails when seeding is needed but `config` is absent or incomplete, or
/// when the database rejects the row.
pub async fn ensure_super_admin(
    users: &UserRepository,
    config: Option<&AdminConfig>,
    notifications: &NotificationDispatcher,
) -> jobby_core::Result<Option<User>, BootstrapError> {
    if users.super_admin_exists().await.map_err(BootstrapError::from)? {
        tracing::debug!("Super-admin already present");
        return Ok(None);
    }

    let config = config.ok_or(BootstrapError::MissingConfig)?;
    let (user, password_hash) = super_admin(config)?;
    let created = users
        .create(&user, Some(&password_hash))
        .await
        .map_err(BootstrapError::from)?
        .ok_or(BootstrapError::Conflict)?;

    tracing::info!(user_id = %created.id(), "Created super-admin");
    notifications.dispatch(NotificationJob::onboard(&created));
    Ok(Some(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn config() -> AdminConfig {
        AdminConfig {
            name: "Root".to_string(),
            email: "root@example.com".to_string(),
            password: "0042".to_string(),
            picture: "https://example.com/root.png".to_string(),
            mobile_number: "+15550100".to_string(),
        }
    }

    #[test]
    fn super_admin_is_built_from_config() {
        let (user, hash) = super_admin(&config()).expect("seed");
        assert_eq!(user.role(), Role::SuperAdmin);
        assert!(user.provider_id().starts_with("superadmin|"));
        assert_eq!(user.email(), "root@example.com");
        assert_eq!(user.mobile_number(), Some("+15550100"));
        assert!(jobby_platform_access::verify_password("0042", &hash));
    }

    #[test]
    fn blank_fields_are_reported_by_name() {
        let mut cfg = config();
        cfg.mobile_number = " ".to_string();
        assert_eq!(
            super_admin(&cfg).expect_err("blank"),
            BootstrapError::MissingField {
                field: "MOBILE_NUMBER"
            }
        );

        let mut cfg = config();
        cfg.password = String::new();
        assert_eq!(
            super_admin(&cfg).expect_err("blank"),
            BootstrapError::MissingField { field: "PASSWORD" }
        );
    }

    #[test]
    fn each_seed_gets_fresh_identifiers() {
        let (a, _) = super_admin(&config()).expect("a");
        let (b, _) = super_admin(&config()).expect("b");
        assert_ne!(a.provider_id(), b.provider_id());
        assert_ne!(a.subscriber_id(), b.subscriber_id());
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn seeding_runs_once(pool: PgPool) {
        let users = UserRepository::new(pool);
        let (notifications, _jobs) = NotificationDispatcher::unstarted(4);

        let first = ensure_super_admin(&users, Some(&config()), &notifications)
            .await
            .expect("first");
        assert!(first.is_some());

        let second = ensure_super_admin(&users, None, &notifications)
            .await
            .expect("second");
        assert!(second.is_none());
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn missing_config_is_fatal_when_seeding_is_needed(pool: PgPool) {
        let users = UserRepository::new(pool);
        let (notifications, _jobs) = NotificationDispatcher::unstarted(4);

        let err = ensure_super_admin(&users, None, &notifications)
            .await
            .expect_err("missing");
        assert!(err.to_string().contains("ADMIN__* is not configured"));
    }
}
