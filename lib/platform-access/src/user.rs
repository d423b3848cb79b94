//! User domain type and the account aggregate built around it.
//!
//! A `User` is created either by the identity resolver on first OAuth login
//! or directly by an administrator. Its `provider_id` is the only durable
//! link back to the external identity that created it.

use chrono::{DateTime, Utc};
use jobby_core::{CompanyId, JobApplicationId, ProfileId, SubscriberId, UserId};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// A registered user of the job board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    picture: String,
    role: Role,
    /// Unique link to the external identity (or `admin|...` for local admins).
    provider_id: String,
    /// Recipient id at the notification service.
    subscriber_id: SubscriberId,
    mobile_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Creates a new user with a fresh id and subscriber id.
    #[must_use]
    pub fn new(provider_id: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            name: String::new(),
            email: String::new(),
            picture: String::new(),
            role,
            provider_id,
            subscriber_id: SubscriberId::new(),
            mobile_number: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        name: String,
        email: String,
        picture: String,
        role: Role,
        provider_id: String,
        subscriber_id: SubscriberId,
        mobile_number: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            picture,
            role,
            provider_id,
            subscriber_id,
            mobile_number,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the email address. An empty string means "unknown".
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = picture.into();
        self
    }

    /// Sets the mobile number.
    #[must_use]
    pub fn with_mobile_number(mut self, mobile_number: Option<String>) -> Self {
        self.mobile_number = mobile_number;
        self
    }

    /// Replaces the subscriber id.
    #[must_use]
    pub fn with_subscriber_id(mut self, subscriber_id: SubscriberId) -> Self {
        self.subscriber_id = subscriber_id;
        self
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn picture(&self) -> &str {
        &self.picture
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    #[must_use]
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    #[must_use]
    pub fn mobile_number(&self) -> Option<&str> {
        self.mobile_number.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Returns true if the user has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A user together with the relations loaded alongside it on every
/// authenticated request.
///
/// This is the unit stored in the user cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    user: User,
    profile_id: Option<ProfileId>,
    company_ids: Vec<CompanyId>,
    job_application_ids: Vec<JobApplicationId>,
}

impl UserAccount {
    /// Creates an account with no related records.
    #[must_use]
    pub fn new(user: User) -> Self {
        Self {
            user,
            profile_id: None,
            company_ids: Vec::new(),
            job_application_ids: Vec::new(),
        }
    }

    /// Sets the profile id.
    #[must_use]
    pub fn with_profile_id(mut self, profile_id: Option<ProfileId>) -> Self {
        self.profile_id = profile_id;
        self
    }

    /// Sets the owned company ids.
    #[must_use]
    pub fn with_company_ids(mut self, company_ids: Vec<CompanyId>) -> Self {
        self.company_ids = company_ids;
        self
    }

    /// Sets the submitted job application ids.
    #[must_use]
    pub fn with_job_application_ids(mut self, ids: Vec<JobApplicationId>) -> Self {
        self.job_application_ids = ids;
        self
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn profile_id(&self) -> Option<ProfileId> {
        self.profile_id
    }

    #[must_use]
    pub fn company_ids(&self) -> &[CompanyId] {
        &self.company_ids
    }

    #[must_use]
    pub fn job_application_ids(&self) -> &[JobApplicationId] {
        &self.job_application_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_has_generated_ids() {
        let a = User::new("12345".to_string(), Role::User);
        let b = User::new("12345".to_string(), Role::User);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.subscriber_id(), b.subscriber_id());
    }

    #[test]
    fn new_user_is_not_deleted() {
        let user = User::new("12345".to_string(), Role::Poster);
        assert!(!user.is_deleted());
        assert_eq!(user.created_at(), user.updated_at());
        assert!(user.email().is_empty());
    }

    #[test]
    fn builder_sets_profile_fields() {
        let user = User::new("12345".to_string(), Role::User)
            .with_name("Ada")
            .with_email("a@example.com")
            .with_picture("https://example.com/a.png")
            .with_mobile_number(Some("+15550100".to_string()));

        assert_eq!(user.name(), "Ada");
        assert_eq!(user.email(), "a@example.com");
        assert_eq!(user.picture(), "https://example.com/a.png");
        assert_eq!(user.mobile_number(), Some("+15550100"));
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.provider_id(), "12345");
    }

    #[test]
    fn with_all_fields_preserves_deleted_at() {
        let now = Utc::now();
        let user = User::with_all_fields(
            UserId::new(),
            "Bob".to_string(),
            "b@example.com".to_string(),
            String::new(),
            Role::Admin,
            "admin|x".to_string(),
            SubscriberId::new(),
            None,
            now,
            now,
            Some(now),
        );
        assert!(user.is_deleted());
        assert_eq!(user.deleted_at(), Some(now));
    }

    #[test]
    fn deleted_at_is_omitted_when_absent() {
        let user = User::new("12345".to_string(), Role::User);
        let json = serde_json::to_value(&user).expect("serialize");
        assert!(json.get("deleted_at").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["provider_id"], "12345");
    }

    #[test]
    fn account_round_trips_through_json() {
        let account = UserAccount::new(User::new("12345".to_string(), Role::User))
            .with_profile_id(Some(ProfileId::new()))
            .with_company_ids(vec![CompanyId::new()])
            .with_job_application_ids(vec![JobApplicationId::new(), JobApplicationId::new()]);

        let json = serde_json::to_string(&account).expect("serialize");
        let parsed: UserAccount = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, account);
        assert_eq!(parsed.job_application_ids().len(), 2);
    }
}
