//! Best-effort user notifications through Novu.
//!
//! Handlers never wait on the notification service. They hand a
//! [`NotificationJob`] to the [`NotificationDispatcher`], which queues it for
//! a single background worker. A full queue drops the job; a failed call is
//! logged and not retried.

use async_trait::async_trait;
use jobby_core::SubscriberId;
use jobby_platform_access::User;
use rootcause::Report;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::instrument;

use crate::config::NovuConfig;

const WELCOME_EVENT: &str = "welcome";
const WELCOME_TITLE: &str = "Welcome to Jobby";
const OTP_EVENT: &str = "otp";
const OTP_TITLE: &str = "You have the power";
const COMPANY_NAME: &str = "Jobby";
const LOGO_URL: &str = "https://via.placeholder.com/200x200";

/// Errors from the notification service.
#[derive(Debug)]
pub enum NotificationError {
    /// The HTTP client could not be built.
    Configuration { details: String },
    /// The request did not complete.
    Request { operation: &'static str, details: String },
    /// The service answered with a non-success status.
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "notification client configuration error: {details}")
            }
            Self::Request { operation, details } => {
                write!(f, "notification {operation} request failed: {details}")
            }
            Self::Rejected {
                operation,
                status,
                body,
            } => write!(f, "notification {operation} rejected with {status}: {body}"),
        }
    }
}

impl std::error::Error for NotificationError {}

/// A notification recipient as registered with the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub subscriber_id: SubscriberId,
    pub first_name: String,
    pub email: String,
    pub avatar: String,
    pub data: Value,
}

impl Subscriber {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            subscriber_id: user.subscriber_id(),
            first_name: user.name().to_string(),
            email: user.email().to_string(),
            avatar: user.picture().to_string(),
            data: json!({}),
        }
    }
}

/// Who a triggered event goes to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub subscriber_id: SubscriberId,
    pub first_name: String,
    pub email: String,
}

/// A workflow trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerEvent {
    /// Workflow identifier at the service.
    pub name: String,
    pub to: Recipient,
    pub payload: Value,
}

impl TriggerEvent {
    fn for_user(event: &str, title: &str, user: &User) -> Self {
        Self {
            name: event.to_string(),
            to: Recipient {
                subscriber_id: user.subscriber_id(),
                first_name: user.name().to_string(),
                email: user.email().to_string(),
            },
            payload: json!({
                "name": title,
                "organization": { "logo": LOGO_URL },
            }),
        }
    }

    /// Welcome message for a new account. `None` when the user has no email.
    #[must_use]
    pub fn welcome(user: &User) -> Option<Self> {
        if user.email().is_empty() {
            return None;
        }
        Some(Self::for_user(WELCOME_EVENT, WELCOME_TITLE, user))
    }

    /// One-time login code for an administrator.
    #[must_use]
    pub fn otp(user: &User, otp: &str) -> Self {
        let mut event = Self::for_user(OTP_EVENT, OTP_TITLE, user);
        if let Some(payload) = event.payload.as_object_mut() {
            payload.insert("companyName".to_string(), json!(COMPANY_NAME));
            payload.insert("otp".to_string(), json!(otp));
        }
        event
    }
}

/// Client for a notification service.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Creates or updates a subscriber.
    async fn identify_subscriber(
        &self,
        subscriber: &Subscriber,
    ) -> jobby_core::Result<(), NotificationError>;

    /// Triggers a workflow for one recipient.
    async fn trigger(&self, event: &TriggerEvent) -> jobby_core::Result<(), NotificationError>;
}

/// [`Notifier`] backed by the Novu REST API.
pub struct NovuClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NovuClient {
    /// # Errors
    ///
    /// Returns [`NotificationError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: &NovuConfig) -> jobby_core::Result<Self, NotificationError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotificationError::Configuration {
                details: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), Report<NotificationError>> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, format!("ApiKey {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| NotificationError::Request {
                operation,
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                operation,
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for NovuClient {
    #[instrument(skip(self, subscriber), fields(subscriber_id = %subscriber.subscriber_id))]
    async fn identify_subscriber(
        &self,
        subscriber: &Subscriber,
    ) -> jobby_core::Result<(), NotificationError> {
        self.post("identify", "/v1/subscribers", subscriber).await
    }

    #[instrument(skip(self, event), fields(event = %event.name, subscriber_id = %event.to.subscriber_id))]
    async fn trigger(&self, event: &TriggerEvent) -> jobby_core::Result<(), NotificationError> {
        self.post("trigger", "/v1/events/trigger", event).await
    }
}

/// Work handed to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationJob {
    /// Register the subscriber, then send the welcome event if there is one.
    Onboard {
        subscriber: Subscriber,
        welcome: Option<TriggerEvent>,
    },
    /// Send a single event.
    Trigger(TriggerEvent),
}

impl NotificationJob {
    /// Onboarding for a freshly created user.
    #[must_use]
    pub fn onboard(user: &User) -> Self {
        Self::Onboard {
            subscriber: Subscriber::from_user(user),
            welcome: TriggerEvent::welcome(user),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Onboard { .. } => "onboard",
            Self::Trigger(_) => "trigger",
        }
    }
}

/// Queue in front of a single background notification worker.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<NotificationJob>,
}

impl NotificationDispatcher {
    /// Creates the queue and spawns its worker on the current runtime.
    pub fn new(notifier: Arc<dyn Notifier>, queue_capacity: usize) -> Self {
        let (dispatcher, rx) = Self::unstarted(queue_capacity);
        tokio::spawn(run_worker(rx, notifier));
        dispatcher
    }

    pub(crate) fn unstarted(queue_capacity: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues `job` without waiting.
    ///
    /// Returns `false` if the job was dropped.
    pub fn dispatch(&self, job: NotificationJob) -> bool {
        let kind = job.kind();
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(job = kind, "Notification queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(job = kind, "Notification worker stopped, dropping job");
                false
            }
        }
    }
}

async fn run_worker(mut rx: mpsc::Receiver<NotificationJob>, notifier: Arc<dyn Notifier>) {
    while let Some(job) = rx.recv().await {
        match job {
            NotificationJob::Onboard {
                subscriber,
                welcome,
            } => {
                if let Err(e) = notifier.identify_subscriber(&subscriber).await {
                    tracing::warn!(
                        error = %e,
                        subscriber_id = %subscriber.subscriber_id,
                        "Failed to create subscriber"
                    );
                    continue;
                }
                tracing::debug!(subscriber_id = %subscriber.subscriber_id, "Created subscriber");

                match welcome {
                    Some(event) => send(notifier.as_ref(), &event).await,
                    None => tracing::debug!(
                        subscriber_id = %subscriber.subscriber_id,
                        "No email on account, skipping welcome notification"
                    ),
                }
            }
            NotificationJob::Trigger(event) => send(notifier.as_ref(), &event).await,
        }
    }
    tracing::debug!("Notification worker stopped");
}

async fn send(notifier: &dyn Notifier, event: &TriggerEvent) {
    match notifier.trigger(event).await {
        Ok(()) => tracing::info!(event = %event.name, "Sent notification"),
        Err(e) => tracing::warn!(error = %e, event = %event.name, "Failed to send notification"),
    }
}

#[cfg(test)]
pub(crate) mod recording {
    //! [`Notifier`] that records calls, for tests.

    use super::*;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Identify(SubscriberId),
        Trigger(String),
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub calls: Mutex<Vec<Call>>,
        pub fail_identify: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn identify_subscriber(
            &self,
            subscriber: &Subscriber,
        ) -> jobby_core::Result<(), NotificationError> {
            self.calls
                .lock()
                .await
                .push(Call::Identify(subscriber.subscriber_id));
            if self.fail_identify {
                return Err(NotificationError::Rejected {
                    operation: "identify",
                    status: 500,
                    body: String::new(),
                }
                .into());
            }
            Ok(())
        }

        async fn trigger(&self, event: &TriggerEvent) -> jobby_core::Result<(), NotificationError> {
            self.calls.lock().await.push(Call::Trigger(event.name.clone()));
            Ok(())
        }
    }
}
