//! Post-created notifications
//!
//! Creating a post emits a [`PostCreatedEvent`] through the
//! [`NotificationDispatcher`]. The send never blocks and never fails the
//! request: events go onto an unbounded channel drained by a single
//! background listener, which renders the `emails/post_created` template
//! and hands the message to a [`Mailer`].
//!
//! Each event moves from `Created` to `Notified`, or to `Failed` when
//! rendering or delivery fails. Failures are logged; there is no retry.

use crate::models::{Post, User};
use crate::services::mail::{MailError, Mailer, OutgoingMail};
use std::error::Error as _;
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Template name of the notification body
pub const POST_CREATED_TEMPLATE: &str = "emails/post_created";

/// Subject line of the notification
pub const POST_CREATED_SUBJECT: &str = "New Post!";

const POST_CREATED_SOURCE: &str = include_str!("../../templates/emails/post_created.txt");

/// Snapshot of a freshly created post and the user who created it
#[derive(Debug, Clone)]
pub struct PostCreatedEvent {
    pub post: Post,
    pub user: User,
}

/// Delivery state of a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Created,
    Notified,
    Failed,
}

/// Sending half of the notification channel
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<PostCreatedEvent>,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiver its events arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PostCreatedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue an event. Fire-and-forget.
    pub fn dispatch(&self, event: PostCreatedEvent) {
        let post_id = event.post.id;
        if self.sender.send(event).is_err() {
            tracing::warn!("Notification listener is gone, dropping event for post {}", post_id);
        }
    }
}

/// Renders notification e-mails from the embedded template
pub struct MailRenderer {
    tera: Tera,
}

impl MailRenderer {
    pub fn new() -> Result<Self, MailError> {
        let mut tera = Tera::default();
        tera.add_raw_template(POST_CREATED_TEMPLATE, POST_CREATED_SOURCE)
            .map_err(|e| MailError::Template(format!("Failed to add template: {}", e)))?;
        Ok(Self { tera })
    }

    pub fn render_post_created(&self, event: &PostCreatedEvent) -> Result<OutgoingMail, MailError> {
        let mut context = TeraContext::new();
        context.insert("user", &event.user);
        context.insert("post", &event.post);

        let body = self
            .tera
            .render(POST_CREATED_TEMPLATE, &context)
            .map_err(|e| {
                let mut message = e.to_string();
                let mut source = e.source();
                while let Some(cause) = source {
                    message.push_str(&format!("; caused by: {}", cause));
                    source = cause.source();
                }
                MailError::Template(message)
            })?;

        Ok(OutgoingMail {
            to_name: event.user.name.clone(),
            to_email: event.user.email.clone(),
            subject: POST_CREATED_SUBJECT.to_string(),
            body,
        })
    }
}

/// Consumes post-created events and sends the notification e-mails
pub struct PostCreatedListener {
    mailer: Arc<dyn Mailer>,
    renderer: MailRenderer,
}

impl PostCreatedListener {
    pub fn new(mailer: Arc<dyn Mailer>, renderer: MailRenderer) -> Self {
        Self { mailer, renderer }
    }

    /// Notify the event's user. Returns the final delivery state.
    pub async fn handle(&self, event: &PostCreatedEvent) -> DeliveryState {
        tracing::debug!(
            "Notifying {} about post {} ({:?})",
            event.user.email,
            event.post.id,
            DeliveryState::Created
        );

        let result = match self.renderer.render_post_created(event) {
            Ok(mail) => self.mailer.send(&mail).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "Sent post-created notification for post {} to {}",
                    event.post.id,
                    event.user.email
                );
                DeliveryState::Notified
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to notify {} about post {}: {}",
                    event.user.email,
                    event.post.id,
                    e
                );
                DeliveryState::Failed
            }
        }
    }

    /// Process events until every dispatcher has been dropped
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<PostCreatedEvent>) {
        while let Some(event) = receiver.recv().await {
            self.handle(&event).await;
        }
        tracing::debug!("Notification channel closed, listener stopping");
    }
}

/// Spawn the background listener task
pub fn spawn_listener(
    receiver: mpsc::UnboundedReceiver<PostCreatedEvent>,
    mailer: Arc<dyn Mailer>,
    renderer: MailRenderer,
) -> JoinHandle<()> {
    tokio::spawn(PostCreatedListener::new(mailer, renderer).run(receiver))
}
