//! Outbound notification events.
//!
//! Services build events after their transaction commits and hand them to a
//! [`Notifier`]. The notifier only enqueues; a [`NotificationWorker`] drains the
//! queue into a [`NotificationSink`]. Nothing here can fail the operation that
//! produced the event.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

const DELIVERY_ATTEMPTS: u32 = 3;
const RETRY_STEP: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderCreated,
    OrderAssigned,
    OrderReassigned,
    OrderStatusChanged,
    OrderEscalated,
    OrdersImported,
    ProductPendingApproval,
    ProductApproved,
    ProductRejected,
    ProductDeleted,
    AccountApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationEvent {
    pub recipient_user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_role: Option<String>,
    pub related_entity_type: String,
    pub related_entity_id: String,
    pub related_url: String,
    pub created_at: DateTime<Utc>,
}

/// Event content without a recipient; fanned out per recipient by [`Notice::to`].
#[derive(Debug, Clone)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub target_role: Option<String>,
    pub related_entity_type: &'static str,
    pub related_entity_id: String,
    pub related_url: String,
}

impl Notice {
    pub fn order(
        kind: NotificationKind,
        order_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            priority: NotificationPriority::Medium,
            target_role: None,
            related_entity_type: "order",
            related_entity_id: order_id.to_string(),
            related_url: format!("/orders/{order_id}"),
        }
    }

    pub fn product(
        kind: NotificationKind,
        product_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            priority: NotificationPriority::Medium,
            target_role: None,
            related_entity_type: "product",
            related_entity_id: product_id.to_string(),
            related_url: format!("/products/{product_id}"),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_role(mut self, role: impl Into<String>) -> Self {
        self.target_role = Some(role.into());
        self
    }

    pub fn to(&self, recipients: &[Uuid]) -> Vec<NotificationEvent> {
        let now = Utc::now();
        recipients
            .iter()
            .map(|recipient| NotificationEvent {
                recipient_user_id: *recipient,
                title: self.title.clone(),
                message: self.message.clone(),
                kind: self.kind,
                priority: self.priority,
                target_role: self.target_role.clone(),
                related_entity_type: self.related_entity_type.to_string(),
                related_entity_id: self.related_entity_id.clone(),
                related_url: self.related_url.clone(),
                created_at: now,
            })
            .collect()
    }
}

/// Who receives an event.
#[derive(Debug, Clone)]
pub enum Audience {
    /// The owner of a seller-owned entity. Sellers who are themselves admins
    /// already see the admin feed and are skipped.
    Seller { user_id: Uuid, is_admin: bool },
    /// Every active admin except the actor.
    Admins { user_ids: Vec<Uuid>, actor: Option<Uuid> },
    /// An agent, for assignment traffic.
    Agent(Uuid),
    User(Uuid),
}

impl Audience {
    pub fn recipients(&self) -> Vec<Uuid> {
        match self {
            Audience::Seller { is_admin: true, .. } => Vec::new(),
            Audience::Seller { user_id, .. } => vec![*user_id],
            Audience::Admins { user_ids, actor } => {
                let mut out: Vec<Uuid> = Vec::with_capacity(user_ids.len());
                for id in user_ids {
                    if Some(*id) != *actor && !out.contains(id) {
                        out.push(*id);
                    }
                }
                out
            }
            Audience::Agent(id) | Audience::User(id) => vec![*id],
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> anyhow::Result<()>;
}

/// Writes each event as JSON through `tracing`.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            target: "notifications",
            recipient = %event.recipient_user_id,
            kind = ?event.kind,
            %payload,
            "notification"
        );
        Ok(())
    }
}

/// Cheap handle used by services to enqueue events.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    /// Create the queue and spawn a worker draining it into `sink`.
    pub fn spawn(buffer: usize, sink: Arc<dyn NotificationSink>) -> Self {
        let (notifier, rx) = Self::channel(buffer);
        tokio::spawn(NotificationWorker::new(sink).run(rx));
        notifier
    }

    /// Queue without a worker; the caller owns the receiving end.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: NotificationEvent) {
        if let Err(err) = self.tx.try_send(event) {
            let (reason, event) = match err {
                mpsc::error::TrySendError::Full(event) => ("queue full", event),
                mpsc::error::TrySendError::Closed(event) => ("queue closed", event),
            };
            tracing::warn!(
                recipient = %event.recipient_user_id,
                kind = ?event.kind,
                reason,
                "notification dropped"
            );
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = NotificationEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn notify(&self, notice: &Notice, audience: &Audience) {
        self.emit_all(notice.to(&audience.recipients()));
    }
}

pub struct NotificationWorker {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationWorker {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Runs until every [`Notifier`] handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<NotificationEvent>) {
        tracing::info!("notification worker started");

        while let Some(event) = rx.recv().await {
            self.deliver_with_retry(&event).await;
        }

        tracing::info!("notification channel closed, worker stopping");
    }

    async fn deliver_with_retry(&self, event: &NotificationEvent) {
        for attempt in 1..=DELIVERY_ATTEMPTS {
            match self.sink.deliver(event).await {
                Ok(()) => return,
                Err(err) if attempt < DELIVERY_ATTEMPTS => {
                    tracing::debug!(attempt, error = %err, "notification delivery failed, retrying");
                    tokio::time::sleep(RETRY_STEP * attempt).await;
                }
                Err(err) => {
                    tracing::warn!(
                        recipient = %event.recipient_user_id,
                        kind = ?event.kind,
                        error = %err,
                        "notification delivery gave up"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_exclude_the_actor_and_repeats() {
        let (a, b, actor) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let audience = Audience::Admins {
            user_ids: vec![a, actor, b, a],
            actor: Some(actor),
        };
        assert_eq!(audience.recipients(), vec![a, b]);

        let unattributed = Audience::Admins {
            user_ids: vec![a, b],
            actor: None,
        };
        assert_eq!(unattributed.recipients(), vec![a, b]);
    }

    #[test]
    fn admin_sellers_hear_nothing_as_sellers() {
        let user_id = Uuid::new_v4();
        assert!(Audience::Seller { user_id, is_admin: true }.recipients().is_empty());
        assert_eq!(
            Audience::Seller { user_id, is_admin: false }.recipients(),
            vec![user_id]
        );
        assert_eq!(Audience::Agent(user_id).recipients(), vec![user_id]);
    }

    #[tokio::test]
    async fn notices_fan_out_one_event_per_recipient() {
        let (notifier, mut rx) = Notifier::channel(8);
        let order_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let notice = Notice::order(NotificationKind::OrderEscalated, order_id, "Escalated", "Needs a manager")
            .with_priority(NotificationPriority::High)
            .for_role("Call Center Manager");

        notifier.notify(&notice, &Audience::Admins { user_ids: vec![a, b], actor: Some(b) });
        drop(notifier);

        let event = rx.recv().await.expect("event");
        assert_eq!(event.recipient_user_id, a);
        assert_eq!(event.priority, NotificationPriority::High);
        assert_eq!(event.related_url, format!("/orders/{order_id}"));
        assert_eq!(event.target_role.as_deref(), Some("Call Center Manager"));
        assert!(rx.recv().await.is_none());
    }
}
