//! Scheduled messages and the delivery job
//!
//! Dispatch is at-least-once: due messages are claimed with a single
//! `UPDATE ... RETURNING`, fanned out one notification per family, and
//! each delivery outcome is stored in `message_deliveries` together with
//! the final status. A message left in `sending` longer than
//! [`SENDING_LEASE_SECS`] was abandoned mid-run and is claimed again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::{Notification, Notifier};
use crate::models::{dedupe_recipients, parse_status, DeliveryChannel, MessageStatus, MessageTarget, Recipient};

/// How long a claimed message may stay in `sending` before it is re-claimed
pub const SENDING_LEASE_SECS: i64 = 900;

/// Messaging service
#[derive(Clone)]
pub struct MessagingService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub subject: String,
    pub body: String,
    pub channel: String,
    pub target_type: String,
    pub target_class_ids: Vec<Uuid>,
    pub target_tags: Vec<String>,
    pub target_levels: Vec<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: String,
    pub recipient_count: i32,
    pub failed_count: i32,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledMessage {
    pub fn status(&self) -> AppResult<MessageStatus> {
        parse_status(&self.status, MessageStatus::parse, "message")
    }

    pub fn channel(&self) -> AppResult<DeliveryChannel> {
        parse_status(&self.channel, DeliveryChannel::parse, "delivery channel")
    }

    pub fn target(&self) -> AppResult<MessageTarget> {
        MessageTarget::from_parts(
            &self.target_type,
            self.target_class_ids.clone(),
            self.target_tags.clone(),
            self.target_levels.clone(),
        )
        .map_err(AppError::from)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageInput {
    #[validate(length(min = 1, max = 300, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Message body is required"))]
    pub body: String,
    #[serde(default = "default_channel")]
    pub channel: DeliveryChannel,
    pub target: MessageTarget,
    /// Schedule immediately; omitted keeps the message as a draft
    pub scheduled_for: Option<DateTime<Utc>>,
}

fn default_channel() -> DeliveryChannel {
    DeliveryChannel::Email
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageInput {
    #[validate(length(min = 1, max = 300, message = "Subject is required"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, message = "Message body is required"))]
    pub body: Option<String>,
    pub channel: Option<DeliveryChannel>,
    pub target: Option<MessageTarget>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleInput {
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageFilter {
    pub status: Option<MessageStatus>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct MessageDelivery {
    pub id: Uuid,
    pub message_id: Uuid,
    pub family_id: Uuid,
    pub family_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RecipientRow {
    family_id: Uuid,
    family_name: String,
    email: Option<String>,
    phone: Option<String>,
}

impl From<RecipientRow> for Recipient {
    fn from(row: RecipientRow) -> Self {
        Recipient {
            family_id: row.family_id,
            family_name: row.family_name,
            email: row.email,
            phone: row.phone,
        }
    }
}

/// Result of one notification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed(String),
    Skipped,
}

impl DeliveryStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed(_) => "failed",
            DeliveryStatus::Skipped => "skipped",
        }
    }

    fn error(&self) -> Option<&str> {
        match self {
            DeliveryStatus::Failed(e) => Some(e),
            DeliveryStatus::Skipped => Some("No contact details for channel"),
            DeliveryStatus::Sent => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub recipient: Recipient,
    pub status: DeliveryStatus,
}

#[derive(Debug, Default, Serialize)]
pub struct DispatchSummary {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    pub deliveries: usize,
    pub delivery_failures: usize,
}

const MESSAGE_COLUMNS: &str = "id, studio_id, subject, body, channel, target_type, target_class_ids, \
     target_tags, target_levels, scheduled_for, status, recipient_count, failed_count, \
     error_message, sent_at, created_by, created_at, updated_at";

/// Send one notification per recipient. Failures are captured per
/// recipient and never stop the loop.
pub async fn fan_out(
    message: &ScheduledMessage,
    channel: DeliveryChannel,
    recipients: &[Recipient],
    notifier: &dyn Notifier,
) -> Vec<DeliveryResult> {
    let mut results = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        if !recipient.is_reachable(channel) {
            results.push(DeliveryResult {
                recipient: recipient.clone(),
                status: DeliveryStatus::Skipped,
            });
            continue;
        }

        let notification = Notification {
            studio_id: message.studio_id,
            family_id: recipient.family_id,
            channel: channel.as_str().to_string(),
            email: if channel.wants_email() { recipient.email.clone() } else { None },
            phone: if channel.wants_sms() { recipient.phone.clone() } else { None },
            subject: message.subject.clone(),
            body: message.body.clone(),
            kind: "scheduled_message".to_string(),
            reference_id: Some(message.id),
        };

        let status = match notifier.send(&notification).await {
            Ok(()) => DeliveryStatus::Sent,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    family_id = %recipient.family_id,
                    error = %e,
                    "Message delivery failed"
                );
                DeliveryStatus::Failed(e.to_string())
            }
        };
        results.push(DeliveryResult {
            recipient: recipient.clone(),
            status,
        });
    }

    results
}

impl MessagingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_messages(&self, studio_id: Uuid, filter: &MessageFilter) -> AppResult<Vec<ScheduledMessage>> {
        let messages = sqlx::query_as::<_, ScheduledMessage>(&format!(
            r#"
            SELECT {} FROM scheduled_messages
            WHERE studio_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY COALESCE(scheduled_for, created_at) DESC
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(studio_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;
        Ok(messages)
    }

    pub async fn get_message(&self, studio_id: Uuid, message_id: Uuid) -> AppResult<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(&format!(
            "SELECT {} FROM scheduled_messages WHERE id = $1 AND studio_id = $2",
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Message".to_string()))
    }

    pub async fn create_message(
        &self,
        studio_id: Uuid,
        created_by: Uuid,
        input: CreateMessageInput,
    ) -> AppResult<ScheduledMessage> {
        input.validate()?;
        let target = input.target.normalized()?;
        if let Some(at) = input.scheduled_for {
            ensure_future(at)?;
        }
        let status = if input.scheduled_for.is_some() {
            MessageStatus::Scheduled
        } else {
            MessageStatus::Draft
        };
        let (target_type, class_ids, tags, levels) = target.into_parts();

        let message = sqlx::query_as::<_, ScheduledMessage>(&format!(
            r#"
            INSERT INTO scheduled_messages (studio_id, subject, body, channel, target_type,
                target_class_ids, target_tags, target_levels, scheduled_for, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.subject.trim())
        .bind(&input.body)
        .bind(input.channel.as_str())
        .bind(target_type)
        .bind(&class_ids)
        .bind(&tags)
        .bind(&levels)
        .bind(input.scheduled_for)
        .bind(status.as_str())
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, message_id = %message.id, status = %status, "Message created");
        Ok(message)
    }

    pub async fn update_message(
        &self,
        studio_id: Uuid,
        message_id: Uuid,
        input: UpdateMessageInput,
    ) -> AppResult<ScheduledMessage> {
        input.validate()?;
        let current = self.get_message(studio_id, message_id).await?;
        ensure_editable(current.status()?)?;

        let (target_type, class_ids, tags, levels) = match input.target {
            Some(target) => {
                let (t, c, g, l) = target.normalized()?.into_parts();
                (Some(t), Some(c), Some(g), Some(l))
            }
            None => (None, None, None, None),
        };

        let message = sqlx::query_as::<_, ScheduledMessage>(&format!(
            r#"
            UPDATE scheduled_messages SET
                subject = COALESCE($3, subject),
                body = COALESCE($4, body),
                channel = COALESCE($5, channel),
                target_type = COALESCE($6, target_type),
                target_class_ids = COALESCE($7, target_class_ids),
                target_tags = COALESCE($8, target_tags),
                target_levels = COALESCE($9, target_levels),
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2 AND status IN ('draft', 'scheduled')
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .bind(studio_id)
        .bind(input.subject.as_deref().map(str::trim))
        .bind(&input.body)
        .bind(input.channel.map(|c| c.as_str()))
        .bind(target_type)
        .bind(class_ids)
        .bind(tags)
        .bind(levels)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::InvalidStateTransition("Message is already being sent".to_string()))?;

        Ok(message)
    }

    /// Queue a draft (or reschedule a scheduled message)
    pub async fn schedule_message(
        &self,
        studio_id: Uuid,
        message_id: Uuid,
        input: ScheduleInput,
    ) -> AppResult<ScheduledMessage> {
        ensure_future(input.scheduled_for)?;
        self.transition(
            studio_id,
            message_id,
            &[MessageStatus::Draft, MessageStatus::Scheduled],
            MessageStatus::Scheduled,
            Some(input.scheduled_for),
        )
        .await
    }

    pub async fn cancel_message(&self, studio_id: Uuid, message_id: Uuid) -> AppResult<ScheduledMessage> {
        let message = self
            .transition(
                studio_id,
                message_id,
                &[MessageStatus::Draft, MessageStatus::Scheduled],
                MessageStatus::Cancelled,
                None,
            )
            .await?;
        tracing::info!(message_id = %message_id, "Message cancelled");
        Ok(message)
    }

    /// Drafts and cancelled messages may be removed
    pub async fn delete_message(&self, studio_id: Uuid, message_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM scheduled_messages WHERE id = $1 AND studio_id = $2 AND status IN ('draft', 'cancelled')",
        )
        .bind(message_id)
        .bind(studio_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_message(studio_id, message_id).await?;
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot delete a message that is {}",
                current.status
            )));
        }
        Ok(())
    }

    /// Claim a draft or scheduled message and deliver it now
    pub async fn send_now(
        &self,
        studio_id: Uuid,
        message_id: Uuid,
        notifier: &dyn Notifier,
    ) -> AppResult<ScheduledMessage> {
        let message = self
            .transition(
                studio_id,
                message_id,
                &[MessageStatus::Draft, MessageStatus::Scheduled],
                MessageStatus::Sending,
                Some(Utc::now()),
            )
            .await?;

        self.deliver_claimed(&message, notifier).await;
        self.get_message(studio_id, message_id).await
    }

    async fn transition(
        &self,
        studio_id: Uuid,
        message_id: Uuid,
        from: &[MessageStatus],
        to: MessageStatus,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> AppResult<ScheduledMessage> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let updated = sqlx::query_as::<_, ScheduledMessage>(&format!(
            r#"
            UPDATE scheduled_messages SET
                status = $4,
                scheduled_for = COALESCE($5, scheduled_for),
                claimed_at = CASE WHEN $4 = 'sending' THEN NOW() ELSE claimed_at END,
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2 AND status = ANY($3)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .bind(studio_id)
        .bind(&from)
        .bind(to.as_str())
        .bind(scheduled_for)
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(message) => Ok(message),
            None => {
                let current = self.get_message(studio_id, message_id).await?;
                Err(AppError::InvalidStateTransition(format!(
                    "Cannot move message from {} to {}",
                    current.status, to
                )))
            }
        }
    }

    // ========================================================================
    // Recipients & deliveries
    // ========================================================================

    /// Families a target resolves to, one per family
    pub async fn resolve_recipients(&self, studio_id: Uuid, target: &MessageTarget) -> AppResult<Vec<Recipient>> {
        let base = r#"
            SELECT DISTINCT f.id AS family_id, f.name AS family_name,
                   f.primary_email AS email, f.primary_phone AS phone
            FROM families f
        "#;

        let rows = match target {
            MessageTarget::Everyone => {
                sqlx::query_as::<_, RecipientRow>(&format!(
                    r#"{} WHERE f.studio_id = $1
                        AND EXISTS (SELECT 1 FROM students s WHERE s.family_id = f.id AND s.is_active)
                    ORDER BY family_name"#,
                    base
                ))
                .bind(studio_id)
                .fetch_all(&self.db)
                .await?
            }
            MessageTarget::Classes(class_ids) => {
                sqlx::query_as::<_, RecipientRow>(&format!(
                    r#"{}
                    JOIN students s ON s.family_id = f.id
                    JOIN enrollments e ON e.student_id = s.id AND e.status = 'active'
                    WHERE f.studio_id = $1 AND e.class_id = ANY($2)
                    ORDER BY family_name"#,
                    base
                ))
                .bind(studio_id)
                .bind(class_ids)
                .fetch_all(&self.db)
                .await?
            }
            MessageTarget::Tags(tags) => {
                sqlx::query_as::<_, RecipientRow>(&format!(
                    "{} WHERE f.studio_id = $1 AND f.tags && $2 ORDER BY family_name",
                    base
                ))
                .bind(studio_id)
                .bind(tags)
                .fetch_all(&self.db)
                .await?
            }
            MessageTarget::Levels(levels) => {
                sqlx::query_as::<_, RecipientRow>(&format!(
                    r#"{}
                    JOIN students s ON s.family_id = f.id
                    JOIN enrollments e ON e.student_id = s.id AND e.status = 'active'
                    JOIN classes c ON c.id = e.class_id
                    WHERE f.studio_id = $1 AND LOWER(TRIM(c.level)) = ANY($2)
                    ORDER BY family_name"#,
                    base
                ))
                .bind(studio_id)
                .bind(levels)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(dedupe_recipients(rows.into_iter().map(Recipient::from).collect()))
    }

    pub async fn preview_recipients(&self, studio_id: Uuid, target: MessageTarget) -> AppResult<Vec<Recipient>> {
        let target = target.normalized()?;
        self.resolve_recipients(studio_id, &target).await
    }

    pub async fn list_deliveries(&self, studio_id: Uuid, message_id: Uuid) -> AppResult<Vec<MessageDelivery>> {
        // Confirms the message belongs to the studio
        self.get_message(studio_id, message_id).await?;

        let deliveries = sqlx::query_as::<_, MessageDelivery>(
            r#"
            SELECT d.id, d.message_id, d.family_id, f.name AS family_name, d.email, d.phone,
                   d.status, d.error_message, d.created_at
            FROM message_deliveries d
            JOIN families f ON f.id = d.family_id
            WHERE d.message_id = $1
            ORDER BY f.name
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.db)
        .await?;
        Ok(deliveries)
    }

    // ========================================================================
    // Dispatch job
    // ========================================================================

    /// Deliver every scheduled message due at or before `now`
    pub async fn dispatch_due_messages(
        &self,
        now: DateTime<Utc>,
        notifier: &dyn Notifier,
    ) -> AppResult<DispatchSummary> {
        let lease_expired = now - chrono::Duration::seconds(SENDING_LEASE_SECS);
        let claimed = sqlx::query_as::<_, ScheduledMessage>(&format!(
            r#"
            UPDATE scheduled_messages SET status = 'sending', claimed_at = NOW(), updated_at = NOW()
            WHERE id IN (
                SELECT id FROM scheduled_messages
                WHERE (status = 'scheduled' AND scheduled_for <= $1)
                   OR (status = 'sending' AND claimed_at < $2)
                ORDER BY scheduled_for
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(now)
        .bind(lease_expired)
        .fetch_all(&self.db)
        .await?;

        let mut summary = DispatchSummary {
            claimed: claimed.len(),
            ..Default::default()
        };

        for message in &claimed {
            match self.deliver_claimed(message, notifier).await {
                Some((delivered, failures)) => {
                    summary.sent += 1;
                    summary.deliveries += delivered;
                    summary.delivery_failures += failures;
                }
                None => summary.failed += 1,
            }
        }

        if summary.claimed > 0 {
            tracing::info!(
                claimed = summary.claimed,
                sent = summary.sent,
                failed = summary.failed,
                delivery_failures = summary.delivery_failures,
                "Scheduled message dispatch finished"
            );
        }

        Ok(summary)
    }

    /// Deliver a message already in `sending`. Marks it `sent` or `failed`;
    /// returns `(deliveries, failed deliveries)` on success.
    async fn deliver_claimed(&self, message: &ScheduledMessage, notifier: &dyn Notifier) -> Option<(usize, usize)> {
        match self.deliver(message, notifier).await {
            Ok(counts) => Some(counts),
            Err(e) => {
                tracing::error!(message_id = %message.id, error = %e, "Scheduled message failed");
                let marked = sqlx::query(
                    r#"
                    UPDATE scheduled_messages
                    SET status = 'failed', error_message = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(message.id)
                .bind(e.to_string())
                .execute(&self.db)
                .await;
                if let Err(mark_err) = marked {
                    tracing::error!(message_id = %message.id, error = %mark_err, "Could not mark message failed");
                }
                None
            }
        }
    }

    async fn deliver(&self, message: &ScheduledMessage, notifier: &dyn Notifier) -> AppResult<(usize, usize)> {
        let channel = message.channel()?;
        let target = message.target()?;
        let recipients = self.resolve_recipients(message.studio_id, &target).await?;

        let results = fan_out(message, channel, &recipients, notifier).await;
        let failures = results
            .iter()
            .filter(|r| matches!(r.status, DeliveryStatus::Failed(_)))
            .count();

        let mut tx = self.db.begin().await?;
        for result in &results {
            sqlx::query(
                r#"
                INSERT INTO message_deliveries (message_id, family_id, email, phone, status, error_message)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(message.id)
            .bind(result.recipient.family_id)
            .bind(&result.recipient.email)
            .bind(&result.recipient.phone)
            .bind(result.status.as_str())
            .bind(result.status.error())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'sent', recipient_count = $2, failed_count = $3,
                error_message = NULL, sent_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(message.id)
        .bind(recipients.len() as i32)
        .bind(failures as i32)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            message_id = %message.id,
            recipients = recipients.len(),
            failures,
            "Scheduled message sent"
        );

        Ok((results.len(), failures))
    }
}

fn ensure_future(at: DateTime<Utc>) -> AppResult<()> {
    if at <= Utc::now() {
        return Err(AppError::validation("scheduled_for", "Scheduled time must be in the future"));
    }
    Ok(())
}

fn ensure_editable(status: MessageStatus) -> AppResult<()> {
    if !status.is_editable() {
        return Err(AppError::InvalidStateTransition(format!(
            "Message is {} and can no longer be changed",
            status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification and fails for the configured families
    struct MockNotifier {
        fail_for: Vec<Uuid>,
        sent: Mutex<Vec<Notification>>,
    }

    #[axum::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, notification: &Notification) -> AppResult<()> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail_for.contains(&notification.family_id) {
                return Err(AppError::NotificationService("mailbox unavailable".into()));
            }
            Ok(())
        }
    }

    fn message() -> ScheduledMessage {
        ScheduledMessage {
            id: Uuid::new_v4(),
            studio_id: Uuid::new_v4(),
            subject: "Recital rehearsal".into(),
            body: "Saturday 10am at the main hall".into(),
            channel: "email".into(),
            target_type: "everyone".into(),
            target_class_ids: vec![],
            target_tags: vec![],
            target_levels: vec![],
            scheduled_for: None,
            status: "sending".into(),
            recipient_count: 0,
            failed_count: 0,
            error_message: None,
            sent_at: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn recipient(email: Option<&str>, phone: Option<&str>) -> Recipient {
        Recipient {
            family_id: Uuid::new_v4(),
            family_name: "Nguyen".into(),
            email: email.map(String::from),
            phone: phone.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_fan_out_isolates_failures() {
        let failing = recipient(Some("b@example.com"), None);
        let recipients = vec![
            recipient(Some("a@example.com"), None),
            failing.clone(),
            recipient(Some("c@example.com"), None),
        ];
        let notifier = MockNotifier {
            fail_for: vec![failing.family_id],
            sent: Mutex::new(Vec::new()),
        };

        let results = fan_out(&message(), DeliveryChannel::Email, &recipients, &notifier).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, DeliveryStatus::Sent);
        assert!(matches!(results[1].status, DeliveryStatus::Failed(_)));
        assert_eq!(results[2].status, DeliveryStatus::Sent);
        assert_eq!(notifier.sent.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_fan_out_skips_unreachable() {
        let recipients = vec![recipient(Some("a@example.com"), None), recipient(None, Some("+15551234567"))];
        let notifier = MockNotifier {
            fail_for: vec![],
            sent: Mutex::new(Vec::new()),
        };

        let results = tokio_test::block_on(fan_out(&message(), DeliveryChannel::Sms, &recipients, &notifier));

        assert_eq!(results[0].status, DeliveryStatus::Skipped);
        assert_eq!(results[1].status, DeliveryStatus::Sent);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].email, None);
        assert_eq!(sent[0].phone.as_deref(), Some("+15551234567"));
        assert_eq!(sent[0].channel, "sms");
    }

    #[test]
    fn test_message_target_from_columns() {
        let mut msg = message();
        msg.target_type = "tag".into();
        msg.target_tags = vec!["Competition".into()];
        assert_eq!(msg.target().unwrap(), MessageTarget::Tags(vec!["competition".into()]));

        msg.target_tags.clear();
        assert!(msg.target().is_err());
    }

    #[test]
    fn test_create_input_parses_target() {
        let input: CreateMessageInput = serde_json::from_str(
            r#"{"subject":"Closed Monday","body":"Holiday","target":{"type":"level","values":["beginner"]}}"#,
        )
        .unwrap();
        assert_eq!(input.channel, DeliveryChannel::Email);
        assert_eq!(input.target, MessageTarget::Levels(vec!["beginner".into()]));
        assert!(input.scheduled_for.is_none());
    }

    #[test]
    fn test_delivery_status_errors() {
        assert_eq!(DeliveryStatus::Sent.error(), None);
        assert!(DeliveryStatus::Skipped.error().is_some());
        assert_eq!(DeliveryStatus::Failed("x".into()).error(), Some("x"));
    }

    #[test]
    fn test_ensure_editable() {
        assert!(ensure_editable(MessageStatus::Scheduled).is_ok());
        assert!(ensure_editable(MessageStatus::Sent).is_err());
    }
}
