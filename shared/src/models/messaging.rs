//! Scheduled messaging models and recipient targeting rules

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleError;
use crate::models::class::normalize_level;
use crate::models::family::normalize_tags;

/// Who a scheduled message is delivered to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum MessageTarget {
    /// Every family with at least one active student
    Everyone,
    /// Families with an active enrollment in any of the classes
    #[serde(rename = "class")]
    Classes(Vec<Uuid>),
    /// Families carrying any of the tags
    #[serde(rename = "tag")]
    Tags(Vec<String>),
    /// Families with an active enrollment in a class of any of the levels
    #[serde(rename = "level")]
    Levels(Vec<String>),
}

impl MessageTarget {
    /// Stored `target_type` column value
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageTarget::Everyone => "everyone",
            MessageTarget::Classes(_) => "class",
            MessageTarget::Tags(_) => "tag",
            MessageTarget::Levels(_) => "level",
        }
    }

    /// Rebuild a target from its stored columns
    pub fn from_parts(
        target_type: &str,
        class_ids: Vec<Uuid>,
        tags: Vec<String>,
        levels: Vec<String>,
    ) -> Result<Self, RuleError> {
        let target = match target_type {
            "everyone" => MessageTarget::Everyone,
            "class" => MessageTarget::Classes(class_ids),
            "tag" => MessageTarget::Tags(tags),
            "level" => MessageTarget::Levels(levels),
            _ => return Err(RuleError::Invalid("Unknown message target type")),
        };
        target.normalized()
    }

    /// Validate and normalize list values (dedupe ids, lowercase tags/levels)
    pub fn normalized(self) -> Result<Self, RuleError> {
        let target = match self {
            MessageTarget::Everyone => MessageTarget::Everyone,
            MessageTarget::Classes(ids) => {
                let mut seen = HashSet::new();
                let ids: Vec<Uuid> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
                if ids.is_empty() {
                    return Err(RuleError::Invalid("Class target requires at least one class"));
                }
                MessageTarget::Classes(ids)
            }
            MessageTarget::Tags(tags) => {
                let tags = normalize_tags(&tags);
                if tags.is_empty() {
                    return Err(RuleError::Invalid("Tag target requires at least one tag"));
                }
                MessageTarget::Tags(tags)
            }
            MessageTarget::Levels(levels) => {
                let mut levels: Vec<String> = levels
                    .iter()
                    .map(|l| normalize_level(l))
                    .filter(|l| !l.is_empty())
                    .collect();
                levels.sort();
                levels.dedup();
                if levels.is_empty() {
                    return Err(RuleError::Invalid("Level target requires at least one level"));
                }
                MessageTarget::Levels(levels)
            }
        };
        Ok(target)
    }

    /// Split into the stored `(target_type, class_ids, tags, levels)` columns
    pub fn into_parts(self) -> (&'static str, Vec<Uuid>, Vec<String>, Vec<String>) {
        let kind = self.type_name();
        match self {
            MessageTarget::Everyone => (kind, Vec::new(), Vec::new(), Vec::new()),
            MessageTarget::Classes(ids) => (kind, ids, Vec::new(), Vec::new()),
            MessageTarget::Tags(tags) => (kind, Vec::new(), tags, Vec::new()),
            MessageTarget::Levels(levels) => (kind, Vec::new(), Vec::new(), levels),
        }
    }
}

/// Scheduled message status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
    Cancelled,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Scheduled => "scheduled",
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(MessageStatus::Draft),
            "scheduled" => Some(MessageStatus::Scheduled),
            "sending" => Some(MessageStatus::Sending),
            "sent" => Some(MessageStatus::Sent),
            "failed" => Some(MessageStatus::Failed),
            "cancelled" => Some(MessageStatus::Cancelled),
            _ => None,
        }
    }

    /// Content and schedule may change only before dispatch starts
    pub fn is_editable(&self) -> bool {
        matches!(self, MessageStatus::Draft | MessageStatus::Scheduled)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel used to deliver a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Email,
    Sms,
    Both,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Email => "email",
            DeliveryChannel::Sms => "sms",
            DeliveryChannel::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(DeliveryChannel::Email),
            "sms" => Some(DeliveryChannel::Sms),
            "both" => Some(DeliveryChannel::Both),
            _ => None,
        }
    }

    pub fn wants_email(&self) -> bool {
        matches!(self, DeliveryChannel::Email | DeliveryChannel::Both)
    }

    pub fn wants_sms(&self) -> bool {
        matches!(self, DeliveryChannel::Sms | DeliveryChannel::Both)
    }
}

/// A family resolved as a message recipient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub family_id: Uuid,
    pub family_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    /// Whether the recipient can be reached on the channel
    pub fn is_reachable(&self, channel: DeliveryChannel) -> bool {
        let has_email = self.email.as_deref().is_some_and(|e| !e.trim().is_empty());
        let has_phone = self.phone.as_deref().is_some_and(|p| !p.trim().is_empty());
        (channel.wants_email() && has_email) || (channel.wants_sms() && has_phone)
    }
}

/// Keep one recipient per family, first occurrence wins
pub fn dedupe_recipients(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    recipients
        .into_iter()
        .filter(|r| seen.insert(r.family_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(id: Uuid, email: Option<&str>, phone: Option<&str>) -> Recipient {
        Recipient {
            family_id: id,
            family_name: "Rivera".to_string(),
            email: email.map(String::from),
            phone: phone.map(String::from),
        }
    }

    #[test]
    fn test_from_parts() {
        let id = Uuid::new_v4();
        assert_eq!(
            MessageTarget::from_parts("everyone", vec![], vec![], vec![]).unwrap(),
            MessageTarget::Everyone
        );
        assert_eq!(
            MessageTarget::from_parts("class", vec![id, id], vec![], vec![]).unwrap(),
            MessageTarget::Classes(vec![id])
        );
        assert_eq!(
            MessageTarget::from_parts("level", vec![], vec![], vec![" Advanced ".into(), "advanced".into()]).unwrap(),
            MessageTarget::Levels(vec!["advanced".into()])
        );
        assert!(MessageTarget::from_parts("everybody", vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_empty_lists_rejected() {
        assert!(MessageTarget::Classes(vec![]).normalized().is_err());
        assert!(MessageTarget::Tags(vec!["  ".into()]).normalized().is_err());
        assert!(MessageTarget::Levels(vec![]).normalized().is_err());
    }

    #[test]
    fn test_into_parts_roundtrip() {
        let target = MessageTarget::Tags(vec!["recital".into()]);
        let (kind, ids, tags, levels) = target.clone().into_parts();
        assert_eq!(MessageTarget::from_parts(kind, ids, tags, levels).unwrap(), target);
    }

    #[test]
    fn test_target_serde_shape() {
        let json = serde_json::to_value(MessageTarget::Tags(vec!["recital".into()])).unwrap();
        assert_eq!(json["type"], "tag");
        assert_eq!(json["values"][0], "recital");

        let everyone: MessageTarget = serde_json::from_str(r#"{"type":"everyone"}"#).unwrap();
        assert_eq!(everyone, MessageTarget::Everyone);
    }

    #[test]
    fn test_wire_tag_matches_stored_type() {
        let targets = [
            MessageTarget::Everyone,
            MessageTarget::Classes(vec![Uuid::nil()]),
            MessageTarget::Tags(vec!["recital".into()]),
            MessageTarget::Levels(vec!["beginner".into()]),
        ];
        for target in targets {
            let json = serde_json::to_value(&target).unwrap();
            assert_eq!(json["type"], target.type_name());
        }
        assert!(serde_json::from_str::<MessageTarget>(r#"{"type":"tags","values":["recital"]}"#).is_err());
    }

    #[test]
    fn test_status_editability() {
        assert!(MessageStatus::Draft.is_editable());
        assert!(MessageStatus::Scheduled.is_editable());
        assert!(!MessageStatus::Sending.is_editable());
        assert!(!MessageStatus::Sent.is_editable());
    }

    #[test]
    fn test_reachability() {
        let id = Uuid::new_v4();
        assert!(recipient(id, Some("a@b.co"), None).is_reachable(DeliveryChannel::Email));
        assert!(!recipient(id, Some("a@b.co"), None).is_reachable(DeliveryChannel::Sms));
        assert!(recipient(id, None, Some("+15551234567")).is_reachable(DeliveryChannel::Both));
        assert!(!recipient(id, Some(" "), None).is_reachable(DeliveryChannel::Both));
    }

    #[test]
    fn test_dedupe_recipients_keeps_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let list = vec![
            recipient(a, Some("first@a.co"), None),
            recipient(b, None, None),
            recipient(a, Some("second@a.co"), None),
        ];
        let out = dedupe_recipients(list);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].email.as_deref(), Some("first@a.co"));
    }
}
