//! Announcement models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::UserRole;

/// Who sees an announcement in the portals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementAudience {
    Everyone,
    Parents,
    Staff,
}

impl AnnouncementAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementAudience::Everyone => "everyone",
            AnnouncementAudience::Parents => "parents",
            AnnouncementAudience::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "everyone" => Some(AnnouncementAudience::Everyone),
            "parents" => Some(AnnouncementAudience::Parents),
            "staff" => Some(AnnouncementAudience::Staff),
            _ => None,
        }
    }

    /// Audience values visible to a role
    pub fn visible_for(role: UserRole) -> &'static [&'static str] {
        match role {
            UserRole::Parent => &["everyone", "parents"],
            UserRole::Instructor => &["everyone", "staff"],
            UserRole::Owner | UserRole::Admin => &["everyone", "parents", "staff"],
        }
    }
}

/// Whether an announcement is live for a role at `now`
pub fn is_visible_to(
    audience: AnnouncementAudience,
    role: UserRole,
    published_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let published = published_at.is_some_and(|p| p <= now);
    let expired = expires_at.is_some_and(|e| e <= now);
    published && !expired && AnnouncementAudience::visible_for(role).contains(&audience.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_visibility_by_role() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        assert!(is_visible_to(AnnouncementAudience::Parents, UserRole::Parent, past, None, now));
        assert!(!is_visible_to(AnnouncementAudience::Staff, UserRole::Parent, past, None, now));
        assert!(is_visible_to(AnnouncementAudience::Staff, UserRole::Instructor, past, None, now));
        assert!(is_visible_to(AnnouncementAudience::Parents, UserRole::Admin, past, None, now));
    }

    #[test]
    fn test_visibility_window() {
        let now = Utc::now();
        let future = Some(now + Duration::hours(1));
        let past = Some(now - Duration::hours(1));
        assert!(!is_visible_to(AnnouncementAudience::Everyone, UserRole::Parent, None, None, now));
        assert!(!is_visible_to(AnnouncementAudience::Everyone, UserRole::Parent, future, None, now));
        assert!(!is_visible_to(AnnouncementAudience::Everyone, UserRole::Parent, past, past, now));
        assert!(is_visible_to(AnnouncementAudience::Everyone, UserRole::Parent, past, future, now));
    }
}
