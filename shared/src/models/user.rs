//! User, role and permission models

use serde::{Deserialize, Serialize};

/// Role of a user within a studio
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Admin,
    Instructor,
    Parent,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Admin => "admin",
            UserRole::Instructor => "instructor",
            UserRole::Parent => "parent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(UserRole::Owner),
            "admin" => Some(UserRole::Admin),
            "instructor" => Some(UserRole::Instructor),
            "parent" => Some(UserRole::Parent),
            _ => None,
        }
    }

    /// Owners and admins work in the back-office
    pub fn is_staff_admin(&self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources that can be accessed in the back-office
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Studio,
    Staff,
    Class,
    Family,
    Student,
    Enrollment,
    Attendance,
    Billing,
    Message,
    Announcement,
    Media,
    Waiver,
    Report,
}

impl Resource {
    pub const ALL: [Resource; 13] = [
        Resource::Studio,
        Resource::Staff,
        Resource::Class,
        Resource::Family,
        Resource::Student,
        Resource::Enrollment,
        Resource::Attendance,
        Resource::Billing,
        Resource::Message,
        Resource::Announcement,
        Resource::Media,
        Resource::Waiver,
        Resource::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Studio => "studio",
            Resource::Staff => "staff",
            Resource::Class => "class",
            Resource::Family => "family",
            Resource::Student => "student",
            Resource::Enrollment => "enrollment",
            Resource::Attendance => "attendance",
            Resource::Billing => "billing",
            Resource::Message => "message",
            Resource::Announcement => "announcement",
            Resource::Media => "media",
            Resource::Waiver => "waiver",
            Resource::Report => "report",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Export,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
        }
    }
}

/// Permission string in `resource:action` form, as carried in access tokens
pub fn permission_key(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

/// Permissions granted to each role
pub fn role_permissions(role: UserRole) -> Vec<String> {
    match role {
        UserRole::Owner => Resource::ALL
            .iter()
            .flat_map(|r| Action::ALL.iter().map(move |a| permission_key(*r, *a)))
            .collect(),
        UserRole::Admin => Resource::ALL
            .iter()
            .flat_map(|r| Action::ALL.iter().map(move |a| (*r, *a)))
            .filter(|(r, a)| !(*r == Resource::Studio && *a == Action::Delete))
            .map(|(r, a)| permission_key(r, a))
            .collect(),
        UserRole::Instructor => vec![
            permission_key(Resource::Class, Action::View),
            permission_key(Resource::Student, Action::View),
            permission_key(Resource::Attendance, Action::View),
            permission_key(Resource::Attendance, Action::Create),
            permission_key(Resource::Attendance, Action::Edit),
            permission_key(Resource::Announcement, Action::View),
            permission_key(Resource::Media, Action::View),
        ],
        // Parents only use the portal routes, which are scoped by family
        UserRole::Parent => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [UserRole::Owner, UserRole::Admin, UserRole::Instructor, UserRole::Parent] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("manager"), None);
    }

    #[test]
    fn test_owner_has_every_permission() {
        let perms = role_permissions(UserRole::Owner);
        assert_eq!(perms.len(), Resource::ALL.len() * Action::ALL.len());
        assert!(perms.contains(&"studio:delete".to_string()));
    }

    #[test]
    fn test_admin_cannot_delete_studio() {
        let perms = role_permissions(UserRole::Admin);
        assert!(!perms.contains(&"studio:delete".to_string()));
        assert!(perms.contains(&"billing:edit".to_string()));
        assert!(perms.contains(&"message:create".to_string()));
    }

    #[test]
    fn test_instructor_is_limited() {
        let perms = role_permissions(UserRole::Instructor);
        assert!(perms.contains(&"attendance:create".to_string()));
        assert!(!perms.contains(&"billing:view".to_string()));
        assert!(!perms.contains(&"class:delete".to_string()));
    }

    #[test]
    fn test_parent_has_no_back_office_permissions() {
        assert!(role_permissions(UserRole::Parent).is_empty());
    }
}
