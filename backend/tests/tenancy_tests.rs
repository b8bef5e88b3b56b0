//! Tenant resolution and access control tests

use proptest::prelude::*;
use shared::models::{permission_key, role_permissions, Action, Resource, UserRole};
use shared::tenancy::{extract_studio_slug, is_reserved};

const ROOT: &str = "studiohub.app";

/// Slugs accepted by studio registration
fn slug_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{1,30}[a-z0-9]"
}

proptest! {
    #[test]
    fn prop_single_label_resolves(slug in slug_strategy(), port in proptest::option::of(1u16..65535)) {
        prop_assume!(!is_reserved(&slug));
        let host = match port {
            Some(port) => format!("{}.{}:{}", slug, ROOT, port),
            None => format!("{}.{}", slug, ROOT),
        };
        prop_assert_eq!(extract_studio_slug(&host, ROOT), Some(slug.clone()));
        prop_assert_eq!(extract_studio_slug(&host.to_uppercase(), ROOT), Some(slug));
    }

    #[test]
    fn prop_nested_or_foreign_hosts_rejected(slug in slug_strategy(), other in slug_strategy()) {
        let nested = format!("{}.{}.{}", other, slug, ROOT);
        let foreign = format!("{}.example.org", slug);
        prop_assert_eq!(extract_studio_slug(&nested, ROOT), None);
        prop_assert_eq!(extract_studio_slug(&foreign, ROOT), None);
    }
}

#[test]
fn test_bare_and_reserved_hosts() {
    assert_eq!(extract_studio_slug(ROOT, ROOT), None);
    assert_eq!(extract_studio_slug("localhost:3000", ROOT), None);
    for label in ["www", "app", "api", "admin"] {
        assert_eq!(extract_studio_slug(&format!("{}.{}", label, ROOT), ROOT), None);
    }
}

#[test]
fn test_invalid_labels_rejected() {
    assert_eq!(extract_studio_slug("ab.studiohub.app", ROOT), None);
    assert_eq!(extract_studio_slug("-tap-.studiohub.app", ROOT), None);
    assert_eq!(extract_studio_slug("tap_house.studiohub.app", ROOT), None);
}

#[test]
fn test_parents_have_no_back_office_permissions() {
    assert!(role_permissions(UserRole::Parent).is_empty());
}

#[test]
fn test_instructor_permissions_exclude_billing() {
    let perms = role_permissions(UserRole::Instructor);
    assert!(perms.contains(&permission_key(Resource::Attendance, Action::Create)));
    assert!(!perms.contains(&permission_key(Resource::Billing, Action::View)));
    assert!(!perms.contains(&permission_key(Resource::Family, Action::View)));
    assert!(!perms.contains(&permission_key(Resource::Message, Action::Create)));
}

#[test]
fn test_admin_cannot_delete_studio() {
    let perms = role_permissions(UserRole::Admin);
    assert!(!perms.contains(&permission_key(Resource::Studio, Action::Delete)));
    assert!(role_permissions(UserRole::Owner).contains(&permission_key(Resource::Studio, Action::Delete)));
}
