//! Tenant resolution from request hosts
//!
//! Studios are addressed as `<slug>.<root-domain>`. The backend middleware
//! feeds the `Host` header through [`extract_studio_slug`] and looks the slug
//! up in the `studios` table.

use crate::validation::validate_studio_slug;

/// Labels that can never be a studio slug
pub const RESERVED_SUBDOMAINS: &[&str] = &["www", "app", "api", "admin"];

/// Extract the studio slug from a `Host` header value.
///
/// Returns `None` for the bare root domain, reserved labels, nested
/// subdomains and hosts outside `root_domain`.
pub fn extract_studio_slug(host: &str, root_domain: &str) -> Option<String> {
    let host = strip_port(host.trim()).trim_end_matches('.').to_ascii_lowercase();
    let root = root_domain.trim().trim_end_matches('.').to_ascii_lowercase();

    if root.is_empty() {
        return None;
    }

    let label = host.strip_suffix(&root)?.strip_suffix('.')?;

    if label.is_empty() || label.contains('.') {
        return None;
    }

    if is_reserved(label) || validate_studio_slug(label).is_err() {
        return None;
    }

    Some(label.to_string())
}

/// Whether a label is reserved for platform hosts
pub fn is_reserved(label: &str) -> bool {
    RESERVED_SUBDOMAINS.contains(&label)
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals never carry a studio subdomain
    if host.starts_with('[') {
        return host;
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
