//! Request middleware: subdomain tenancy and JWT authentication

pub mod auth;
pub mod tenant;

pub use auth::{
    auth_middleware, back_office_middleware, check_permission, require_role, secrets_match, AuthUser,
    CurrentUser,
};
pub use tenant::{tenant_middleware, CurrentTenant, Tenant};
