//! Authentication middleware
//!
//! JWT authentication and role-based access control middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::models::{permission_key, Action, Resource, UserRole};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::tenant::Tenant;
use crate::services::auth::AuthService;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub studio_id: Uuid,
    pub role: UserRole,
    pub family_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = permission_key(resource, action);
        self.permissions.contains(&permission)
    }

    /// Family linked to a parent login
    pub fn family(&self) -> AppResult<Uuid> {
        self.family_id.ok_or_else(|| {
            AppError::Unauthorized("This account is not linked to a family".to_string())
        })
    }

    /// Staff record linked to an instructor login
    pub fn staff(&self) -> AppResult<Uuid> {
        self.staff_id.ok_or_else(|| {
            AppError::Unauthorized("This account is not linked to a staff member".to_string())
        })
    }
}

/// Authentication middleware that validates JWT tokens
///
/// When the tenant middleware resolved a studio, the token must belong to it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
                .into_response();
        }
    };

    let claims = match AuthService::decode_access_token(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    let role = match UserRole::parse(&claims.role) {
        Some(role) => role,
        None => return AppError::InvalidToken.into_response(),
    };

    if let Some(tenant) = request.extensions().get::<Tenant>() {
        if tenant.studio_id != claims.studio_id {
            tracing::warn!(
                user_id = %claims.sub,
                token_studio = %claims.studio_id,
                host_studio = %tenant.slug,
                "Token used against another studio"
            );
            return AppError::InsufficientPermissions.into_response();
        }
    }

    let auth_user = AuthUser {
        user_id: claims.sub,
        studio_id: claims.studio_id,
        role,
        family_id: claims.family_id,
        staff_id: claims.staff_id,
        permissions: claims.permissions,
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Limits the back office to owners and admins; runs after `auth_middleware`.
/// Instructors reach their own classes through the instructor portal.
pub async fn back_office_middleware(request: Request, next: Next) -> Response {
    let allowed = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.role.is_staff_admin());

    match allowed {
        Some(true) => next.run(request).await,
        Some(false) => AppError::InsufficientPermissions.into_response(),
        None => AppError::Unauthorized("Authentication required".to_string()).into_response(),
    }
}

/// Constant-time comparison for shared secrets
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, resource: Resource, action: Action) -> AppResult<()> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %user.user_id,
            permission = %permission_key(resource, action),
            "Permission denied"
        );
        Err(AppError::InsufficientPermissions)
    }
}

/// Role guard for the portal routes
pub fn require_role(user: &AuthUser, allowed: &[UserRole]) -> AppResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::role_permissions;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            studio_id: Uuid::new_v4(),
            role,
            family_id: None,
            staff_id: None,
            permissions: role_permissions(role),
        }
    }

    #[test]
    fn test_admin_permissions() {
        let admin = user(UserRole::Admin);
        assert!(check_permission(&admin, Resource::Billing, Action::Create).is_ok());
        assert!(check_permission(&admin, Resource::Studio, Action::Delete).is_err());
    }

    #[test]
    fn test_instructor_cannot_bill() {
        let instructor = user(UserRole::Instructor);
        assert!(check_permission(&instructor, Resource::Attendance, Action::Create).is_ok());
        assert!(check_permission(&instructor, Resource::Billing, Action::View).is_err());
    }

    #[test]
    fn test_require_role() {
        let parent = user(UserRole::Parent);
        assert!(require_role(&parent, &[UserRole::Parent]).is_ok());
        assert!(require_role(&parent, &[UserRole::Owner, UserRole::Admin]).is_err());
        assert!(parent.family().is_err());
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("cron-secret", "cron-secret"));
        assert!(!secrets_match("cron-secreT", "cron-secret"));
        assert!(!secrets_match("cron", "cron-secret"));
        assert!(!secrets_match("", "cron-secret"));
    }
}
