//! Authentication service for studio registration, login, and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use shared::models::{role_permissions, UserRole};
use shared::validation::{validate_password, validate_studio_slug};
use shared::tenancy::is_reserved;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    default_currency: String,
}

/// Input for registering a new studio with its owner account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterStudioInput {
    #[validate(length(min = 1, max = 200, message = "Studio name is required"))]
    pub studio_name: String,
    pub studio_slug: String,
    #[validate(length(min = 1, max = 200, message = "Owner name is required"))]
    pub owner_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub timezone: Option<String>,
}

/// Response after successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub studio_id: Uuid,
    pub studio_slug: String,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// Input for creating a login for staff or a family
#[derive(Debug, Deserialize, Validate)]
pub struct InviteUserInput {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub role: UserRole,
    /// Initial password, to be changed by the user
    pub password: String,
    pub family_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub studio_id: Uuid,
    pub role: String,
    #[serde(default)]
    pub family_id: Option<Uuid>,
    #[serde(default)]
    pub staff_id: Option<Uuid>,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// User info from database
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub family_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub is_active: bool,
}

/// User as shown to admins and to the user themselves
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub family_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Current user profile with studio context
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub studio_id: Uuid,
    pub studio_slug: String,
    pub studio_name: String,
    pub permissions: Vec<String>,
}

const USER_SUMMARY_COLUMNS: &str =
    "id, email, name, role, family_id, staff_id, is_active, last_login_at, created_at";

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
            default_currency: config.billing.currency.to_uppercase(),
        }
    }

    /// Register a new studio with owner account
    pub async fn register_studio(&self, input: RegisterStudioInput) -> AppResult<RegisterResponse> {
        input.validate()?;

        let slug = input.studio_slug.trim().to_lowercase();
        validate_studio_slug(&slug).map_err(|m| AppError::validation("studio_slug", m))?;
        if is_reserved(&slug) {
            return Err(AppError::validation("studio_slug", "This subdomain is reserved"));
        }
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM studios WHERE slug = $1")
            .bind(&slug)
            .fetch_one(&self.db)
            .await?;

        if existing > 0 {
            return Err(AppError::Conflict {
                resource: "studio_slug".to_string(),
                message: "This subdomain is already taken".to_string(),
            });
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        let email = input.email.trim().to_lowercase();

        let mut tx = self.db.begin().await?;

        let studio_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO studios (slug, name, email, phone, timezone, currency)
            VALUES ($1, $2, $3, $4, COALESCE($5, 'America/New_York'), $6)
            RETURNING id
            "#,
        )
        .bind(&slug)
        .bind(input.studio_name.trim())
        .bind(&email)
        .bind(&input.phone)
        .bind(&input.timezone)
        .bind(&self.default_currency)
        .fetch_one(&mut *tx)
        .await?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (studio_id, email, password_hash, name, role)
            VALUES ($1, $2, $3, $4, 'owner')
            RETURNING id
            "#,
        )
        .bind(studio_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(input.owner_name.trim())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(studio_id = %studio_id, slug = %slug, "Registered new studio");

        let tokens = self.generate_tokens(user_id, studio_id, UserRole::Owner, None, None)?;
        self.store_refresh_token(user_id, &tokens.refresh_token).await?;

        Ok(RegisterResponse {
            studio_id,
            studio_slug: slug,
            user_id,
            tokens,
        })
    }

    /// Look up a studio id by its subdomain slug
    pub async fn resolve_studio(&self, slug: &str) -> AppResult<Uuid> {
        let slug = slug.trim().to_lowercase();
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM studios WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::UnknownStudio(slug))
    }

    /// Authenticate user with email and password within a studio
    pub async fn login(&self, studio_id: Uuid, email: &str, password: &str) -> AppResult<AuthTokens> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, studio_id, email, password_hash, name, role, family_id, staff_id, is_active
            FROM users
            WHERE studio_id = $1 AND email = $2
            "#,
        )
        .bind(studio_id)
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        let valid = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            tracing::debug!(studio_id = %studio_id, "Failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let role = Self::parse_role(&user.role)?;
        let tokens =
            self.generate_tokens(user.id, user.studio_id, role, user.family_id, user.staff_id)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Refresh access token using refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = Self::hash_token(refresh_token);

        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.studio_id, u.email, u.password_hash, u.name, u.role,
                   u.family_id, u.staff_id, u.is_active
            FROM refresh_tokens rt
            JOIN users u ON u.id = rt.user_id
            WHERE rt.token_hash = $1
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
              AND u.is_active = true
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        // Rotate: the presented token can only be used once
        sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1")
            .bind(&token_hash)
            .execute(&self.db)
            .await?;

        let role = Self::parse_role(&user.role)?;
        let tokens =
            self.generate_tokens(user.id, user.studio_id, role, user.family_id, user.staff_id)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Revoke a refresh token
    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(Self::hash_token(refresh_token))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Profile of the authenticated user
    pub async fn me(&self, studio_id: Uuid, user_id: Uuid) -> AppResult<MeResponse> {
        let user = sqlx::query_as::<_, UserSummary>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND studio_id = $2",
            USER_SUMMARY_COLUMNS
        ))
        .bind(user_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let (studio_slug, studio_name) =
            sqlx::query_as::<_, (String, String)>("SELECT slug, name FROM studios WHERE id = $1")
                .bind(studio_id)
                .fetch_one(&self.db)
                .await?;

        let permissions = role_permissions(Self::parse_role(&user.role)?);

        Ok(MeResponse {
            user,
            studio_id,
            studio_slug,
            studio_name,
            permissions,
        })
    }

    /// Create a login for an admin, instructor or parent
    pub async fn invite_user(
        &self,
        studio_id: Uuid,
        inviter_role: UserRole,
        input: InviteUserInput,
    ) -> AppResult<UserSummary> {
        input.validate()?;
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;

        match input.role {
            UserRole::Owner => {
                return Err(AppError::validation("role", "A studio has exactly one owner"));
            }
            UserRole::Admin if inviter_role != UserRole::Owner => {
                return Err(AppError::InsufficientPermissions);
            }
            UserRole::Parent => {
                let family_id = input
                    .family_id
                    .ok_or_else(|| AppError::validation("family_id", "Parent logins must be linked to a family"))?;
                self.ensure_owned(studio_id, "families", family_id, "Family").await?;
            }
            UserRole::Instructor => {
                let staff_id = input
                    .staff_id
                    .ok_or_else(|| AppError::validation("staff_id", "Instructor logins must be linked to a staff member"))?;
                self.ensure_owned(studio_id, "staff", staff_id, "Staff member").await?;
            }
            UserRole::Admin => {}
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let user = sqlx::query_as::<_, UserSummary>(&format!(
            r#"
            INSERT INTO users (studio_id, email, password_hash, name, role, family_id, staff_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (studio_id, email) DO NOTHING
            RETURNING {}
            "#,
            USER_SUMMARY_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(input.name.trim())
        .bind(input.role.as_str())
        .bind(input.family_id.filter(|_| input.role == UserRole::Parent))
        .bind(input.staff_id.filter(|_| input.role == UserRole::Instructor))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Conflict {
            resource: "email".to_string(),
            message: "A user with this email already exists".to_string(),
        })?;

        tracing::info!(studio_id = %studio_id, user_id = %user.id, role = %input.role, "Invited user");

        Ok(user)
    }

    /// List users of a studio
    pub async fn list_users(&self, studio_id: Uuid) -> AppResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(&format!(
            "SELECT {} FROM users WHERE studio_id = $1 ORDER BY role, name",
            USER_SUMMARY_COLUMNS
        ))
        .bind(studio_id)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    /// Enable or disable a login; the owner cannot be disabled
    pub async fn set_user_active(&self, studio_id: Uuid, user_id: Uuid, active: bool) -> AppResult<UserSummary> {
        let user = sqlx::query_as::<_, UserSummary>(&format!(
            r#"
            UPDATE users SET is_active = $3, updated_at = NOW()
            WHERE id = $1 AND studio_id = $2 AND role <> 'owner'
            RETURNING {}
            "#,
            USER_SUMMARY_COLUMNS
        ))
        .bind(user_id)
        .bind(studio_id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if !active {
            sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL")
                .bind(user_id)
                .execute(&self.db)
                .await?;
        }

        Ok(user)
    }

    /// Validate access token and return claims
    pub fn decode_access_token(token: &str, secret: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })
    }

    async fn ensure_owned(&self, studio_id: Uuid, table: &str, id: Uuid, what: &str) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1 AND studio_id = $2)",
            table
        ))
        .bind(id)
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound(what.to_string()))
        }
    }

    fn parse_role(role: &str) -> AppResult<UserRole> {
        UserRole::parse(role).ok_or_else(|| AppError::Internal(format!("Unknown role '{}'", role)))
    }

    /// Generate access and refresh tokens
    fn generate_tokens(
        &self,
        user_id: Uuid,
        studio_id: Uuid,
        role: UserRole,
        family_id: Option<Uuid>,
        staff_id: Option<Uuid>,
    ) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let access_claims = Claims {
            sub: user_id,
            studio_id,
            role: role.as_str().to_string(),
            family_id,
            staff_id,
            permissions: role_permissions(role),
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        let refresh_token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let token_hash = Self::hash_token(token);
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Hash a token for storage
    fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }
}
