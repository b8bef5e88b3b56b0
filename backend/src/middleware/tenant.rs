//! Subdomain tenancy middleware
//!
//! Resolves `<studio-slug>.<root-domain>` hosts to a studio and stores the
//! result in request extensions. Hosts without a studio label pass through.

use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::tenancy::extract_studio_slug;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Studio resolved from the request host
#[derive(Clone, Debug)]
pub struct Tenant {
    pub studio_id: Uuid,
    pub slug: String,
}

/// Header set by reverse proxies that rewrite `Host`
const FORWARDED_HOST: &str = "x-forwarded-host";

pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(FORWARDED_HOST)
        .or_else(|| request.headers().get(HOST))
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let slug = host
        .as_deref()
        .and_then(|h| extract_studio_slug(h, &state.config.tenancy.root_domain));

    if let Some(slug) = slug {
        let studio_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM studios WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(&state.db)
            .await;

        match studio_id {
            Ok(Some(studio_id)) => {
                tracing::Span::current().record("studio", slug.as_str());
                request.extensions_mut().insert(Tenant { studio_id, slug });
            }
            Ok(None) => {
                tracing::debug!(slug = %slug, "Request for unknown studio");
                return AppError::UnknownStudio(slug).into_response();
            }
            Err(e) => return AppError::from(e).into_response(),
        }
    }

    next.run(request).await
}

/// Extractor for the resolved studio; rejects hosts without one
#[derive(Clone, Debug)]
pub struct CurrentTenant(pub Tenant);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentTenant
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
            .get::<Tenant>()
            .cloned()
            .map(CurrentTenant)
            .ok_or(AppError::StudioRequired)
    }
}
