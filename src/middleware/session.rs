//! Request identity resolution.
//!
//! The identity provider is an external capability: given a request it either
//! names an authenticated principal or nothing. [`SessionResolver`] wraps it,
//! memoizes the answer in the request extensions and turns "auth required but
//! absent" into a redirect to the sign-in page.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::HeaderName, request::Parts},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    error::AppResult,
    models::{Principal, Session},
};

/// The authentication capability of the hosting environment
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, parts: &Parts) -> AppResult<Option<Principal>>;
}

/// Trusts identity headers injected by an authenticating reverse proxy
#[derive(Debug, Clone)]
pub struct HeaderIdentityProvider {
    user_header: HeaderName,
    email_header: HeaderName,
}

impl HeaderIdentityProvider {
    pub fn new(user_header: &str, email_header: &str) -> anyhow::Result<Self> {
        Ok(Self {
            user_header: HeaderName::try_from(user_header)?,
            email_header: HeaderName::try_from(email_header)?,
        })
    }

    fn header<'a>(parts: &'a Parts, name: &HeaderName) -> Option<&'a str> {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentityProvider {
    async fn identify(&self, parts: &Parts) -> AppResult<Option<Principal>> {
        let user = Self::header(parts, &self.user_header);
        let email = Self::header(parts, &self.email_header);

        match (user, email) {
            (Some(id), Some(email)) => Ok(Some(Principal {
                id: id.to_string(),
                email: email.to_string(),
            })),
            (Some(id), None) => {
                tracing::warn!(user_id = %id, "Identity header without email, treating as anonymous");
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

/// Rejection for routes that require a session: 303 to the sign-in page
#[derive(Debug, Clone)]
pub struct AuthRedirect {
    location: String,
}

impl AuthRedirect {
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.location).into_response()
    }
}

/// Per-request memo of the resolved session
#[derive(Clone)]
struct ResolvedSession(Session);

#[derive(Clone)]
pub struct SessionResolver {
    provider: Arc<dyn IdentityProvider>,
    sign_in_url: Arc<str>,
}

impl SessionResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>, sign_in_url: impl Into<Arc<str>>) -> Self {
        Self {
            provider,
            sign_in_url: sign_in_url.into(),
        }
    }

    fn redirect(&self) -> AuthRedirect {
        AuthRedirect {
            location: self.sign_in_url.to_string(),
        }
    }

    /// Resolves the caller's session, asking the identity provider at most once
    /// per request.
    ///
    /// With `require_auth` an anonymous caller gets `Err(AuthRedirect)`; without it
    /// the anonymous session is returned.
    pub async fn resolve_session(
        &self,
        parts: &mut Parts,
        require_auth: bool,
    ) -> Result<Session, AuthRedirect> {
        let session = match parts.extensions.get::<ResolvedSession>() {
            Some(resolved) => resolved.0.clone(),
            None => {
                let session = match self.provider.identify(parts).await {
                    Ok(Some(principal)) => Session::authenticated(principal),
                    Ok(None) => Session::anonymous(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Identity provider failed, treating request as anonymous");
                        Session::anonymous()
                    }
                };
                parts.extensions.insert(ResolvedSession(session.clone()));
                session
            }
        };

        if require_auth && !session.is_authenticated {
            tracing::debug!(uri = %parts.uri, "Unauthenticated request redirected to sign-in");
            return Err(self.redirect());
        }

        Ok(session)
    }
}

/// Extractor for routes that need a signed-in user
#[derive(Debug, Clone)]
pub struct RequireSession(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for RequireSession
where
    SessionResolver: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = SessionResolver::from_ref(state);
        let session = resolver.resolve_session(parts, true).await?;
        session
            .user
            .map(RequireSession)
            .ok_or_else(|| resolver.redirect())
    }
}

/// Extractor for routes that work with or without a signed-in user
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    SessionResolver: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = SessionResolver::from_ref(state);
        match resolver.resolve_session(parts, false).await {
            Ok(session) => Ok(MaybeSession(session)),
            Err(_) => Ok(MaybeSession(Session::anonymous())),
        }
    }
}
