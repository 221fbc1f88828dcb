//! Request extractors
//!
//! The acting user comes from the session cookie or a bearer header. A
//! resolved user + profile is memoized in the profile cache for a few seconds
//! so repeated requests skip the identity provider and the profile query.
//!
//! `ApiJson`, `ApiPath` and `ApiQuery` wrap axum's extractors so malformed
//! input is answered with the same JSON error body as every other failure.

use crate::AppState;
use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::{headers::Cookie, TypedHeader};
use minjok_common::{
    auth::extract_token,
    cache::CachedUser,
    db::models::Profile,
    errors::{AppError, Result},
    policy::Actor,
};
use tracing::{debug, warn};

/// JSON body; deserialization failures become `400 VALIDATION_ERROR`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters; a malformed id is a validation error
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Signed-in caller; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub actor: Actor,
    pub profile: Profile,
    /// Raw access token, kept to invalidate the cache entry after profile edits
    pub token: String,
}

impl CurrentUser {
    fn new(profile: Profile, token: String) -> Self {
        Self {
            actor: Actor::from(&profile),
            profile,
            token,
        }
    }
}

/// Caller if signed in; bad or expired tokens read as anonymous
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl OptionalUser {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref().map(|u| &u.actor)
    }
}

async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>> {
    let cookies = TypedHeader::<Cookie>::from_request_parts(parts, state).await.ok();
    let cookie = cookies
        .as_ref()
        .and_then(|TypedHeader(c)| c.get(&state.config.auth.session_cookie));
    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(token) = extract_token(cookie, authorization).map(String::from) else {
        return Ok(None);
    };

    match state.profile_cache.get(&token).await {
        Ok(Some(cached)) => {
            debug!(user_id = %cached.identity.user_id, "Current user served from cache");
            return Ok(Some(CurrentUser::new(cached.profile, token)));
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Profile cache read failed, resolving directly"),
    }

    let identity = state.identity.identify(&token).await?;
    let profile = state
        .services
        .profiles
        .find(identity.user_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound { .. } => AppError::Unauthorized {
                message: "No profile exists for this account".to_string(),
            },
            other => other,
        })?;

    let cached = CachedUser { identity, profile };
    if let Err(e) = state.profile_cache.put(&token, &cached).await {
        warn!(error = %e, "Profile cache write failed");
    }

    Ok(Some(CurrentUser::new(cached.profile, token)))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        resolve(parts, state).await?.ok_or_else(|| AppError::Unauthorized {
            message: "Sign in to continue".to_string(),
        })
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match resolve(parts, state).await {
            Ok(user) => Ok(OptionalUser(user)),
            Err(AppError::InvalidToken | AppError::ExpiredToken | AppError::Unauthorized { .. }) => {
                debug!("Ignoring unusable session on a public route");
                Ok(OptionalUser(None))
            }
            Err(e) => Err(e),
        }
    }
}
