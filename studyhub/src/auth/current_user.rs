use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Extract a session token from the session cookie.
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(token)): Cookie found
/// - Some(Err(error)): Cookie header present but not valid UTF-8
fn session_cookie_token<'a>(parts: &'a Parts, config: &Config) -> Option<Result<&'a str>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;
    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session.cookie_name;

    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| name == cookie_name)
        .map(|(_, value)| Ok(value))
}

/// Extract a session token from an `Authorization: Bearer` header.
fn bearer_token(parts: &Parts) -> Option<Result<&str>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    match auth_header.to_str() {
        Ok(value) => value.strip_prefix("Bearer ").map(|token| Ok(token.trim())),
        Err(e) => Some(Err(Error::BadRequest {
            message: format!("Invalid authorization header: {e}"),
        })),
    }
}

/// Verify a token and reload the user, so deleted accounts and role changes
/// take effect before the token expires.
async fn authenticate(token: &str, state: &AppState) -> Result<CurrentUser> {
    let claims = session::verify_session_token(token, &state.config)?;
    let user = state
        .store
        .get_user(claims.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;
    Ok(CurrentUser::from(&user))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Cookie first, then bearer header. A bad cookie does not block a good header.
        let candidates = [
            ("session cookie", session_cookie_token(parts, &state.config)),
            ("bearer token", bearer_token(parts)),
        ];

        let mut any_auth_attempted = false;
        for (method, candidate) in candidates {
            match candidate {
                Some(Ok(token)) => {
                    any_auth_attempted = true;
                    match authenticate(token, state).await {
                        Ok(user) => {
                            debug!("Authenticated user {} via {}", user.id, method);
                            return Ok(user);
                        }
                        Err(Error::Unauthenticated { .. }) => {
                            trace!("{} did not authenticate", method);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Some(Err(e)) => {
                    any_auth_attempted = true;
                    trace!("{} unreadable: {:?}", method, e);
                }
                None => {}
            }
        }

        if !any_auth_attempted {
            trace!("No authentication credentials found in request");
        }
        Err(Error::Unauthenticated { message: None })
    }
}
