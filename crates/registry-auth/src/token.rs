//! Login and token refresh endpoint calls
//!
//! Two interactions with the backend:
//! 1. `POST {login_path}` with `{username, password}` (fallback re-authentication)
//! 2. `PUT {refresh_path}` with the current token as bearer auth
//!
//! Response shapes vary between backend versions, so the token is looked up
//! across [`TOKEN_FIELDS`] instead of deserializing a fixed struct.

use std::time::Duration;

use common::Secret;
use serde::Serialize;
use tracing::debug;

use crate::constants::TOKEN_FIELDS;
use crate::error::{Error, Result};

/// Username/password pair used for automatic re-authentication.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    /// User object, when the backend includes one
    pub user: Option<serde_json::Value>,
}

/// Pull a bearer token out of a free-form response payload.
///
/// Tries each of [`TOKEN_FIELDS`] in order and accepts the first one whose
/// value is a string. Non-object payloads yield `None`.
pub fn extract_token(payload: &serde_json::Value) -> Option<String> {
    let object = payload.as_object()?;
    TOKEN_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Exchange credentials for a token.
pub async fn login(
    client: &reqwest::Client,
    url: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<LoginOutcome> {
    let response = client
        .post(url)
        .timeout(timeout)
        .json(&LoginBody {
            username: &credentials.username,
            password: credentials.password.expose(),
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Login(format!("login endpoint returned {status}: {body}")));
    }

    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::Login(format!("invalid login response: {e}")))?;

    let token = extract_token(&payload)
        .ok_or_else(|| Error::Login("login response carried no token".into()))?;
    let user = payload.get("user").filter(|u| !u.is_null()).cloned();
    debug!(has_user = user.is_some(), "login succeeded");

    Ok(LoginOutcome { token, user })
}

/// Trade the current token for a new one.
///
/// Returns `Ok(None)` when the endpoint answered 2xx but no token could be
/// extracted (including non-JSON bodies); callers treat that like a failed
/// refresh. Transport and non-2xx failures are errors.
pub async fn refresh(
    client: &reqwest::Client,
    url: &str,
    current: &str,
    timeout: Duration,
) -> Result<Option<String>> {
    let response = client
        .put(url)
        .timeout(timeout)
        .bearer_auth(current)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Refresh(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading refresh response: {e}")))?;

    Ok(serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|payload| extract_token(&payload)))
}
