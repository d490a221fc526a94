//! The authenticated client
//!
//! Wraps a `reqwest::Client` bound to one backend origin. Callers hand it an
//! [`ApiRequest`]; it attaches the stored token, and on 401 runs the
//! recovery chain (refresh, then login with configured credentials) before
//! replaying. Recovery network calls go through the [`RefreshCoordinator`],
//! so concurrent failures share one call.

use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use bytes::Bytes;
use registry_auth::{
    Credentials, DEFAULT_HEALTH_PATH, DEFAULT_HEALTH_TIMEOUT, DEFAULT_LOGIN_PATH,
    DEFAULT_REFRESH_PATH, DEFAULT_REFRESH_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, Error as AuthError,
    LOGIN_SCREEN_PATH, LoginOutcome, TokenStore, token,
};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::{Span, debug, info, instrument, warn};

use crate::coordinator::{RefreshCoordinator, RefreshGuard, Slot};
use crate::error::{Error, Result};
use crate::redirect::LoginRedirect;
use crate::request::{ApiRequest, bearer, join_url};

/// Recovery rounds allowed per request before giving up.
pub const DEFAULT_MAX_AUTH_ROUNDS: u32 = 3;

/// Backend location, endpoint paths and timeouts.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub health_path: String,
    pub request_timeout: Duration,
    pub refresh_timeout: Duration,
    pub health_timeout: Duration,
    /// 401 responses tolerated for one request before it fails as auth-required
    pub max_auth_rounds: u32,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            max_auth_rounds: DEFAULT_MAX_AUTH_ROUNDS,
        }
    }

    /// Absolute URL for a backend path.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// HTTP client that keeps requests authenticated.
///
/// Share it behind an `Arc`; all state (token store, default headers,
/// refresh coordination) is internally synchronized.
pub struct AuthClient {
    http: reqwest::Client,
    settings: ClientSettings,
    store: Arc<dyn TokenStore>,
    credentials: Option<Credentials>,
    coordinator: RefreshCoordinator,
    default_headers: RwLock<HeaderMap>,
    redirect: LoginRedirect,
}

impl AuthClient {
    pub fn new(http: reqwest::Client, settings: ClientSettings, store: Arc<dyn TokenStore>) -> Self {
        Self {
            http,
            settings,
            store,
            credentials: None,
            coordinator: RefreshCoordinator::new(),
            default_headers: RwLock::new(HeaderMap::new()),
            redirect: LoginRedirect::new(LOGIN_SCREEN_PATH),
        }
    }

    /// Credentials for automatic re-authentication. `None` disables fallback login.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_redirect(mut self, redirect: LoginRedirect) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Snapshot of the headers applied to every outbound request.
    pub fn default_headers(&self) -> HeaderMap {
        self.read_defaults().clone()
    }

    pub fn set_default_header(&self, name: HeaderName, value: HeaderValue) {
        self.write_defaults(|headers| {
            headers.insert(name, value);
        });
    }

    /// Send a request, recovering transparently from expired tokens.
    ///
    /// Returns the backend's response for any status other than an
    /// unrecoverable 401, which becomes [`AuthError::AuthRequired`].
    #[instrument(skip_all, fields(method = %request.method(), path = %request.path(), request_id = tracing::field::Empty))]
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        Span::current().record("request_id", request_id.as_str());

        self.run(|token| {
            let defaults = self.default_headers();
            request.build(
                &self.http,
                &self.settings.base_url,
                &defaults,
                token,
                self.settings.request_timeout,
                &request_id,
            )
        })
        .await
    }

    /// Send a pre-built request.
    ///
    /// Requests with a streaming body cannot be replayed: they are sent once
    /// with the current token and a 401 is returned as-is.
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    pub async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        let body = match request.body() {
            None => Some(None),
            Some(body) => body.as_bytes().map(|b| Some(Bytes::copy_from_slice(b))),
        };

        let Some(body) = body else {
            debug!("request body cannot be replayed, sending once");
            let token = self.current_or_login().await?;
            let mut headers = self.merged_headers(request.headers());
            headers.insert(AUTHORIZATION, bearer(&token)?);
            *request.headers_mut() = headers;
            return Ok(self.http.execute(request).await?);
        };

        let method = request.method().clone();
        let url = request.url().clone();
        let headers = request.headers().clone();
        let timeout = request.timeout().copied();

        self.run(|token| {
            let mut attempt = reqwest::Request::new(method.clone(), url.clone());
            *attempt.headers_mut() = self.merged_headers(&headers);
            attempt.headers_mut().insert(AUTHORIZATION, bearer(token)?);
            *attempt.timeout_mut() = timeout.or(Some(self.settings.request_timeout));
            if let Some(bytes) = &body {
                *attempt.body_mut() = Some(bytes.clone().into());
            }
            Ok(attempt)
        })
        .await
    }

    /// Log in with the configured credentials and store the token.
    pub async fn login(&self) -> Result<LoginOutcome> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| AuthError::Login("no credentials configured".into()))?;

        match self.coordinator.acquire_or_join() {
            Slot::Follower(waiter) => {
                crate::metrics::record_queued();
                let token = waiter.wait().await?;
                Ok(LoginOutcome { token, user: None })
            }
            Slot::Leader(guard) => {
                let url = self.settings.url(&self.settings.login_path);
                match token::login(&self.http, &url, credentials, self.settings.request_timeout)
                    .await
                {
                    Ok(outcome) => {
                        crate::metrics::record_login("success");
                        self.install_token(&outcome.token).await?;
                        info!(username = %credentials.username, "logged in");
                        guard.release(Ok(outcome.token.clone()));
                        Ok(outcome)
                    }
                    Err(e) => {
                        crate::metrics::record_login("error");
                        guard.release(Err(e.clone()));
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Forget the session.
    pub async fn logout(&self) -> Result<()> {
        self.clear_session().await?;
        info!("logged out");
        Ok(())
    }

    /// Check the stored session, discarding it if its token has expired.
    ///
    /// Returns whether a usable token remains. Tokens without a decodable
    /// expiry are assumed valid.
    pub async fn restore_session(&self) -> Result<bool> {
        let Some(token) = self.store.get().await else {
            return Ok(false);
        };

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        if registry_auth::is_expired(&token, now) {
            info!("stored token has expired, clearing session");
            self.clear_session().await?;
            return Ok(false);
        }

        self.set_default_header(AUTHORIZATION, bearer(&token)?);
        Ok(true)
    }

    /// Unauthenticated liveness probe with the short health timeout.
    pub async fn probe_health(&self) -> bool {
        let url = self.settings.url(&self.settings.health_path);
        match self
            .http
            .get(&url)
            .timeout(self.settings.health_timeout)
            .send()
            .await
        {
            Ok(response) => {
                debug!(status = %response.status(), "health probe answered");
                response.status().is_success()
            }
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        }
    }

    /// Attempt loop shared by `send` and `execute`.
    async fn run<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&str) -> Result<reqwest::Request>,
    {
        let mut token = self.current_or_login().await?;
        let mut retried = false;
        let mut rounds = 0u32;

        loop {
            let response = self.http.execute(build(&token)?).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            rounds += 1;
            if rounds > self.settings.max_auth_rounds {
                warn!(rounds, "backend keeps rejecting fresh tokens, giving up");
                return Err(self.auth_failed().await.into());
            }

            token = if retried {
                debug!("401 on replayed request, re-authenticating");
                let token = self.reauthenticate().await?;
                retried = false;
                token
            } else {
                debug!("401, recovering token");
                retried = true;
                self.recover(&token).await?
            };
        }
    }

    /// Stored token, or a shared login when there is none.
    async fn current_or_login(&self) -> Result<String> {
        if let Some(token) = self.store.get().await {
            return Ok(token);
        }

        debug!("no stored token, authenticating before send");
        match self.coordinator.acquire_or_join() {
            Slot::Follower(waiter) => {
                crate::metrics::record_queued();
                Ok(waiter.wait().await?)
            }
            Slot::Leader(guard) => {
                // A flight that ended between our read and acquire may have stored one
                if let Some(token) = self.store.get().await {
                    guard.release(Ok(token.clone()));
                    return Ok(token);
                }
                Ok(self.fallback(guard).await?)
            }
        }
    }

    /// First 401 for a request: join the running refresh or lead a new one.
    async fn recover(&self, sent: &str) -> std::result::Result<String, AuthError> {
        let guard = match self.coordinator.acquire_or_join() {
            Slot::Follower(waiter) => {
                crate::metrics::record_queued();
                return waiter.wait().await;
            }
            Slot::Leader(guard) => guard,
        };

        let Some(current) = self.store.get().await else {
            debug!("no stored token to refresh, falling back to login");
            return self.fallback(guard).await;
        };

        if current != sent {
            // Another flight already replaced the token this request was sent with
            crate::metrics::record_refresh("stale");
            debug!("token replaced since send, replaying without refresh");
            guard.release(Ok(current.clone()));
            return Ok(current);
        }

        let url = self.settings.url(&self.settings.refresh_path);
        match token::refresh(&self.http, &url, &current, self.settings.refresh_timeout).await {
            Ok(Some(fresh)) => {
                crate::metrics::record_refresh("success");
                self.install_token(&fresh).await?;
                info!("token refreshed");
                guard.release(Ok(fresh.clone()));
                Ok(fresh)
            }
            Ok(None) => {
                crate::metrics::record_refresh("no_token");
                warn!("refresh response carried no token, falling back to login");
                self.fallback(guard).await
            }
            Err(e) => {
                crate::metrics::record_refresh("error");
                // Queued requests get the refresh error; this one still tries login
                let rejected = guard.fail_pending(&e);
                warn!(error = %e, rejected, "token refresh failed, falling back to login");
                self.fallback(guard).await
            }
        }
    }

    /// 401 on an already-recovered request: drop the token and log in again.
    async fn reauthenticate(&self) -> std::result::Result<String, AuthError> {
        if let Err(e) = self.clear_session().await {
            warn!(error = %e, "failed to clear stored token");
        }

        match self.join_or_login().await {
            // The joined refresh failed but its leader is still trying login
            Err(e) if !e.is_auth_error() => {
                debug!(error = %e, "joined refresh failed, waiting for login fallback");
                self.join_or_login().await
            }
            outcome => outcome,
        }
    }

    async fn join_or_login(&self) -> std::result::Result<String, AuthError> {
        match self.coordinator.acquire_or_join() {
            Slot::Follower(waiter) => {
                crate::metrics::record_queued();
                waiter.wait().await
            }
            Slot::Leader(guard) => {
                if let Some(token) = self.store.get().await {
                    guard.release(Ok(token.clone()));
                    return Ok(token);
                }
                self.fallback(guard).await
            }
        }
    }

    /// Log in with configured credentials and settle the flight.
    async fn fallback(&self, guard: RefreshGuard<'_>) -> std::result::Result<String, AuthError> {
        let Some(credentials) = &self.credentials else {
            crate::metrics::record_login("no_credentials");
            debug!("no fallback credentials configured");
            let err = self.auth_failed().await;
            guard.release(Err(err.clone()));
            return Err(err);
        };

        let url = self.settings.url(&self.settings.login_path);
        match token::login(&self.http, &url, credentials, self.settings.request_timeout).await {
            Ok(outcome) => {
                crate::metrics::record_login("success");
                self.install_token(&outcome.token).await?;
                info!(username = %credentials.username, "re-authenticated with configured credentials");
                guard.release(Ok(outcome.token.clone()));
                Ok(outcome.token)
            }
            Err(e) => {
                crate::metrics::record_login("error");
                warn!(error = %e, "fallback login failed");
                let err = self.auth_failed().await;
                guard.release(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Terminal failure: clear the session and send the user to sign in.
    async fn auth_failed(&self) -> AuthError {
        if let Err(e) = self.clear_session().await {
            warn!(error = %e, "failed to clear stored token");
        }
        self.redirect.to_login();
        AuthError::AuthRequired
    }

    async fn install_token(&self, token: &str) -> std::result::Result<(), AuthError> {
        self.store.set(token).await?;
        let value = bearer(token).map_err(|e| AuthError::Store(e.to_string()))?;
        self.set_default_header(AUTHORIZATION, value);
        Ok(())
    }

    async fn clear_session(&self) -> std::result::Result<(), AuthError> {
        self.write_defaults(|headers| {
            headers.remove(AUTHORIZATION);
        });
        self.store.clear().await
    }

    /// Client defaults overlaid with the caller's own headers.
    fn merged_headers(&self, own: &HeaderMap) -> HeaderMap {
        let mut headers = self.default_headers();
        for name in own.keys() {
            headers.remove(name);
        }
        for (name, value) in own {
            headers.append(name.clone(), value.clone());
        }
        headers
    }

    fn read_defaults(&self) -> RwLockReadGuard<'_, HeaderMap> {
        self.default_headers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_defaults(&self, update: impl FnOnce(&mut HeaderMap)) {
        let mut headers = self
            .default_headers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut headers);
    }
}
