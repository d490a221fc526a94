//! Backend authentication constants
//!
//! Paths are relative to the configured API base URL. The CLI allows each
//! path to be overridden; these are the defaults the backend ships with.

use std::time::Duration;

/// Key under which the bearer token is persisted.
pub const STORAGE_KEY: &str = "pet_registry_token";

/// Credential login endpoint (`POST`, JSON `{username, password}`)
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Token refresh endpoint (`PUT`, bearer auth, no body)
pub const DEFAULT_REFRESH_PATH: &str = "/refresh";

/// Liveness endpoint probed without credentials
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Location of the interactive sign-in screen.
pub const LOGIN_SCREEN_PATH: &str = "/login";

/// Response fields that may carry a token, in priority order.
pub const TOKEN_FIELDS: &[&str] = &["access_token", "token", "accessToken"];

/// Message carried by the authentication-required error.
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please log in again.";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
