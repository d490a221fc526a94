//! Authenticated HTTP client for the pet registry backend
//!
//! Every request carries the stored bearer token. A 401 triggers recovery:
//! refresh the token (or log in again with configured credentials) and replay
//! the request, without the caller noticing. Concurrent 401s share a single
//! refresh call through [`RefreshCoordinator`].
//!
//! Request lifecycle:
//! 1. No stored token → one shared login, then send
//! 2. Send with `Authorization: Bearer <token>`
//! 3. 401 while a refresh is in flight → wait for its outcome, replay
//! 4. 401 otherwise → lead a refresh (fallback: login), replay
//! 5. 401 after a replay → clear token, login, replay; else redirect to login
//! 6. Any other status or transport error → returned to the caller unchanged

pub mod client;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod redirect;
pub mod request;

pub use client::{AuthClient, ClientSettings};
pub use coordinator::{RefreshCoordinator, RefreshGuard, Slot, Waiter};
pub use error::{Error, Result};
pub use redirect::{LoginRedirect, Navigator, PromptNavigator, RedirectHook};
pub use request::{ApiRequest, FilePart, RequestBody};
