//! Authentication primitives for the pet registry backend
//!
//! Provides the token store, the login and refresh endpoint calls, token
//! extraction from loosely shaped responses, and best-effort expiry decoding.
//! The request-replaying client lives in `registry-client`; this crate has no
//! knowledge of retries or queueing and can be used on its own.
//!
//! Session flow:
//! 1. `token::login()` exchanges configured credentials for a bearer token
//! 2. Token persisted via `store::TokenStore::set()`
//! 3. Every request reads it back with `TokenStore::get()`
//! 4. On 401, `token::refresh()` trades the current token for a new one
//! 5. Irrecoverable failures call `TokenStore::clear()`

pub mod constants;
pub mod error;
pub mod expiry;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use expiry::{ExpiryInfo, decode_expiry, is_expired};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{Credentials, LoginOutcome, extract_token, login, refresh};
