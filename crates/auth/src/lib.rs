//! Authentication and credential management (§4.8).
//!
//! Two independent surfaces:
//! - [`connect::ConnectAuthenticator`]: the wire `connect` frame's
//!   `none`/`token`/`password` modes, a tailnet bypass, and per-IP cooldown.
//! - [`credential_store::CredentialStore`]: the HTTP surface's single
//!   Argon2-hashed operator password and the session tokens it mints.

pub mod connect;
pub mod credential_store;
pub mod credentials;
pub mod error;
pub mod throttle;

pub use {
    connect::{ConnectAuthenticator, is_loopback},
    credential_store::CredentialStore,
    credentials::{TokenSet, generate_token, hash_password, safe_equal, verify_password},
    error::{Error, Result},
    throttle::HandshakeThrottle,
};
