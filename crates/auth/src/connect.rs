//! Wire-level `connect` frame authentication (§4.8): three modes, an
//! optional tailnet bypass, and per-IP cooldown on failure.

use std::net::IpAddr;

use secrecy::{ExposeSecret, Secret};
use wingman_config::{AuthConfig, AuthMode};

use crate::{
    credentials::{TokenSet, safe_equal},
    error::{Error, Result},
    throttle::HandshakeThrottle,
};

/// Loopback detection used by callers deciding whether to require auth at
/// all for direct local connections (the HTTP surface's equivalent lives in
/// `is_local_connection`, which additionally accounts for reverse proxies —
/// this is the narrower TCP-source check the wire layer needs).
#[must_use]
pub fn is_loopback(ip: IpAddr) -> bool {
    ip.is_loopback()
}

/// Authenticates incoming `connect` frames against a gateway's [`AuthConfig`].
#[derive(Clone)]
pub struct ConnectAuthenticator {
    mode: AuthMode,
    allow_tailscale: bool,
    password: Option<Secret<String>>,
    tokens: TokenSet,
    throttle: HandshakeThrottle,
}

impl std::fmt::Debug for ConnectAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectAuthenticator")
            .field("mode", &self.mode)
            .field("allow_tailscale", &self.allow_tailscale)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ConnectAuthenticator {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let tokens = TokenSet::new(config.token.as_deref());
        Self {
            mode: config.mode,
            allow_tailscale: config.allow_tailscale,
            password: config.password.map(Secret::new),
            tokens,
            throttle: HandshakeThrottle::new(),
        }
    }

    /// Register an additional accepted token (e.g. from an admin rotation
    /// endpoint) without restarting the gateway.
    pub fn add_token(&self, token: String) {
        self.tokens.insert(token);
    }

    /// Authorize a `connect` frame. `tailscale_identity` is the
    /// already-extracted value of the tailnet-identifying header, if the
    /// transport saw one; extraction is the transport's job, this crate only
    /// decides what it means.
    pub fn authorize_connect(
        &self,
        remote_ip: IpAddr,
        provided_token: Option<&str>,
        provided_password: Option<&str>,
        tailscale_identity: Option<&str>,
    ) -> Result<()> {
        if self.allow_tailscale && tailscale_identity.is_some() {
            self.throttle.record_success(remote_ip);
            return Ok(());
        }

        if self.throttle.is_blocked(remote_ip) {
            tracing::warn!(%remote_ip, "connect attempt rejected: cooling down after repeated failures");
            return Err(Error::RateLimited {
                retry_after_secs: 60,
            });
        }

        let outcome = match self.mode {
            AuthMode::None => Ok(()),
            AuthMode::Token => self.check_token(provided_token),
            AuthMode::Password => self.check_password(provided_password),
        };

        match &outcome {
            Ok(()) => self.throttle.record_success(remote_ip),
            Err(reason) => {
                tracing::warn!(%remote_ip, %reason, "connect frame rejected");
                self.throttle.record_failure(remote_ip);
            },
        }
        outcome
    }

    fn check_token(&self, provided: Option<&str>) -> Result<()> {
        match provided {
            Some(token) if self.tokens.contains(token) => Ok(()),
            Some(_) => Err(Error::unauthorized("invalid token")),
            None => Err(Error::unauthorized("token required")),
        }
    }

    fn check_password(&self, provided: Option<&str>) -> Result<()> {
        let Some(expected) = self.password.as_ref() else {
            return Err(Error::unauthorized("no password configured"));
        };
        match provided {
            Some(password) if safe_equal(password, expected.expose_secret()) => Ok(()),
            Some(_) => Err(Error::unauthorized("invalid password")),
            None => Err(Error::unauthorized("password required")),
        }
    }
}
