//! Client identities and how they are derived from a request.
//!
//! A [`ClientIdentity`] is the key every piece of throttling state is stored
//! under. It is normally the client's IP address, taken either from the TCP
//! peer or, behind a reverse proxy, from the `X-Forwarded-For` header.

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An opaque, stable key identifying the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(id: &str) -> Self {
        ClientIdentity(id.to_string())
    }

    /// Build an identity, rejecting empty or whitespace-only keys.
    pub fn parse(id: &str) -> Result<Self, ValidationError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidIdentity(
                "identity cannot be empty".to_string(),
            ));
        }
        Ok(ClientIdentity(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(ip: IpAddr) -> Self {
        ClientIdentity(ip.to_string())
    }
}

impl From<String> for ClientIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ClientIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the site is reached by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteConnection {
    #[default]
    Direct,
    ReverseProxy,
}

impl SiteConnection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteConnection::Direct => "direct",
            SiteConnection::ReverseProxy => "reverse_proxy",
        }
    }
}

impl FromStr for SiteConnection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(SiteConnection::Direct),
            "reverse_proxy" => Ok(SiteConnection::ReverseProxy),
            other => Err(ValidationError::invalid_option(
                "site_connection",
                format!("expected 'direct' or 'reverse_proxy', got '{other}'"),
            )),
        }
    }
}

impl std::fmt::Display for SiteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives a [`ClientIdentity`] from the request's peer address and headers.
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    connection: SiteConnection,
}

impl IdentityResolver {
    pub fn new(connection: SiteConnection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> SiteConnection {
        self.connection
    }

    /// Resolve the identity for one request.
    ///
    /// # Arguments
    ///
    /// * `peer` - Address of the TCP peer
    /// * `forwarded_for` - Raw value of the `X-Forwarded-For` header, if present
    ///
    /// Behind a reverse proxy the first parseable address of `forwarded_for`
    /// wins; a missing or garbage header falls back to the peer.
    pub fn resolve(&self, peer: IpAddr, forwarded_for: Option<&str>) -> ClientIdentity {
        match self.connection {
            SiteConnection::Direct => peer.into(),
            SiteConnection::ReverseProxy => forwarded_for
                .and_then(first_forwarded_address)
                .unwrap_or(peer)
                .into(),
        }
    }

    /// Guess which connection type the current request suggests.
    ///
    /// A request carrying a valid `X-Forwarded-For` looks proxied. Operators
    /// can compare this with the configured value to spot a misconfiguration.
    pub fn guess_connection_type(forwarded_for: Option<&str>) -> SiteConnection {
        if forwarded_for.and_then(first_forwarded_address).is_some() {
            SiteConnection::ReverseProxy
        } else {
            SiteConnection::Direct
        }
    }
}

fn first_forwarded_address(header: &str) -> Option<IpAddr> {
    header
        .split(',')
        .next()
        .map(str::trim)
        .and_then(|candidate| candidate.parse().ok())
}
