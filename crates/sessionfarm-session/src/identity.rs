//! Composite session identifiers.
//!
//! The externally visible id is `<key>[.<route>]`. The key is the primary key
//! in the backing store; the route names the node that last served the
//! session and is only a hint.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Separator between key and route.
pub const SEPARATOR: char = '.';

/// Split a composite id into `(key, route)`.
///
/// The route is everything after the last separator. An empty route
/// (`"abc."`) counts as absent.
///
/// # Errors
///
/// Returns `MalformedIdentifier` if `id` or its key part is empty.
pub fn split(id: &str) -> Result<(&str, Option<&str>)> {
    let (key, route) = match id.rsplit_once(SEPARATOR) {
        Some((key, route)) => (key, Some(route).filter(|r| !r.is_empty())),
        None => (id, None),
    };
    if key.is_empty() {
        return Err(Error::MalformedIdentifier(id.to_string()));
    }
    Ok((key, route))
}

/// Build a composite id. With no route the key is returned unchanged.
pub fn join(key: &str, route: Option<&str>) -> String {
    match route {
        Some(route) => format!("{key}{SEPARATOR}{route}"),
        None => key.to_string(),
    }
}

/// Route-agnostic key of `id`.
pub fn key_of(id: &str) -> Result<&str> {
    split(id).map(|(key, _)| key)
}

/// Fresh random session key. Never contains the separator.
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Parsed composite id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    key: String,
    route: Option<String>,
}

impl SessionId {
    pub fn new(key: impl Into<String>, route: Option<&str>) -> Self {
        Self {
            key: key.into(),
            route: route.filter(|r| !r.is_empty()).map(str::to_string),
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        let (key, route) = split(id)?;
        Ok(Self::new(key, route))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Same key, different route.
    pub fn with_route(&self, route: Option<&str>) -> Self {
        Self::new(self.key.clone(), route)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.route {
            Some(route) => write!(f, "{}{SEPARATOR}{route}", self.key),
            None => f.write_str(&self.key),
        }
    }
}
