//! Backend address parsing.
//!
//! A single endpoint is `host[:port]`; the replicating backend takes a
//! `;`-separated list of them.

use std::fmt;

use crate::error::{Error, Result};

/// Port used when an address omits one.
pub const DEFAULT_PORT: u16 = 6379;

/// Separator between endpoints in a replicated address list.
pub const LIST_SEPARATOR: char = ';';

/// One reachable instance of the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse `host[:port]`.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Configuration(
                "backend address must not be empty".to_string(),
            ));
        }

        let (host, port) = match address.split_once(':') {
            None => (address, DEFAULT_PORT),
            Some((host, port)) => (host, parse_port(address, port)?),
        };

        if host.is_empty() {
            return Err(Error::Configuration(format!(
                "backend address '{address}' has no host"
            )));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(Error::Configuration(format!(
                "backend address '{address}' contains whitespace in the host"
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16> {
    if port.is_empty() {
        return Err(Error::Configuration(format!(
            "backend address '{address}' has a trailing ':' without a port"
        )));
    }
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Configuration(format!(
            "backend address '{address}' has a non-numeric port '{port}'"
        )));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Configuration(format!(
            "backend address '{address}' has an out of range port '{port}'"
        ))),
        Ok(port) => Ok(port),
    }
}

/// Split a `;`-separated address list into its raw entries.
///
/// Fails on an empty list or an empty entry. Entries are trimmed but not
/// parsed; each adapter parses its own address during `init`.
pub fn split_address_list(addresses: &str) -> Result<Vec<String>> {
    if addresses.trim().is_empty() {
        return Err(Error::Configuration(
            "backend address list must not be empty".to_string(),
        ));
    }

    addresses
        .split(LIST_SEPARATOR)
        .map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                Err(Error::Configuration(format!(
                    "backend address list '{addresses}' contains an empty entry"
                )))
            } else {
                Ok(entry.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_only_uses_default_port() {
        let endpoint = Endpoint::parse("cache.internal").unwrap();
        assert_eq!(endpoint.host, "cache.internal");
        assert_eq!(endpoint.port, DEFAULT_PORT);
    }

    #[test]
    fn test_host_and_port() {
        let endpoint = Endpoint::parse(" 10.0.0.5:7000 ").unwrap();
        assert_eq!(endpoint.host, "10.0.0.5");
        assert_eq!(endpoint.port, 7000);
        assert_eq!(endpoint.to_string(), "10.0.0.5:7000");
    }

    #[test]
    fn test_malformed_addresses_are_configuration_errors() {
        for bad in ["", "   ", "host:", ":6379", "host:abc", "host:-1", "host:70000", "host:0", "a b:1"] {
            let err = Endpoint::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::Configuration(_)),
                "expected configuration error for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_second_colon_is_rejected() {
        assert!(Endpoint::parse("host:1:2").is_err());
    }

    #[test]
    fn test_split_address_list() {
        let entries = split_address_list("dc1:6379; dc2 ;dc3:7000").unwrap();
        assert_eq!(entries, vec!["dc1:6379", "dc2", "dc3:7000"]);
    }

    #[test]
    fn test_split_address_list_rejects_empty() {
        assert!(split_address_list("").is_err());
        assert!(split_address_list("dc1;;dc2").is_err());
        assert!(split_address_list("dc1;").is_err());
    }
}
