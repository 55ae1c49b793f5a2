//! Server-block key normalization.
//!
//! A key such as `Example.ORG:53` names a zone and, optionally, a port. Keys are
//! canonicalized to a lower-case, fully-qualified zone so that two spellings of the
//! same zone compare equal.

use crate::error::{Result, TopologyError};
use std::fmt;
use std::str::FromStr;

/// Longest label allowed by RFC 1035.
const MAX_LABEL_LEN: usize = 63;

/// Longest name allowed by RFC 1035, in wire form.
const MAX_NAME_LEN: usize = 255;

/// Canonical form of a server-block key.
///
/// ```
/// use dns_topology::zone::normalize;
///
/// let za = normalize("Example.ORG:53").unwrap();
/// assert_eq!(za.zone, "example.org.");
/// assert_eq!(za.port, "53");
/// assert_eq!(za.to_string(), "example.org.:53");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneAddress {
    /// Lower-case, fully-qualified zone name with a trailing dot.
    pub zone: String,

    /// Port as written, or empty when the key had none.
    pub port: String,
}

impl fmt::Display for ZoneAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.zone, self.port)
    }
}

impl FromStr for ZoneAddress {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        normalize(s)
    }
}

/// Parses a raw key into a [`ZoneAddress`].
///
/// The port is everything after the last `:`; a key without a colon has an empty port,
/// which is filled in with the default port at grouping time.
///
/// # Errors
///
/// Returns [`TopologyError::InvalidZone`] if the zone part is not a legal domain name.
pub fn normalize(key: &str) -> Result<ZoneAddress> {
    let (host, port) = key.rsplit_once(':').unwrap_or((key, ""));

    let zone = canonical_zone(host).map_err(|reason| TopologyError::InvalidZone {
        key: key.to_string(),
        reason,
    })?;

    Ok(ZoneAddress {
        zone,
        port: port.to_string(),
    })
}

fn canonical_zone(host: &str) -> std::result::Result<String, String> {
    if host.is_empty() {
        return Err("empty zone name".into());
    }
    if host == "." {
        return Ok(host.to_string());
    }

    let host = host.strip_suffix('.').unwrap_or(host);
    let name = if host.is_ascii() {
        host.to_ascii_lowercase()
    } else {
        idna::domain_to_ascii(host).map_err(|e| format!("invalid internationalized name: {e}"))?
    };

    for label in name.split('.') {
        if label.is_empty() {
            return Err("empty label".into());
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(format!(
                "label {label:?} exceeds maximum length of {MAX_LABEL_LEN}"
            ));
        }
        if let Some(c) = label.chars().find(|&c| !label_char_ok(c)) {
            return Err(format!("label {label:?} contains invalid character {c:?}"));
        }
    }

    // Length octets plus the root label.
    if name.len() + 2 > MAX_NAME_LEN {
        return Err(format!("name exceeds maximum length of {MAX_NAME_LEN}"));
    }

    Ok(format!("{name}."))
}

const fn label_char_ok(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_zone_and_port() {
        let za = normalize("example.org:53").unwrap();
        assert_eq!(za.zone, "example.org.");
        assert_eq!(za.port, "53");
    }

    #[test]
    fn missing_port_is_empty() {
        let za = normalize("x.example.").unwrap();
        assert_eq!(za.zone, "x.example.");
        assert_eq!(za.port, "");
        assert_eq!(za.to_string(), "x.example.:");
    }

    #[test]
    fn lowercases_and_qualifies() {
        assert_eq!(normalize("EXAMPLE.Org:53").unwrap().zone, "example.org.");
        assert_eq!(normalize("example.org.:53").unwrap().zone, "example.org.");
    }

    #[test]
    fn root_zone() {
        let za = normalize(".:2053").unwrap();
        assert_eq!(za.zone, ".");
        assert_eq!(za.port, "2053");
    }

    #[test]
    fn sentinel_port_is_kept_verbatim() {
        assert_eq!(normalize("x.example.:sa").unwrap().port, "sa");
    }

    #[test]
    fn internationalized_names_become_punycode() {
        assert_eq!(
            normalize("bücher.example:53").unwrap().zone,
            "xn--bcher-kva.example."
        );
    }

    #[test]
    fn canonical_form_is_a_fixed_point() {
        for key in [
            "example.org:53",
            "EXAMPLE.org.",
            ".:53",
            ".",
            "_srv.Example.ORG:sa",
            "bücher.example:1053",
        ] {
            let once = normalize(key).unwrap();
            let twice = normalize(&once.to_string()).unwrap();
            assert_eq!(once, twice, "{key}");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        for key in ["", ":53", "exa mple.org:53", "a..b:53", "a:b:53", "foo/bar"] {
            let err = normalize(key).unwrap_err();
            assert!(
                matches!(err, TopologyError::InvalidZone { .. }),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn rejects_long_labels_and_names() {
        let label = "a".repeat(64);
        assert!(normalize(&format!("{label}.example:53")).is_err());

        let name = vec!["a".repeat(63); 4].join(".");
        assert!(normalize(&name).is_err());

        let name = vec!["a".repeat(63); 3].join(".");
        assert!(normalize(&name).is_ok());
    }
}
