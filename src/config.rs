//! Delivery configuration
//!
//! ```yaml
//! from: alerts@example.com
//! to: oncall@example.com, team@example.com
//! smarthost: mail.example.com:25
//! auth_password: hunter2
//! headers:
//!   X-Priority: "1"
//!   Reply-To: noc@example.com
//! timezone: Europe/Berlin
//! template_path: /etc/alerts/email.tmpl
//! ```
//!
//! Every field is optional and empty strings mean "unset". Printing a
//! configuration never shows the password.

use std::{
    error::Error as StdError,
    fmt::{self, Debug, Display, Formatter},
    fs,
    net::Ipv6Addr,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{self, Error};

/// Configuration of a delivery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Sender, may contain template syntax
    pub from: String,
    /// Comma separated recipients
    pub to: String,
    /// Comma separated copy recipients
    pub cc: String,
    /// Comma separated blind copy recipients
    pub bcc: String,
    /// `EHLO` argument, the local host name when empty
    pub hello: String,
    /// Relay used for delivery
    pub smarthost: SmartHost,
    /// Kept for configuration files that carry credentials
    pub auth_username: String,
    /// Kept for configuration files that carry credentials
    pub auth_password: Secret,
    /// Extra headers, in declaration order
    #[serde(with = "ordered_headers")]
    pub headers: Vec<(String, String)>,
    /// Body template used when the template file has no body
    pub text: String,
    /// IANA zone of the `Date` header, UTC when empty
    pub timezone: String,
    /// Files attached to every message
    pub attachments: Vec<PathBuf>,
    /// Template read by [`send`](crate::send)
    pub template_path: PathBuf,
}

impl EmailConfig {
    /// Reads a YAML configuration
    pub fn from_yaml(source: &str) -> Result<Self, Error> {
        serde_yaml::from_str(source).map_err(error::config)
    }

    /// Reads a JSON configuration
    pub fn from_json(source: &str) -> Result<Self, Error> {
        serde_json::from_str(source).map_err(error::config)
    }

    /// Loads a configuration file, JSON when the extension is `.json`, YAML otherwise
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(error::config)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&source)
        } else {
            Self::from_yaml(&source)
        }
    }

    /// Value of a custom header, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl Display for EmailConfig {
    /// Redacted YAML
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let yaml = serde_yaml::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&yaml)
    }
}

/// Custom headers keep the order of the source map
mod ordered_headers {
    use std::fmt;

    use serde::{
        de::{MapAccess, Visitor},
        Deserializer, Serializer,
    };

    pub(super) fn serialize<S: Serializer>(
        headers: &[(String, String)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(headers.iter().map(|(k, v)| (k, v)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, String)>, D::Error> {
        deserializer.deserialize_map(HeadersVisitor)
    }

    struct HeadersVisitor;

    impl<'de> Visitor<'de> for HeadersVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of header names to values")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut headers: Vec<(String, String)> = Vec::new();
            while let Some((name, value)) = map.next_entry::<String, String>()? {
                match headers
                    .iter_mut()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&name))
                {
                    Some(existing) => existing.1 = value,
                    None => headers.push((name, value)),
                }
            }
            Ok(headers)
        }
    }
}

/// Relay address, written `host:port`
///
/// ```
/// # use courier::SmartHost;
/// let host: SmartHost = "[::1]:2525".parse()?;
/// assert_eq!(host.host(), "::1");
/// assert_eq!(host.port(), 2525);
/// assert_eq!(host.to_string(), "[::1]:2525");
/// # Ok::<(), courier::config::InvalidSmartHost>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SmartHost {
    host: String,
    port: u16,
}

impl SmartHost {
    /// Relay at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether no relay is configured
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }
}

impl Display for SmartHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            Ok(())
        } else if self.host.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl std::str::FromStr for SmartHost {
    type Err = InvalidSmartHost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }
        let invalid = |reason| InvalidSmartHost {
            address: s.to_owned(),
            reason,
        };

        let (host, port) = match s.strip_prefix('[') {
            Some(bracketed) => bracketed
                .split_once("]:")
                .or_else(|| bracketed.strip_suffix(']').map(|host| (host, "")))
                .ok_or_else(|| invalid("missing ']' in address"))?,
            None => match s.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => {
                    return Err(invalid("too many colons in address"))
                }
                Some(split) => split,
                None => (s, ""),
            },
        };

        if host.is_empty() {
            return Err(invalid("missing host in address"));
        }
        if port.is_empty() {
            return Err(invalid("missing port in address"));
        }
        let port = port.parse().map_err(|_| invalid("invalid port"))?;

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for SmartHost {
    type Error = InvalidSmartHost;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SmartHost> for String {
    fn from(host: SmartHost) -> String {
        host.to_string()
    }
}

/// Error returned when parsing a [`SmartHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSmartHost {
    address: String,
    reason: &'static str,
}

impl Display for InvalidSmartHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "address {}: {}", self.address, self.reason)
    }
}

impl StdError for InvalidSmartHost {}

const REDACTED: &str = "<secret>";

/// A credential that never shows up when printed or serialized
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a credential
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The wrapped value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the credential is unset
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(")?;
        f.write_str(if self.is_empty() { "" } else { REDACTED })?;
        f.write_str(")")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if self.is_empty() { "" } else { REDACTED })
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value == REDACTED {
            Ok(Self::default())
        } else {
            Ok(Self(value))
        }
    }
}
