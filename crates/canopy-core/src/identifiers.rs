use crate::errors::CoreError;
use crate::validation::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

macro_rules! newtype {
    ($name:ident, $doc:expr, $pattern:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses a validated name from a string.
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                static PATTERN: OnceLock<Regex> = OnceLock::new();
                let pattern =
                    PATTERN.get_or_init(|| Regex::new($pattern).expect("invalid regex"));
                let s = value.into();
                if !pattern.is_match(&s) {
                    return Err(ValidationError::PatternMismatch {
                        field: stringify!($name),
                        value: s,
                    });
                }
                Ok(Self(s))
            }

            /// Returns the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

newtype!(
    NodeTypeName,
    "Qualified node type or mixin name such as `nt:unstructured` or `mix:referenceable`.",
    r"^([A-Za-z_][A-Za-z0-9_.-]*:)?[A-Za-z_][A-Za-z0-9_.-]*$"
);
newtype!(
    WorkspaceName,
    "Name of a workspace (pattern: `[A-Za-z0-9_-]{1,64}`); also used as the journal file stem.",
    r"^[A-Za-z0-9_-]{1,64}$"
);

/// Durable identifier of a referenceable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for NodeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ValidationError::PatternMismatch {
                field: "NodeId",
                value: s.to_string(),
            })
    }
}

/// Event timestamp in milliseconds since the Unix epoch.
///
/// Journals order events by timestamp first and insertion order second, so
/// the store only ever needs `Ord` on this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Earliest representable timestamp; `skip_to(Timestamp::MIN)` rewinds a cursor fully.
    pub const MIN: Timestamp = Timestamp(i64::MIN);

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Creates a timestamp from milliseconds since the epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp shifted by `millis`.
    pub fn offset(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Parses either integer milliseconds or an RFC 3339 date.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let trimmed = value.trim();
        if let Ok(millis) = trimmed.parse::<i64>() {
            return Ok(Self(millis));
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Self(dt.timestamp_millis()))
            .map_err(|_| CoreError::InvalidTimestamp(value.to_string()))
    }

    /// Formats as a UTC RFC 3339 string with millisecond precision.
    pub fn to_rfc3339(self) -> String {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_names() {
        assert!(NodeTypeName::parse("nt:unstructured").is_ok());
        assert!(NodeTypeName::parse("mix:referenceable").is_ok());
        assert!(NodeTypeName::parse("rep:root").is_ok());
        assert!(NodeTypeName::parse("bad name").is_err());
        assert!(NodeTypeName::parse(":missing").is_err());
    }

    #[test]
    fn workspace_names() {
        assert!(WorkspaceName::parse("default").is_ok());
        assert!(WorkspaceName::parse("../etc").is_err());
        assert!(WorkspaceName::parse("").is_err());
    }

    #[test]
    fn timestamp_parses_millis_and_rfc3339() {
        assert_eq!(Timestamp::parse("1500").unwrap(), Timestamp::from_millis(1500));
        let ts = Timestamp::parse("1970-01-01T00:00:01.250Z").unwrap();
        assert_eq!(ts.as_millis(), 1250);
        assert_eq!(ts.to_rfc3339(), "1970-01-01T00:00:01.250Z");
        assert!(Timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn node_id_round_trips_through_display() {
        let id = NodeId::generate();
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<NodeId>().is_err());
    }

    #[test]
    fn node_type_name_rejects_invalid_json() {
        let result: Result<NodeTypeName, _> = serde_json::from_str("\"no spaces\"");
        assert!(result.is_err());
    }
}
