use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalized absolute path of a node or property (`/`, `/a`, `/a/jcr:primaryType`).
///
/// Paths never carry a trailing slash (except the root), empty segments,
/// `.`/`..` segments or same-name-sibling indexes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemPath(String);

impl ItemPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parses and validates an absolute path.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let path = value.into();
        if !path.starts_with('/') {
            return Err(invalid(path, "path must be absolute"));
        }
        if path == "/" {
            return Ok(Self(path));
        }
        if path.ends_with('/') {
            return Err(invalid(path, "trailing slash"));
        }
        for segment in path[1..].split('/') {
            if let Err(reason) = check_name(segment) {
                return Err(invalid(path, reason));
            }
        }
        Ok(Self(path))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `/`.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<ItemPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Last segment, or the empty string for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    /// Appends a single validated segment.
    pub fn join(&self, name: &str) -> Result<ItemPath, ValidationError> {
        check_name(name).map_err(|reason| invalid(name.to_string(), reason))?;
        if self.is_root() {
            Ok(Self(format!("/{}", name)))
        } else {
            Ok(Self(format!("{}/{}", self.0, name)))
        }
    }

    /// Segments below the root, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments (0 for the root).
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// True if `self` lies strictly below `ancestor`, at a segment boundary.
    pub fn is_descendant_of(&self, ancestor: &ItemPath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    /// True if `self` equals `other` or lies below it.
    pub fn is_same_or_descendant_of(&self, other: &ItemPath) -> bool {
        self == other || self.is_descendant_of(other)
    }
}

fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty segment");
    }
    if name == "." || name == ".." {
        return Err("relative segment");
    }
    if name
        .chars()
        .any(|c| matches!(c, '/' | '[' | ']' | '|' | '*') || c.is_control())
    {
        return Err("illegal character in segment");
    }
    if name.starts_with(':') || name.ends_with(':') {
        return Err("malformed namespace prefix");
    }
    Ok(())
}

fn invalid(path: String, reason: &'static str) -> ValidationError {
    ValidationError::InvalidPath { path, reason }
}

/// Validates a single node or property name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    check_name(name).map_err(|reason| invalid(name.to_string(), reason))
}

impl TryFrom<String> for ItemPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ItemPath> for String {
    fn from(value: ItemPath) -> Self {
        value.0
    }
}

impl AsRef<str> for ItemPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
