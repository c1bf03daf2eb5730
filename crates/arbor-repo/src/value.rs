//! Node and property value model.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{RepoError, RepoResult};

/// Stable identity of a node. Survives moves; used by reference properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(NodeId)
            .map_err(|e| RepoError::ValueFormat(format!("invalid identifier `{s}`: {e}")))
    }
}

/// A snapshot of one node as seen through a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    /// Absolute path, `/` for the root.
    pub path: String,
    /// Last path segment; `/` for the root.
    pub name: String,
    pub depth: usize,
    pub primary_type: String,
    pub mixins: Vec<String>,
}

impl NodeInfo {
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Binary,
    Long,
    Double,
    Date,
    Boolean,
    Name,
    Path,
    Reference,
    Undefined,
}

impl PropertyType {
    pub const ALL: [PropertyType; 10] = [
        PropertyType::String,
        PropertyType::Binary,
        PropertyType::Long,
        PropertyType::Double,
        PropertyType::Date,
        PropertyType::Boolean,
        PropertyType::Name,
        PropertyType::Path,
        PropertyType::Reference,
        PropertyType::Undefined,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Binary => "Binary",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Date => "Date",
            PropertyType::Boolean => "Boolean",
            PropertyType::Name => "Name",
            PropertyType::Path => "Path",
            PropertyType::Reference => "Reference",
            PropertyType::Undefined => "Undefined",
        }
    }

    /// Validate `raw` for this type and return its canonical text form.
    ///
    /// References are only checked for syntax here; whether the target exists
    /// is up to the session.
    pub fn canonicalize(&self, raw: &str) -> RepoResult<String> {
        let bad = |e: &dyn fmt::Display| {
            RepoError::ValueFormat(format!("`{raw}` is not a valid {}: {e}", self.name()))
        };
        match self {
            PropertyType::String
            | PropertyType::Binary
            | PropertyType::Name
            | PropertyType::Path
            | PropertyType::Undefined => Ok(raw.to_string()),
            PropertyType::Long => raw
                .trim()
                .parse::<i64>()
                .map(|v| v.to_string())
                .map_err(|e| bad(&e)),
            PropertyType::Double => raw
                .trim()
                .parse::<f64>()
                .map(|v| v.to_string())
                .map_err(|e| bad(&e)),
            PropertyType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok("true".to_string()),
                "false" => Ok("false".to_string()),
                _ => Err(bad(&"expected true or false")),
            },
            PropertyType::Date => DateTime::<FixedOffset>::parse_from_rfc3339(raw.trim())
                .map(|d| d.to_rfc3339())
                .map_err(|e| bad(&e)),
            PropertyType::Reference => raw
                .parse::<NodeId>()
                .map(|id| id.to_string())
                .map_err(|e| bad(&e)),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for PropertyType {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RepoError::ValueFormat(format!("unknown property type `{s}`")))
    }
}

/// A named, typed property. Single-valued properties hold exactly one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub kind: PropertyType,
    #[serde(default)]
    pub multiple: bool,
    pub values: Vec<String>,
}

impl Property {
    pub fn single(name: impl Into<String>, kind: PropertyType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            multiple: false,
            values: vec![value.into()],
        }
    }

    pub fn multi(name: impl Into<String>, kind: PropertyType, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            multiple: true,
            values,
        }
    }

    /// The single value, or the first value of a multi-valued property.
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_type_parses_case_insensitively() {
        assert_eq!("string".parse::<PropertyType>().unwrap(), PropertyType::String);
        assert_eq!("REFERENCE".parse::<PropertyType>().unwrap(), PropertyType::Reference);
        assert!("Strang".parse::<PropertyType>().is_err());
    }

    #[test]
    fn canonicalize_rejects_malformed_values() {
        assert_eq!(PropertyType::Long.canonicalize(" 42 ").unwrap(), "42");
        assert!(PropertyType::Long.canonicalize("forty-two").is_err());
        assert_eq!(PropertyType::Boolean.canonicalize("TRUE").unwrap(), "true");
        assert!(PropertyType::Date.canonicalize("yesterday").is_err());
        assert!(PropertyType::Date
            .canonicalize("2024-05-01T10:00:00+02:00")
            .is_ok());
        assert!(PropertyType::Reference.canonicalize("not-a-uuid").is_err());
    }
}
