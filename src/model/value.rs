//! Scalar values carried as edge properties.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Property value stored on an edge, such as the `sdhPosition` of a
/// container inside a carrier link.
///
/// Serialized untagged, so a property map reads as plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    /// Integer view. Numeric text counts: positions written by older
    /// provisioning tools were stored as strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        })*
    };
}

int_value!(i32, u32, i64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_read_as_int() {
        assert_eq!(Value::from(7u32).as_int(), Some(7));
        assert_eq!(Value::from(" 12 ").as_int(), Some(12));
        assert_eq!(Value::from("VC4").as_int(), None);
        assert_eq!(Value::from(true).as_int(), None);
    }

    #[test]
    fn test_untagged_json() {
        let json = serde_json::to_string(&Value::from(3)).unwrap();
        assert_eq!(json, "3");
        let back: Value = serde_json::from_str("\"east\"").unwrap();
        assert_eq!(back.as_text(), Some("east"));
        assert_eq!(back.to_string(), "east");
    }
}
