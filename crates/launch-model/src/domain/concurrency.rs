use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ModelError;

/// Upper bound on simultaneously active runs for one queue.
///
/// On the wire this is either an integer or the string `"auto"`;
/// `-1` means no bound at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum MaxConcurrency {
    Limit(u32),
    /// Backend-determined (e.g. CPU count for local runs).
    Auto,
    Unbounded,
}

impl MaxConcurrency {
    /// Resolve to a concrete slot count; `auto` becomes `auto_value`.
    pub fn resolve(&self, auto_value: usize) -> usize {
        match self {
            MaxConcurrency::Limit(n) => *n as usize,
            MaxConcurrency::Auto => auto_value,
            MaxConcurrency::Unbounded => usize::MAX,
        }
    }
}

impl Default for MaxConcurrency {
    fn default() -> Self {
        MaxConcurrency::Limit(1)
    }
}

impl fmt::Display for MaxConcurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxConcurrency::Limit(n) => write!(f, "{n}"),
            MaxConcurrency::Auto => f.write_str("auto"),
            MaxConcurrency::Unbounded => f.write_str("-1"),
        }
    }
}

impl FromStr for MaxConcurrency {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim();
        if norm.eq_ignore_ascii_case("auto") {
            return Ok(MaxConcurrency::Auto);
        }
        match norm.parse::<i64>() {
            Ok(-1) => Ok(MaxConcurrency::Unbounded),
            Ok(n) if (0..=u32::MAX as i64).contains(&n) => Ok(MaxConcurrency::Limit(n as u32)),
            _ => Err(ModelError::InvalidConcurrency(s.to_string())),
        }
    }
}

impl TryFrom<Value> for MaxConcurrency {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::String(s) => s.parse(),
            Value::Number(n) => n.to_string().parse(),
            Value::Null => Ok(MaxConcurrency::default()),
            other => Err(ModelError::InvalidConcurrency(other.to_string())),
        }
    }
}

impl From<MaxConcurrency> for Value {
    fn from(value: MaxConcurrency) -> Self {
        match value {
            MaxConcurrency::Limit(n) => Value::from(n),
            MaxConcurrency::Auto => Value::from("auto"),
            MaxConcurrency::Unbounded => Value::from(-1),
        }
    }
}
