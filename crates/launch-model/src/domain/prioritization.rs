use serde::{Deserialize, Serialize};

/// Rule used to pick the next job from the unowned pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PrioritizationMode {
    /// Ascending `(priority, created_at)`.
    V0,
    /// `created_at` only.
    #[default]
    Disabled,
}

impl From<String> for PrioritizationMode {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("V0") {
            PrioritizationMode::V0
        } else {
            PrioritizationMode::Disabled
        }
    }
}

impl From<PrioritizationMode> for String {
    fn from(value: PrioritizationMode) -> Self {
        match value {
            PrioritizationMode::V0 => "V0".to_string(),
            PrioritizationMode::Disabled => "DISABLED".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_v0_enables_priority_ordering() {
        let v0: PrioritizationMode = serde_json::from_str(r#""V0""#).unwrap();
        assert_eq!(v0, PrioritizationMode::V0);

        let other: PrioritizationMode = serde_json::from_str(r#""SOMETHING_NEW""#).unwrap();
        assert_eq!(other, PrioritizationMode::Disabled);
    }
}
