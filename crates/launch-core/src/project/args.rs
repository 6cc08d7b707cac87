use serde_json::{Map, Value};

use crate::error::CoreError;

/// Turn `["--lr", "0.1", "--epochs=3", "--dry-run"]` into a key/value map.
///
/// A key not followed by a value becomes `true`.
pub fn user_args_to_map(args: &[Value]) -> Result<Map<String, Value>, CoreError> {
    let mut out = Map::new();
    let mut pending: Option<String> = None;

    for arg in args {
        let arg = arg
            .as_str()
            .ok_or_else(|| CoreError::InvalidSpec(format!("override arg is not a string: {arg}")))?;

        if let Some(stripped) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) {
            if let Some(key) = pending.take() {
                out.insert(key, Value::Bool(true));
            }
            match stripped.split_once('=') {
                Some((key, value)) => {
                    out.insert(key.to_string(), Value::String(value.to_string()));
                }
                None => pending = Some(stripped.to_string()),
            }
        } else if let Some(key) = pending.take() {
            out.insert(key, Value::String(arg.to_string()));
        } else {
            return Err(CoreError::InvalidSpec(format!(
                "override arg {arg:?} is not preceded by a flag"
            )));
        }
    }
    if let Some(key) = pending {
        out.insert(key, Value::Bool(true));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| json!(s)).collect()
    }

    #[test]
    fn mixed_forms() {
        let map = user_args_to_map(&strings(&["--lr", "0.1", "--epochs=3", "--dry-run", "-v"])).unwrap();
        assert_eq!(map["lr"], "0.1");
        assert_eq!(map["epochs"], "3");
        assert_eq!(map["dry-run"], true);
        assert_eq!(map["v"], true);
    }

    #[test]
    fn stray_positional_is_rejected() {
        assert!(user_args_to_map(&strings(&["train.py"])).is_err());
    }
}
