use std::time::Duration;

use serde_json::Value;
use tokio::process::Child;

/// How long a child gets between SIGTERM and SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

#[cfg(target_family = "unix")]
pub async fn kill_graceful(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    if let Some(pid) = child.id() {
        // SAFETY: plain signal delivery to a pid we spawned and still own.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            return Ok(());
        }
    }
    child.kill().await
}

#[cfg(target_family = "windows")]
pub async fn kill_graceful(child: &mut Child, _grace: Duration) -> std::io::Result<()> {
    child.kill().await
}

/// Render a JSON scalar the way it would be typed on a command line.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `overrides.args` map as `--key value` pairs, keys sorted.
///
/// `true` becomes a bare flag, `false`/`null` drop the key.
pub fn override_args(overrides: &Value) -> Vec<String> {
    let Some(map) = overrides.get("args").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    let mut out = Vec::new();
    for key in keys {
        match &map[key.as_str()] {
            Value::Bool(true) => out.push(format!("--{key}")),
            Value::Bool(false) | Value::Null => {}
            value => {
                out.push(format!("--{key}"));
                out.push(scalar_to_string(value));
            }
        }
    }
    out
}

/// String pairs from a JSON object, keys sorted; non-objects yield nothing.
pub fn string_pairs(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(map) = value.and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut pairs: Vec<(String, String)> = map
        .iter()
        .map(|(k, v)| (k.clone(), scalar_to_string(v)))
        .collect();
    pairs.sort();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn override_args_render_flags_and_values() {
        let overrides = json!({"args": {"lr": 0.1, "epochs": 3, "verbose": true, "debug": false, "name": "x"}});
        assert_eq!(
            override_args(&overrides),
            vec!["--epochs", "3", "--lr", "0.1", "--name", "x", "--verbose"]
        );
    }

    #[test]
    fn missing_args_render_nothing() {
        assert!(override_args(&Value::Null).is_empty());
        assert!(override_args(&json!({"args": ["--a"]})).is_empty());
    }

    #[test]
    fn string_pairs_are_sorted() {
        let env = json!({"B": 2, "A": "one"});
        assert_eq!(
            string_pairs(Some(&env)),
            vec![("A".to_string(), "one".to_string()), ("B".to_string(), "2".to_string())]
        );
        assert!(string_pairs(None).is_empty());
    }
}
