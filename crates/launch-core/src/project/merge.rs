use serde_json::{Map, Value, map::Entry};

/// Merge a queue default block under `resource_args[resource]`.
///
/// Values already present in the job win; nested objects merge recursively.
pub fn merge_defaults(resource_args: &mut Map<String, Value>, resource: &str, defaults: &Map<String, Value>) {
    let slot = resource_args
        .entry(resource.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(target) = slot {
        merge_into(target, defaults);
    }
}

fn merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match target.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                if let (Value::Object(t), Value::Object(s)) = (existing.get_mut(), value) {
                    merge_into(t, s);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_values_take_precedence_recursively() {
        let mut args = json!({
            "kubernetes": {"spec": {"backoffLimit": 0}, "namespace": "job-ns"}
        })
        .as_object()
        .cloned()
        .unwrap();
        let defaults = json!({
            "spec": {"backoffLimit": 3, "ttlSecondsAfterFinished": 60},
            "namespace": "default-ns"
        })
        .as_object()
        .cloned()
        .unwrap();

        merge_defaults(&mut args, "kubernetes", &defaults);

        let block = &args["kubernetes"];
        assert_eq!(block["namespace"], "job-ns");
        assert_eq!(block["spec"]["backoffLimit"], 0);
        assert_eq!(block["spec"]["ttlSecondsAfterFinished"], 60);
    }

    #[test]
    fn creates_missing_block() {
        let mut args = Map::new();
        let defaults = json!({"instance": "ml.m5.xlarge"}).as_object().cloned().unwrap();
        merge_defaults(&mut args, "sagemaker", &defaults);
        assert_eq!(args["sagemaker"]["instance"], "ml.m5.xlarge");
    }
}
