/// Host name of the machine, best effort.
pub fn host_name() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

/// Display name used until the service returns the registered one.
pub fn default_agent_name() -> String {
    match host_name() {
        Some(host) => format!("launch-agent-{host}"),
        None => "launch-agent".to_string(),
    }
}
