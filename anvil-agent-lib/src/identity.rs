use serde::Serialize;

/// Usable-space figure advertised at registration, in bytes.
const DEFAULT_USABLE_SPACE: u64 = 5_000_000_000;

/// Agent metadata submitted to the server's registration endpoint.
///
/// Serialized as form data; the renames pin the exact field names of the
/// server's admin-agent contract.
#[derive(Debug, Clone, Serialize)]
pub struct AgentIdentity {
    pub hostname: String,
    #[serde(rename = "location")]
    pub working_dir: String,
    #[serde(rename = "operatingSystem")]
    pub operating_system: String,
    pub uuid: String,
    #[serde(rename = "usablespace")]
    pub usable_space: String,
    #[serde(rename = "agentAutoRegisterKey")]
    pub auto_register_key: String,
    #[serde(rename = "agentAutoRegisterResources")]
    pub auto_register_resources: String,
    #[serde(rename = "agentAutoRegisterEnvironments")]
    pub auto_register_environments: String,
    #[serde(rename = "agentAutoRegisterHostname")]
    pub auto_register_hostname: String,
    #[serde(rename = "elasticAgentId")]
    pub elastic_agent_id: String,
    #[serde(rename = "elasticPluginId")]
    pub elastic_plugin_id: String,
}

impl AgentIdentity {
    /// Build an identity from the local environment: hostname, current
    /// working directory, OS name, and a freshly generated UUID. The
    /// auto-register and elastic fields start empty and can be filled in
    /// from configuration.
    pub fn detect() -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().to_string();
        let working_dir = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Self {
            hostname,
            working_dir,
            operating_system: std::env::consts::OS.to_string(),
            uuid: uuid::Uuid::new_v4().to_string(),
            usable_space: DEFAULT_USABLE_SPACE.to_string(),
            auto_register_key: String::new(),
            auto_register_resources: String::new(),
            auto_register_environments: String::new(),
            auto_register_hostname: String::new(),
            elastic_agent_id: String::new(),
            elastic_plugin_id: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_fills_environment_fields() {
        let identity = AgentIdentity::detect();
        assert!(!identity.hostname.is_empty());
        assert!(!identity.working_dir.is_empty());
        assert_eq!(identity.operating_system, std::env::consts::OS);
        assert_eq!(identity.uuid.len(), 36);
        assert_eq!(identity.usable_space, "5000000000");
    }

    #[test]
    fn test_fresh_uuid_per_detection() {
        assert_ne!(AgentIdentity::detect().uuid, AgentIdentity::detect().uuid);
    }

    #[test]
    fn test_wire_field_names() {
        let identity = AgentIdentity::detect();
        let value = serde_json::to_value(&identity).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();

        for expected in [
            "hostname",
            "uuid",
            "location",
            "operatingSystem",
            "usablespace",
            "agentAutoRegisterKey",
            "agentAutoRegisterResources",
            "agentAutoRegisterEnvironments",
            "agentAutoRegisterHostname",
            "elasticAgentId",
            "elasticPluginId",
        ] {
            assert!(keys.contains(&expected), "missing form field {expected}");
        }
        assert_eq!(keys.len(), 11);
    }
}
