use serde::{Deserialize, Serialize};

/// Which of the three routing strategies a downstream handshake is
/// dispatched to. See `session::route` for the dispatch itself.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// Always forward to `primary_host:primary_port`, ignoring the
    /// client-requested host.
    PassThroughDedicated,
    /// Decode the upstream host/port from the client-requested host via
    /// `resolve::decode`, using `server_domain` as the suffix.
    PassThroughByDomain,
    /// Mediate the encryption handshake against `sidecar_host:sidecar_port`
    /// before splicing the session body to `primary_host:primary_port`.
    Hidden,
}

impl Default for ProxyMode {
    fn default() -> Self {
        ProxyMode::PassThroughDedicated
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct MineginxConfig {
    pub listen_addr: String,
    pub listen_port: u16,
    pub primary_host: String,
    pub primary_port: u16,
    #[serde(default)]
    pub sidecar_host: String,
    #[serde(default)]
    pub sidecar_port: u16,
    #[serde(default)]
    pub server_domain: String,
    #[serde(default)]
    pub mode: ProxyMode,
    #[serde(default = "default_sync_motd")]
    pub sync_motd: bool,
    #[serde(default = "default_motd")]
    pub motd_default: String,
    pub handshake_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

fn default_sync_motd() -> bool {
    true
}

fn default_motd() -> String {
    "A Minecraft Server".to_string()
}

#[derive(Debug, PartialEq)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MineginxConfig {
    /// Validates the cross-field invariant: `pass_through_by_domain`
    /// requires a non-empty `server_domain`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == ProxyMode::PassThroughByDomain && self.server_domain.is_empty() {
            return Err(ConfigError(
                "server_domain is required for pass_through_by_domain mode".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> MineginxConfig {
        MineginxConfig {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 25565,
            primary_host: "127.0.0.1".to_string(),
            primary_port: 25566,
            sidecar_host: String::new(),
            sidecar_port: 0,
            server_domain: String::new(),
            mode: ProxyMode::PassThroughDedicated,
            sync_motd: true,
            motd_default: "A Minecraft Server".to_string(),
            handshake_timeout_ms: None,
            idle_timeout_ms: None,
        }
    }

    #[test]
    fn dedicated_mode_needs_no_domain() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn by_domain_mode_requires_server_domain() {
        let mut config = base();
        config.mode = ProxyMode::PassThroughByDomain;
        assert!(config.validate().is_err());

        config.server_domain = "server.domain".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mode_field_is_snake_case_in_yaml() {
        let config = base();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("mode: pass_through_dedicated"));
    }

    #[test]
    fn default_mode_is_dedicated() {
        assert_eq!(ProxyMode::default(), ProxyMode::PassThroughDedicated);
    }
}
