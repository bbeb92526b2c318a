//! Configuration management for the courier
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub transfer: TransferConfig,
    pub polling: PollingConfig,
    pub attestation: AttestationConfig,
    pub metrics: MetricsConfig,
    pub domains: HashMap<String, DomainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Amount moved per leg, in the token's smallest unit
    pub amount: u64,
    /// Allowance granted to the token messenger, as a multiple of `amount`.
    /// The spender only pulls `amount`; the excess avoids a second approve
    /// when a leg is manually resumed.
    #[serde(default = "default_approval_multiplier")]
    pub approval_multiplier: u64,
    pub source_domain: u32,
    pub destination_domain: u32,
}

fn default_approval_multiplier() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub receipt_interval_ms: u64,
    pub receipt_timeout_secs: u64,
    pub attestation_interval_ms: u64,
    pub attestation_timeout_secs: u64,
    /// Ceiling for the backoff applied after transient poll failures
    pub max_backoff_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            receipt_interval_ms: 4_000,
            receipt_timeout_secs: 600,
            attestation_interval_ms: 2_000,
            attestation_timeout_secs: 1_800,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttestationConfig {
    /// Base URL of the attestation service (IRIS-compatible API)
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    pub domain_id: u32,
    pub name: String,
    pub rpc_url: String,
    pub private_key: String,
    pub token_address: String,
    pub token_messenger_address: String,
    pub message_address: String,
    pub message_transmitter_address: String,
    pub enabled: bool,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("COURIER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_domains().len() < 2 {
            anyhow::bail!("At least two domains must be enabled for a round trip");
        }

        for (name, domain) in &self.domains {
            if !domain.enabled {
                continue;
            }
            if domain.rpc_url.is_empty() {
                anyhow::bail!("Domain {} has no RPC URL configured", name);
            }
            if domain.private_key.is_empty() {
                anyhow::bail!("Domain {} has no signing key configured", name);
            }
            for (label, addr) in [
                ("token", &domain.token_address),
                ("token messenger", &domain.token_messenger_address),
                ("message", &domain.message_address),
                ("message transmitter", &domain.message_transmitter_address),
            ] {
                if addr.is_empty() {
                    anyhow::bail!("Domain {} has no {} contract address", name, label);
                }
            }
        }

        for domain_id in [
            self.transfer.source_domain,
            self.transfer.destination_domain,
        ] {
            if self.get_domain_by_id(domain_id).is_none() {
                anyhow::bail!("Transfer references unknown domain id {}", domain_id);
            }
        }

        if self.transfer.source_domain == self.transfer.destination_domain {
            anyhow::bail!("Source and destination domains must differ");
        }

        if self.transfer.approval_multiplier == 0 {
            anyhow::bail!("Approval multiplier must be at least 1");
        }

        if self.attestation.base_url.is_empty() {
            anyhow::bail!("Attestation service base URL is required");
        }

        Ok(())
    }

    /// Get list of enabled domains
    pub fn enabled_domains(&self) -> Vec<(&String, &DomainConfig)> {
        self.domains.iter().filter(|(_, d)| d.enabled).collect()
    }

    /// Get domain config by domain ID
    pub fn get_domain_by_id(&self, domain_id: u32) -> Option<&DomainConfig> {
        self.domains
            .values()
            .find(|d| d.enabled && d.domain_id == domain_id)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(id: u32, enabled: bool) -> DomainConfig {
        DomainConfig {
            domain_id: id,
            name: format!("domain-{}", id),
            rpc_url: "http://localhost:8545".into(),
            private_key: "00".repeat(32),
            token_address: "0x07865c6e87b9f70255377e024ace6630c1eaa37f".into(),
            token_messenger_address: "0x0273f0bd27c2c6c11213e55463d07c1722e8cdc3".into(),
            message_address: "0xf8068f3ca905b6d0f5e54dc7c7ebbc6814fc7137".into(),
            message_transmitter_address: "0x24df4fdee80bef6fe53a6e67e7fc37b1bf3f093c".into(),
            enabled,
        }
    }

    fn settings() -> Settings {
        let mut domains = HashMap::new();
        domains.insert("a".to_string(), domain(0, true));
        domains.insert("b".to_string(), domain(1, true));

        Settings {
            transfer: TransferConfig {
                amount: 1,
                approval_multiplier: 10,
                source_domain: 0,
                destination_domain: 1,
            },
            polling: PollingConfig::default(),
            attestation: AttestationConfig {
                base_url: "https://iris-api-smokebox.circle.com".into(),
            },
            metrics: MetricsConfig {
                enabled: false,
                port: 9090,
            },
            domains,
        }
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_valid_settings_pass_validation() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn test_single_domain_rejected() {
        let mut s = settings();
        s.domains.get_mut("b").unwrap().enabled = false;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_unknown_transfer_domain_rejected() {
        let mut s = settings();
        s.transfer.destination_domain = 7;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_zero_approval_multiplier_rejected() {
        let mut s = settings();
        s.transfer.approval_multiplier = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_same_source_and_destination_rejected() {
        let mut s = settings();
        s.transfer.destination_domain = s.transfer.source_domain;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_domain_lookup_skips_disabled() {
        let mut s = settings();
        s.domains.insert("c".to_string(), domain(2, false));
        assert!(s.get_domain_by_id(2).is_none());
        assert_eq!(s.get_domain_by_id(1).unwrap().domain_id, 1);
    }
}
