//! Connection details derived from apply outputs

use crate::attempt::Outputs;
use std::path::PathBuf;

/// How to turn outputs into a connection command
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Output holding the instance's public address
    pub address_output: String,
    pub ssh_user: String,
    pub ssh_key: Option<PathBuf>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            address_output: "public_ip".to_string(),
            ssh_user: "opc".to_string(),
            ssh_key: None,
        }
    }
}

/// Public address and ready-to-use ssh command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub address: String,
    pub command: String,
}

impl ConnectionInfo {
    /// Build connection info when the address output is present
    pub fn from_outputs(outputs: &Outputs, settings: &ConnectionSettings) -> Option<Self> {
        let address = match outputs.get(&settings.address_output)? {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items.iter().find_map(|v| v.as_str())?.to_string(),
            _ => return None,
        };
        if address.is_empty() {
            return None;
        }

        let command = match &settings.ssh_key {
            Some(key) => format!("ssh -i {} {}@{}", key.display(), settings.ssh_user, address),
            None => format!("ssh {}@{}", settings.ssh_user, address),
        };

        Some(Self { address, command })
    }
}

/// Render an output value for display (strings without quotes)
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
