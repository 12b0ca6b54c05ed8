//! Protocol configuration.

use crate::capability::Capability;
use crate::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the protocol codecs.
///
/// The capability registry lives here rather than in process-wide state;
/// callers pass it to the decoders that need it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Reject capability names outside the registry when decoding
    /// upload requests.
    pub strict_capabilities: bool,
    /// Capability names recognised on top of the well-known set.
    pub extra_capabilities: Vec<String>,
    /// Forward side-band progress to the configured sink.
    pub progress: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            strict_capabilities: false,
            extra_capabilities: Vec::new(),
            progress: true,
        }
    }
}

impl ProtocolConfig {
    /// Loads a configuration from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for unusable values.
    pub fn validate(&self) -> Result<()> {
        for name in &self.extra_capabilities {
            if name.is_empty() || name.contains(char::is_whitespace) || name.contains('=') {
                return Err(ProtocolError::Config(format!(
                    "invalid capability name {name:?}"
                )));
            }
        }
        Ok(())
    }

    /// Returns true if the capability is in the registry.
    pub fn recognizes(&self, capability: &Capability) -> bool {
        match capability {
            Capability::Other(name) => self.extra_capabilities.iter().any(|n| n == name),
            _ => true,
        }
    }
}
