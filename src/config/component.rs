//! Component blocks: a provider id plus per-provider configuration.
//!
//! The same shape is used for backend, frontend, migration, cloud and
//! network. The `providers` table keys provider-specific settings by
//! id so a project can describe alternatives side by side and switch
//! with one line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Registered provider id this component is bound to.
    pub provider: String,
    /// Provider-specific configuration, keyed by provider id.
    #[serde(default)]
    pub providers: BTreeMap<String, serde_yaml::Value>,
}

impl ComponentConfig {
    /// The selected provider's configuration as JSON, `Null` when the
    /// block carries none. Providers receive JSON so plan metadata
    /// and provider inputs share one value type.
    pub fn provider_config(&self) -> serde_json::Value {
        self.providers
            .get(&self.provider)
            .and_then(|v| serde_json::to_value(v).ok())
            .unwrap_or(serde_json::Value::Null)
    }
}
