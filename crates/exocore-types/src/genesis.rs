//! Genesis document.
//!
//! The app state is kept as raw JSON per module so each projector decodes
//! only its own section, and a malformed section fails only that module's
//! load.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::serde_num;

/// A chain genesis document.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDoc {
    /// Chain id.
    pub chain_id: String,
    /// First block height.
    #[serde(deserialize_with = "serde_num::i64_str", default = "default_initial_height")]
    pub initial_height: i64,
    /// Genesis time.
    pub genesis_time: DateTime<Utc>,
    /// Per-module app state.
    #[serde(default)]
    pub app_state: BTreeMap<String, serde_json::Value>,
}

const fn default_initial_height() -> i64 {
    1
}

impl GenesisDoc {
    /// Decode the named module's section.
    ///
    /// Returns `Ok(None)` when the section is absent.
    pub fn module_state<T: DeserializeOwned>(
        &self,
        module: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        self.app_state
            .get(module)
            .map(|raw| T::deserialize(raw))
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exomint::ExomintGenesis;

    #[test]
    fn module_sections() {
        let json = r#"{
            "chain_id": "exocoretestnet_233-1",
            "initial_height": "1",
            "genesis_time": "2024-01-01T00:00:00Z",
            "app_state": {"exomint": {"params": {"mint_denom": "hua"}}, "epochs": 5}
        }"#;
        let doc: GenesisDoc = serde_json::from_str(json).unwrap();
        assert_eq!(doc.initial_height, 1);

        let exomint: ExomintGenesis = doc.module_state("exomint").unwrap().unwrap();
        assert_eq!(exomint.params["mint_denom"], "hua");

        assert!(doc.module_state::<ExomintGenesis>("missing").unwrap().is_none());
        assert!(doc.module_state::<ExomintGenesis>("epochs").is_err());
    }
}
