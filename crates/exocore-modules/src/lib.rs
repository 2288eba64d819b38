//! Per-module event projectors for the Exocore state indexer.
//!
//! Each chain module has one projector that turns its genesis section,
//! transaction events, messages and begin/end-block events into store
//! writes. The [`Registrar`] owns all seven and drives them in a fixed
//! order.
//!
//! # Modules
//!
//! - [`assets`] -- Client chains, tokens, staker and operator balances
//! - [`delegation`] -- Delegations, undelegations and slashing fan-out
//! - [`dogfood`] -- Validator set, voting power, epoch schedules, evidence
//! - [`operator`] -- Operators, consensus keys, opt-ins, USD valuations
//! - [`avs`] -- AVS registry and chain mappings
//! - [`epochs`] -- Epoch definitions and states
//! - [`exomint`] -- Mint params and history
//! - [`registrar`] -- [`Registrar`], the phase-ordered driver
//! - [`error`] -- Error types

pub mod assets;
pub mod avs;
pub mod delegation;
pub mod dogfood;
pub mod epochs;
pub mod error;
pub mod exomint;
pub mod operator;
pub mod registrar;

pub use assets::AssetsModule;
pub use avs::AvsModule;
pub use delegation::DelegationModule;
pub use dogfood::{DogfoodModule, record_double_sign_evidence};
pub use epochs::EpochsModule;
pub use error::{ModuleError, Phase, RegistrarError};
pub use exomint::ExomintModule;
pub use operator::OperatorModule;
pub use registrar::Registrar;

use exocore_types::GenesisDoc;
use serde::de::DeserializeOwned;

/// Decode a module's genesis section.
///
/// An absent section is not an error: the module is skipped with a warning.
pub(crate) fn genesis_section<T: DeserializeOwned>(
    doc: &GenesisDoc,
    module: &'static str,
) -> Result<Option<T>, ModuleError> {
    let section = doc
        .module_state(module)
        .map_err(|source| ModuleError::Decode { module, source })?;
    if section.is_none() {
        tracing::warn!(module, "No genesis section, skipping");
    }
    Ok(section)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    use chrono::{TimeZone, Utc};
    use exocore_source::{ChainSnapshot, ChainSource, LocalSource, SnapshotDelegation, Sources};
    use exocore_types::{Block, Event, GenesisDoc, Int, SourceValidator, Tx};

    pub fn block(height: i64) -> Block {
        Block {
            height,
            time: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            evidence: Vec::new(),
        }
    }

    pub fn tx(height: i64, events: Vec<Event>) -> Tx {
        Tx {
            hash: format!("0xtx{height}"),
            height,
            events,
            messages: Vec::new(),
        }
    }

    pub fn genesis(app_state: serde_json::Value) -> GenesisDoc {
        serde_json::from_value(serde_json::json!({
            "chain_id": "exocoretestnet_233-1",
            "initial_height": "1",
            "genesis_time": "2024-06-01T00:00:00Z",
            "app_state": app_state,
        }))
        .unwrap()
    }

    pub fn sources(snapshots: Vec<ChainSnapshot>) -> Sources {
        Sources::new(&ChainSource::Local(LocalSource::new(snapshots)))
    }

    pub fn snapshot(height: i64) -> ChainSnapshot {
        ChainSnapshot {
            height,
            assets_params: None,
            dogfood_params: None,
            exomint_params: None,
            validators: Vec::new(),
            epochs: Vec::new(),
            delegations: Vec::new(),
        }
    }

    pub fn delegation(staker: &str, asset: &str, operator: &str, amount: u64) -> SnapshotDelegation {
        SnapshotDelegation {
            staker_id: staker.to_owned(),
            asset_id: asset.to_owned(),
            operator_addr: operator.to_owned(),
            amount: Int::from(amount),
        }
    }

    pub fn validator(n: u8, power: i64) -> SourceValidator {
        SourceValidator {
            public_key: format!("0x{n:064x}"),
            power,
        }
    }
}
