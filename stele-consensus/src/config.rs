//! Consensus module configuration.

use std::path::PathBuf;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use stele_core::REGISTRY_ADDRESS;

use crate::errors::{ConsensusError, Result};

/// Default gas limit for system transactions. The three calls have fixed
/// parameter counts, so their cost is predictable and well below this.
pub const DEFAULT_SYSTEM_TX_GAS_LIMIT: u64 = 200_000;

/// Configuration for the OTS consensus manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtsConfig {
    /// Whether OTS anchoring is enabled for this chain.
    pub enabled: bool,
    /// Address of the copyright registry contract.
    pub contract_address: Address,
    /// Gas limit applied to generated system transactions.
    pub system_tx_gas_limit: u64,
    /// Directory for the module's durable data.
    pub data_dir: PathBuf,
}

impl OtsConfig {
    /// Create an enabled configuration with defaults for everything else.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Set the registry contract address.
    pub fn with_contract(mut self, address: Address) -> Self {
        self.contract_address = address;
        self
    }

    /// Set the system-transaction gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.system_tx_gas_limit = gas_limit;
        self
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.system_tx_gas_limit == 0 {
            return Err(ConsensusError::InvalidConfig(
                "system transaction gas limit must be non-zero".into(),
            ));
        }
        if self.contract_address == Address::ZERO {
            return Err(ConsensusError::InvalidConfig(
                "registry contract address must be set".into(),
            ));
        }
        Ok(())
    }
}

impl Default for OtsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            contract_address: REGISTRY_ADDRESS,
            system_tx_gas_limit: DEFAULT_SYSTEM_TX_GAS_LIMIT,
            data_dir: PathBuf::from("stele"),
        }
    }
}
