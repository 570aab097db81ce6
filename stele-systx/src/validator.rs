//! Structural validation of claimed system transactions.
//!
//! This layer checks only the transaction envelope and calldata shape. State
//! preconditions (batch status, root equality) are enforced by the consensus
//! manager, which has the parent snapshot in hand.

use alloy_primitives::{Address, U256};
use tracing::debug;

use stele_core::Transaction;

use crate::codec::SystxKind;
use crate::errors::{Result, SystxError};

/// Validates transactions that claim to be OTS system transactions.
#[derive(Debug, Clone)]
pub struct Validator {
    contract_address: Address,
}

impl Validator {
    /// Create a validator for the given registry contract.
    pub fn new(contract_address: Address) -> Self {
        Self { contract_address }
    }

    /// Whether a transaction carries a recognized system-call selector.
    pub fn is_ots_system_tx(&self, tx: &Transaction) -> bool {
        SystxKind::from_calldata(&tx.data).is_some()
    }

    /// Validate the system-transaction envelope and calldata shape.
    ///
    /// Checks, in order: zero gas price, recipient is the registry contract,
    /// a known 4-byte selector, and the selector-specific minimum calldata
    /// length. Returns the identified call kind.
    pub fn validate(&self, tx: &Transaction) -> Result<SystxKind> {
        if tx.gas_price != U256::ZERO {
            return Err(SystxError::NotSystemTx);
        }

        match tx.to {
            Some(to) if to == self.contract_address => {}
            _ => return Err(SystxError::InvalidRecipient),
        }

        let sel = tx
            .selector()
            .ok_or_else(|| SystxError::InvalidCalldata("missing selector".into()))?;
        let kind = SystxKind::from_selector(sel).ok_or(SystxError::InvalidOtsTx)?;

        if tx.data.len() < kind.min_calldata_len() {
            return Err(SystxError::InvalidCalldata(format!(
                "{} bytes, need at least {}",
                tx.data.len(),
                kind.min_calldata_len()
            )));
        }

        debug!(kind = ?kind, to = %self.contract_address, "system transaction validated");
        Ok(kind)
    }

    /// Validate within a block context: the sender must be the coinbase.
    pub fn validate_for_block(
        &self,
        tx: &Transaction,
        sender: Address,
        coinbase: Address,
    ) -> Result<SystxKind> {
        if sender != coinbase {
            return Err(SystxError::InvalidSender);
        }
        self.validate(tx)
    }
}
