//! Operation builder
//!
//! Turns a user intent into a canonical [`Operation`] bound to the shared
//! account and chain. Validation happens here; the nonce always comes from
//! the account contract's sequence, never from the intent.

use covault_types::{AccAddress, EngineError, Operation, OperationIntent, Result};

/// Builds canonical operations for one account on one chain
#[derive(Clone, Debug)]
pub struct OperationBuilder {
    /// The shared account operations run against
    pub account: AccAddress,
    /// Chain the account lives on
    pub chain_id: String,
}

impl OperationBuilder {
    /// Create a builder for the given account and chain
    pub fn new(account: AccAddress, chain_id: impl Into<String>) -> Self {
        Self {
            account,
            chain_id: chain_id.into(),
        }
    }

    /// Build a canonical operation from an intent and the account's current
    /// nonce. Pure construction: no I/O, no side effects, and deterministic
    /// for identical inputs.
    pub fn build(&self, intent: &OperationIntent, current_nonce: u64) -> Result<Operation> {
        let to: AccAddress = intent
            .to
            .parse()
            .map_err(|_| EngineError::InvalidRecipient(intent.to.clone()))?;

        Ok(Operation {
            account: self.account,
            chain_id: self.chain_id.clone(),
            to,
            value: intent.value.unwrap_or(0),
            payload: intent.payload.clone().unwrap_or_default(),
            call_type: intent.call_type,
            nonce: current_nonce,
        })
    }
}
