//! Operation, confirmation and tracked-state types
//!
//! An [`Operation`] is the canonical unsigned description of a contract call
//! awaiting approvals. Its [`OperationHash`] is a content digest over every
//! field plus the target account and chain id, so two builds with identical
//! inputs and nonce hash identically. [`TrackedOperation`] is the unit of
//! state the engine mutates as confirmations arrive.

use crate::address::AccAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// How the call is dispatched by the account contract
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// Plain call from the account
    #[default]
    Direct,
    /// Delegated call executed in the account's context
    Delegated,
}

/// User intent before validation: recipient as entered, optional amount and
/// payload. The builder turns this into a canonical [`Operation`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OperationIntent {
    /// Recipient account, bech32 string as entered
    pub to: String,
    /// Amount in the smallest native unit; `None` means zero
    pub value: Option<u128>,
    /// Call payload; `None` means empty
    pub payload: Option<Vec<u8>>,
    /// Dispatch kind
    pub call_type: CallType,
    /// Free-form tag describing where the intent came from (e.g. "send",
    /// "contract-upgrade"), carried through for display
    pub origin_tag: Option<String>,
}

/// One call in a batch handed to the host relay
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallRequest {
    pub to: AccAddress,
    pub value: u128,
    pub payload: Vec<u8>,
}

/// Content-derived operation identifier (uppercase hex SHA-256)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHash(String);

impl OperationHash {
    /// Wrap an already-computed digest string
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical unsigned operation, immutable once built
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// The shared account this operation runs against
    pub account: AccAddress,
    /// Chain the account lives on
    pub chain_id: String,
    pub to: AccAddress,
    pub value: u128,
    pub payload: Vec<u8>,
    pub call_type: CallType,
    /// Assigned from the account contract's current sequence
    pub nonce: u64,
}

impl Operation {
    /// Compute the content digest identifying this operation.
    ///
    /// Every field is folded in with a length prefix so adjacent variable
    /// length fields cannot collide. Rendered as uppercase hex, matching the
    /// transaction-hash convention used elsewhere in the stack.
    pub fn hash(&self) -> OperationHash {
        let mut hasher = Sha256::new();
        let mut absorb = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        };
        absorb(self.account.as_bytes());
        absorb(self.chain_id.as_bytes());
        absorb(self.to.as_bytes());
        absorb(&self.value.to_be_bytes());
        absorb(&self.payload);
        absorb(match self.call_type {
            CallType::Direct => b"direct",
            CallType::Delegated => b"delegated",
        });
        absorb(&self.nonce.to_be_bytes());
        OperationHash(hex::encode(hasher.finalize()).to_uppercase())
    }

    /// The single-call batch equivalent, for the host relay path
    pub fn as_call_request(&self) -> CallRequest {
        CallRequest {
            to: self.to,
            value: self.value,
            payload: self.payload.clone(),
        }
    }
}

/// One signer's approval of a specific operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub operation_hash: OperationHash,
    pub signer: AccAddress,
    /// Opaque signature bytes; empty for confirmations restored from
    /// persisted metadata (signatures are never persisted)
    pub signature: Vec<u8>,
    pub observed_at: DateTime<Utc>,
}

/// Which data source tracks confirmations for an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Substrate {
    /// External coordination service is authoritative
    Remote,
    /// Only approvals witnessed by this client instance
    Local,
}

/// Lifecycle status of a tracked operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Awaiting more confirmations
    Pending,
    /// Quorum reached, not yet executed
    Ready,
    /// Submitted and executed on chain; terminal
    Executed,
}

/// The engine's unit of state for one operation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackedOperation {
    pub operation_hash: OperationHash,
    pub to: AccAddress,
    pub value: u128,
    pub payload: Vec<u8>,
    pub call_type: CallType,
    pub nonce: u64,
    pub origin_tag: Option<String>,
    pub substrate: Substrate,
    pub status: OperationStatus,
    /// Named-signer approvals, one per signer (re-confirming overwrites)
    pub confirmations: Vec<Confirmation>,
    /// Approvals witnessed without a recorded signer identity (the 1-of-1
    /// fast path marks an operation signed without naming who)
    pub signed_count: usize,
    pub threshold: usize,
    pub execution_tx_hash: Option<String>,
    /// Set when this entry was restored from persisted metadata and the
    /// signable operation object has not been rebuilt yet
    pub needs_rebuild: bool,
}

impl TrackedOperation {
    /// Create a fresh pending entry for a just-proposed operation
    pub fn new(operation: &Operation, substrate: Substrate, threshold: usize) -> Self {
        Self {
            operation_hash: operation.hash(),
            to: operation.to,
            value: operation.value,
            payload: operation.payload.clone(),
            call_type: operation.call_type,
            nonce: operation.nonce,
            origin_tag: None,
            substrate,
            status: OperationStatus::Pending,
            confirmations: Vec::new(),
            signed_count: 0,
            threshold,
            execution_tx_hash: None,
            needs_rebuild: false,
        }
    }

    /// Effective confirmation count used for quorum.
    ///
    /// A named signer set is strictly more trustworthy than a raw count, but
    /// a count recorded without identity must not be dropped below the number
    /// of named signers either, so the higher of the two wins.
    pub fn effective_confirmations(&self) -> usize {
        self.signed_count.max(self.confirmations.len())
    }

    /// Insert or overwrite one signer's confirmation
    pub fn record_confirmation(&mut self, confirmation: Confirmation) {
        if let Some(existing) = self
            .confirmations
            .iter_mut()
            .find(|c| c.signer == confirmation.signer)
        {
            *existing = confirmation;
        } else {
            self.confirmations.push(confirmation);
        }
        self.recompute_status();
    }

    /// Record one approval without a signer identity
    pub fn record_anonymous_signature(&mut self) {
        self.signed_count += 1;
        self.recompute_status();
    }

    /// Re-derive status from the confirmation counts. Executed is terminal
    /// and never regresses.
    pub fn recompute_status(&mut self) {
        if self.status == OperationStatus::Executed {
            return;
        }
        self.status = if self.effective_confirmations() >= self.threshold {
            OperationStatus::Ready
        } else {
            OperationStatus::Pending
        };
    }

    /// Transition to executed with the chain transaction hash
    pub fn mark_executed(&mut self, tx_hash: impl Into<String>) {
        self.status = OperationStatus::Executed;
        self.execution_tx_hash = Some(tx_hash.into());
    }
}

/// Plain-metadata form written to durable storage.
///
/// Carries only what is re-derivable or display-relevant: never the signable
/// operation object and never signature bytes. Amount is kept as a decimal
/// string so the JSON form is safe for consumers without 128-bit integers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedOperation {
    pub operation_hash: OperationHash,
    pub account: String,
    pub chain_id: String,
    pub to: String,
    pub value: String,
    pub payload_hex: String,
    pub call_type: CallType,
    pub nonce: u64,
    pub origin_tag: Option<String>,
    pub substrate: Substrate,
    pub status: OperationStatus,
    /// Addresses of known confirmers; signatures are substrate-owned
    pub confirmed_signers: Vec<String>,
    pub signed_count: usize,
    pub threshold: usize,
    pub execution_tx_hash: Option<String>,
}

impl PersistedOperation {
    /// Snapshot a tracked operation for storage
    pub fn from_tracked(tracked: &TrackedOperation, account: &AccAddress, chain_id: &str) -> Self {
        Self {
            operation_hash: tracked.operation_hash.clone(),
            account: account.to_string(),
            chain_id: chain_id.to_string(),
            to: tracked.to.to_string(),
            value: tracked.value.to_string(),
            payload_hex: hex::encode(&tracked.payload),
            call_type: tracked.call_type,
            nonce: tracked.nonce,
            origin_tag: tracked.origin_tag.clone(),
            substrate: tracked.substrate,
            status: tracked.status,
            confirmed_signers: tracked
                .confirmations
                .iter()
                .map(|c| c.signer.to_string())
                .collect(),
            signed_count: tracked.signed_count,
            threshold: tracked.threshold,
            execution_tx_hash: tracked.execution_tx_hash.clone(),
        }
    }

    /// Rebuild the tracked entry from stored metadata.
    ///
    /// Restored confirmations carry empty signature bytes and the entry is
    /// flagged `needs_rebuild` until the signable operation is reconstructed.
    pub fn to_tracked(&self) -> Result<TrackedOperation, String> {
        let to: AccAddress = self.to.parse()?;
        let value: u128 = self.value.parse().map_err(|_| "invalid value".to_string())?;
        let payload = hex::decode(&self.payload_hex).map_err(|e| e.to_string())?;
        let confirmations = self
            .confirmed_signers
            .iter()
            .map(|s| {
                Ok(Confirmation {
                    operation_hash: self.operation_hash.clone(),
                    signer: s.parse()?,
                    signature: Vec::new(),
                    observed_at: Utc::now(),
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(TrackedOperation {
            operation_hash: self.operation_hash.clone(),
            to,
            value,
            payload,
            call_type: self.call_type,
            nonce: self.nonce,
            origin_tag: self.origin_tag.clone(),
            substrate: self.substrate,
            status: self.status,
            confirmations,
            signed_count: self.signed_count,
            threshold: self.threshold,
            execution_tx_hash: self.execution_tx_hash.clone(),
            needs_rebuild: self.status != OperationStatus::Executed,
        })
    }

    /// Reconstruct the canonical signable operation from metadata
    pub fn to_operation(&self) -> Result<Operation, String> {
        Ok(Operation {
            account: self.account.parse()?,
            chain_id: self.chain_id.clone(),
            to: self.to.parse()?,
            value: self.value.parse().map_err(|_| "invalid value".to_string())?,
            payload: hex::decode(&self.payload_hex).map_err(|e| e.to_string())?,
            call_type: self.call_type,
            nonce: self.nonce,
        })
    }
}
