//! Account contract seam
//!
//! The on-chain account contract is an external collaborator: the engine
//! only needs its read accessors and the sign/execute primitives. Concrete
//! implementations live with the chain bindings and must normalize whatever
//! loosely-typed results the chain returns into [`EngineError`] variants at
//! this boundary.

use async_trait::async_trait;
use covault_types::{AccAddress, CallRequest, Operation, OperationHash, Result};
use serde::{Deserialize, Serialize};

/// Terminal result of a dispatched execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecuteReceipt {
    /// Hash of the chain transaction that carried the execution
    pub tx_hash: String,
}

/// Read and call primitives of the N-of-M account contract
#[async_trait]
pub trait AccountContract: Send + Sync {
    /// Assemble the contract's canonical operation for a call batch
    async fn create_operation(&self, calls: Vec<CallRequest>) -> Result<Operation>;

    /// Produce this session's signature over the operation
    async fn sign(&self, operation: &Operation) -> Result<Vec<u8>>;

    /// Submit the operation for execution. Runs to completion or failure;
    /// there is no mid-flight cancellation.
    async fn execute(&self, operation: &Operation) -> Result<ExecuteReceipt>;

    /// The contract's own digest for an operation
    async fn operation_hash(&self, operation: &Operation) -> Result<OperationHash>;

    /// Current co-signer set
    async fn owners(&self) -> Result<Vec<AccAddress>>;

    /// Required confirmation count
    async fn threshold(&self) -> Result<usize>;

    /// Current operation sequence number
    async fn nonce(&self) -> Result<u64>;
}
