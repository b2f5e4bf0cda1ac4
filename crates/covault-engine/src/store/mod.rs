//! Confirmation store — dual substrate
//!
//! One interface, two sources of truth. The remote substrate delegates to
//! the coordination service and re-fetches on every read; the local
//! substrate only ever reports approvals this client instance witnessed,
//! which makes its counts a lower bound on real-world approvals.
//!
//! Execution gating lives here, in both implementations: `execute` re-reads
//! quorum status immediately before touching the contract primitive so a
//! stale "ready" flag can never let an under-confirmed operation through.

pub mod local;
pub mod remote;

use crate::contract::ExecuteReceipt;
use async_trait::async_trait;
use covault_types::{AccAddress, Operation, OperationHash, Result, Substrate, TrackedOperation};

/// Tracks collected approvals per operation hash and gates execution
#[async_trait]
pub trait ConfirmationStore: Send + Sync {
    /// Which substrate this store represents
    fn substrate(&self) -> Substrate;

    /// Submit an operation together with the proposer's own approval.
    /// A `None` sender records the approval as an anonymous signed mark.
    async fn propose(
        &self,
        operation: &Operation,
        sender_signature: Vec<u8>,
        sender: Option<AccAddress>,
        origin_tag: Option<String>,
    ) -> Result<OperationHash>;

    /// Add one approval. A `None` signer bumps the anonymous signed count
    /// (only meaningful on the local substrate).
    async fn confirm(
        &self,
        hash: &OperationHash,
        signature: Vec<u8>,
        signer: Option<AccAddress>,
    ) -> Result<()>;

    /// The current quorum-relevant view of an operation
    async fn status(&self, hash: &OperationHash) -> Result<TrackedOperation>;

    /// All non-executed operations for an account
    async fn list_pending(&self, account: &AccAddress) -> Result<Vec<TrackedOperation>>;

    /// Gate on fresh quorum status, then dispatch the contract execution.
    /// Under-threshold operations fail with `InsufficientConfirmations` and
    /// cause zero contract calls.
    async fn execute(&self, hash: &OperationHash) -> Result<ExecuteReceipt>;

    /// Whether the signable operation object for this hash is held in memory
    async fn contains(&self, hash: &OperationHash) -> bool;

    /// The in-memory signable operation for a hash, if held
    async fn operation(&self, hash: &OperationHash) -> Option<Operation>;

    /// Re-attach tracked metadata restored from persistence. The signable
    /// operation stays absent until [`ConfirmationStore::attach_operation`]
    /// rebuilds it.
    async fn restore_metadata(&self, tracked: TrackedOperation) -> Result<()>;

    /// Attach a deterministically rebuilt signable operation to previously
    /// restored metadata, clearing its needs-rebuild marker
    async fn attach_operation(&self, operation: Operation) -> Result<()>;
}
