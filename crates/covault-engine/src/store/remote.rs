//! Remote-substrate confirmation store
//!
//! Delegates to the coordination service, which sees every co-signer's
//! confirmations. The service is authoritative: `status` re-fetches on every
//! call and nothing about confirmation counts is cached here. A failed fetch
//! surfaces as an error rather than an empty view, so a ready operation is
//! never demoted by a transport hiccup.

use crate::contract::{AccountContract, ExecuteReceipt};
use crate::service::{CoordinationService, RemoteOperationView};
use crate::store::ConfirmationStore;
use async_trait::async_trait;
use chrono::Utc;
use covault_types::{
    AccAddress, Confirmation, EngineError, Operation, OperationHash, OperationStatus, Result,
    Substrate, TrackedOperation,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Confirmation store backed by the remote coordination service
pub struct RemoteStore {
    service: Arc<dyn CoordinationService>,
    contract: Arc<dyn AccountContract>,
    /// Signable operation objects by hash; quorum data is never cached here
    ops: Mutex<HashMap<OperationHash, Operation>>,
    /// Display tags by hash
    origin_tags: Mutex<HashMap<OperationHash, String>>,
}

impl RemoteStore {
    pub fn new(service: Arc<dyn CoordinationService>, contract: Arc<dyn AccountContract>) -> Self {
        Self {
            service,
            contract,
            ops: Mutex::new(HashMap::new()),
            origin_tags: Mutex::new(HashMap::new()),
        }
    }

    /// Remote calls carry signer identity; an anonymous approval cannot be
    /// represented on this substrate.
    fn require_signer(signer: Option<AccAddress>) -> Result<AccAddress> {
        signer.ok_or_else(|| {
            EngineError::Internal("remote substrate requires a signer identity".to_string())
        })
    }

    /// Assemble the tracked view from the service's report plus whatever
    /// operation metadata this client holds.
    async fn view_to_tracked(
        &self,
        view: &RemoteOperationView,
        threshold: usize,
    ) -> TrackedOperation {
        let ops = self.ops.lock().await;
        let op = ops.get(&view.operation_hash);
        let origin_tags = self.origin_tags.lock().await;

        let mut tracked = TrackedOperation {
            operation_hash: view.operation_hash.clone(),
            to: op.map(|o| o.to).unwrap_or_default(),
            value: op.map(|o| o.value).unwrap_or(0),
            payload: op.map(|o| o.payload.clone()).unwrap_or_default(),
            call_type: op.map(|o| o.call_type).unwrap_or_default(),
            nonce: op.map(|o| o.nonce).unwrap_or(0),
            origin_tag: origin_tags.get(&view.operation_hash).cloned(),
            substrate: Substrate::Remote,
            status: OperationStatus::Pending,
            confirmations: view.decoded_confirmations(),
            signed_count: 0,
            threshold,
            execution_tx_hash: view.execution_tx_hash.clone(),
            needs_rebuild: op.is_none(),
        };
        if view.is_executed {
            tracked.status = OperationStatus::Executed;
        } else {
            tracked.recompute_status();
        }
        tracked
    }
}

#[async_trait]
impl ConfirmationStore for RemoteStore {
    fn substrate(&self) -> Substrate {
        Substrate::Remote
    }

    async fn propose(
        &self,
        operation: &Operation,
        sender_signature: Vec<u8>,
        sender: Option<AccAddress>,
        origin_tag: Option<String>,
    ) -> Result<OperationHash> {
        let hash = operation.hash();
        let signer = Self::require_signer(sender)?;
        let confirmation = Confirmation {
            operation_hash: hash.clone(),
            signer,
            signature: sender_signature,
            observed_at: Utc::now(),
        };
        self.service.propose(operation, &confirmation).await?;

        debug!(hash = %hash, "proposed operation on coordination service");
        self.ops.lock().await.insert(hash.clone(), operation.clone());
        if let Some(tag) = origin_tag {
            self.origin_tags.lock().await.insert(hash.clone(), tag);
        }
        Ok(hash)
    }

    async fn confirm(
        &self,
        hash: &OperationHash,
        signature: Vec<u8>,
        signer: Option<AccAddress>,
    ) -> Result<()> {
        let signer = Self::require_signer(signer)?;
        let confirmation = Confirmation {
            operation_hash: hash.clone(),
            signer,
            signature,
            observed_at: Utc::now(),
        };
        self.service.confirm(hash, &confirmation).await?;
        debug!(hash = %hash, signer = %signer, "confirmation sent to coordination service");
        Ok(())
    }

    async fn status(&self, hash: &OperationHash) -> Result<TrackedOperation> {
        // always a fresh fetch; the remote party is authoritative
        let view = self.service.get_operation(hash).await?;
        let threshold = self.contract.threshold().await?;
        Ok(self.view_to_tracked(&view, threshold).await)
    }

    async fn list_pending(&self, account: &AccAddress) -> Result<Vec<TrackedOperation>> {
        let views = self.service.list_pending(account).await?;
        let threshold = self.contract.threshold().await?;
        let mut out = Vec::with_capacity(views.len());
        for view in &views {
            if view.is_executed {
                continue;
            }
            out.push(self.view_to_tracked(view, threshold).await);
        }
        Ok(out)
    }

    async fn execute(&self, hash: &OperationHash) -> Result<ExecuteReceipt> {
        let operation = self
            .ops
            .lock()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| EngineError::UnknownOperation(hash.clone()))?;

        // gate on a fresh remote read right before dispatch
        let current = self.status(hash).await?;
        if current.status == OperationStatus::Executed {
            return Err(EngineError::AlreadyExecuted(hash.clone()));
        }
        let have = current.effective_confirmations();
        if have < current.threshold {
            return Err(EngineError::InsufficientConfirmations {
                have,
                need: current.threshold,
            });
        }

        let receipt = self.contract.execute(&operation).await?;
        debug!(hash = %hash, tx_hash = %receipt.tx_hash, "executed operation");
        Ok(receipt)
    }

    async fn contains(&self, hash: &OperationHash) -> bool {
        self.ops.lock().await.contains_key(hash)
    }

    async fn operation(&self, hash: &OperationHash) -> Option<Operation> {
        self.ops.lock().await.get(hash).cloned()
    }

    async fn restore_metadata(&self, tracked: TrackedOperation) -> Result<()> {
        // quorum state lives on the service; only the display tag is ours
        if let Some(tag) = tracked.origin_tag {
            self.origin_tags
                .lock()
                .await
                .insert(tracked.operation_hash, tag);
        }
        Ok(())
    }

    async fn attach_operation(&self, operation: Operation) -> Result<()> {
        self.ops.lock().await.insert(operation.hash(), operation);
        Ok(())
    }
}
