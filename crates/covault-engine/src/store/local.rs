//! Local-only confirmation store
//!
//! Used when no coordination service is configured for the active chain.
//! Confirmations accumulate only from calls made by this client instance, so
//! the store never claims more approvals than it has directly witnessed a
//! signature for. Other signers' local confirmations are invisible here.

use crate::contract::{AccountContract, ExecuteReceipt};
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

/// In-memory confirmation store for one account session
pub struct LocalStore {
    contract: Arc<dyn AccountContract>,
    /// Signable operation objects by hash
    ops: Mutex<HashMap<OperationHash, Operation>>,
    /// Quorum state by hash
    tracked: Mutex<HashMap<OperationHash, TrackedOperation>>,
}

impl LocalStore {
    pub fn new(contract: Arc<dyn AccountContract>) -> Self {
        Self {
            contract,
            ops: Mutex::new(HashMap::new()),
            tracked: Mutex::new(HashMap::new()),
        }
    }

    fn confirmation(hash: &OperationHash, signer: AccAddress, signature: Vec<u8>) -> Confirmation {
        Confirmation {
            operation_hash: hash.clone(),
            signer,
            signature,
            observed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ConfirmationStore for LocalStore {
    fn substrate(&self) -> Substrate {
        Substrate::Local
    }

    async fn propose(
        &self,
        operation: &Operation,
        sender_signature: Vec<u8>,
        sender: Option<AccAddress>,
        origin_tag: Option<String>,
    ) -> Result<OperationHash> {
        let hash = operation.hash();
        let threshold = self.contract.threshold().await?;

        let mut entry = TrackedOperation::new(operation, Substrate::Local, threshold);
        entry.origin_tag = origin_tag;
        match sender {
            Some(signer) => {
                entry.record_confirmation(Self::confirmation(&hash, signer, sender_signature))
            }
            None => entry.record_anonymous_signature(),
        }

        debug!(hash = %hash, threshold, "proposed operation on local substrate");
        self.ops.lock().await.insert(hash.clone(), operation.clone());
        self.tracked.lock().await.insert(hash.clone(), entry);
        Ok(hash)
    }

    async fn confirm(
        &self,
        hash: &OperationHash,
        signature: Vec<u8>,
        signer: Option<AccAddress>,
    ) -> Result<()> {
        let mut tracked = self.tracked.lock().await;
        let entry = tracked
            .get_mut(hash)
            .ok_or_else(|| EngineError::UnknownOperation(hash.clone()))?;
        if entry.status == OperationStatus::Executed {
            return Err(EngineError::AlreadyExecuted(hash.clone()));
        }
        match signer {
            Some(signer) => entry.record_confirmation(Self::confirmation(hash, signer, signature)),
            None => entry.record_anonymous_signature(),
        }
        debug!(
            hash = %hash,
            effective = entry.effective_confirmations(),
            "recorded local confirmation"
        );
        Ok(())
    }

    async fn status(&self, hash: &OperationHash) -> Result<TrackedOperation> {
        let mut tracked = self.tracked.lock().await;
        let entry = tracked
            .get_mut(hash)
            .ok_or_else(|| EngineError::UnknownOperation(hash.clone()))?;
        entry.recompute_status();
        Ok(entry.clone())
    }

    async fn list_pending(&self, _account: &AccAddress) -> Result<Vec<TrackedOperation>> {
        let tracked = self.tracked.lock().await;
        Ok(tracked
            .values()
            .filter(|t| t.status != OperationStatus::Executed)
            .cloned()
            .collect())
    }

    async fn execute(&self, hash: &OperationHash) -> Result<ExecuteReceipt> {
        let operation = self
            .ops
            .lock()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| EngineError::UnknownOperation(hash.clone()))?;

        // gate on a fresh read, with the contract's current threshold, right
        // before dispatch
        let threshold = self.contract.threshold().await?;
        {
            let mut tracked = self.tracked.lock().await;
            let entry = tracked
                .get_mut(hash)
                .ok_or_else(|| EngineError::UnknownOperation(hash.clone()))?;
            entry.threshold = threshold;
            entry.recompute_status();
            if entry.status == OperationStatus::Executed {
                return Err(EngineError::AlreadyExecuted(hash.clone()));
            }
            let have = entry.effective_confirmations();
            if have < threshold {
                return Err(EngineError::InsufficientConfirmations {
                    have,
                    need: threshold,
                });
            }
        }

        let receipt = self.contract.execute(&operation).await?;

        let mut tracked = self.tracked.lock().await;
        if let Some(entry) = tracked.get_mut(hash) {
            entry.mark_executed(receipt.tx_hash.clone());
        }
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
        self.tracked
            .lock()
            .await
            .insert(tracked.operation_hash.clone(), tracked);
        Ok(())
    }

    async fn attach_operation(&self, operation: Operation) -> Result<()> {
        let hash = operation.hash();
        let mut tracked = self.tracked.lock().await;
        let entry = tracked
            .get_mut(&hash)
            .ok_or_else(|| EngineError::UnknownOperation(hash.clone()))?;
        entry.needs_rebuild = false;
        self.ops.lock().await.insert(hash, operation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covault_types::CallType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Contract double that counts execute calls
    struct FakeContract {
        threshold: usize,
        execute_calls: AtomicUsize,
    }

    impl FakeContract {
        fn new(threshold: usize) -> Arc<Self> {
            Arc::new(Self {
                threshold,
                execute_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AccountContract for FakeContract {
        async fn create_operation(
            &self,
            calls: Vec<covault_types::CallRequest>,
        ) -> Result<Operation> {
            let call = calls.into_iter().next().unwrap();
            Ok(Operation {
                account: AccAddress::from_pubkey(&[1u8; 33]),
                chain_id: "covault-test".to_string(),
                to: call.to,
                value: call.value,
                payload: call.payload,
                call_type: CallType::Direct,
                nonce: 0,
            })
        }

        async fn sign(&self, operation: &Operation) -> Result<Vec<u8>> {
            Ok(operation.hash().as_str().as_bytes()[..8].to_vec())
        }

        async fn execute(&self, operation: &Operation) -> Result<ExecuteReceipt> {
            self.execute_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExecuteReceipt {
                tx_hash: format!("TX-{}", operation.hash()),
            })
        }

        async fn operation_hash(&self, operation: &Operation) -> Result<OperationHash> {
            Ok(operation.hash())
        }

        async fn owners(&self) -> Result<Vec<AccAddress>> {
            Ok(vec![])
        }

        async fn threshold(&self) -> Result<usize> {
            Ok(self.threshold)
        }

        async fn nonce(&self) -> Result<u64> {
            Ok(0)
        }
    }

    fn operation(nonce: u64) -> Operation {
        Operation {
            account: AccAddress::from_pubkey(&[1u8; 33]),
            chain_id: "covault-test".to_string(),
            to: AccAddress::from_pubkey(&[2u8; 33]),
            value: 42,
            payload: vec![],
            call_type: CallType::Direct,
            nonce,
        }
    }

    fn signer(seed: u8) -> AccAddress {
        AccAddress::from_pubkey(&[seed; 33])
    }

    #[tokio::test]
    async fn test_execute_gated_below_threshold() {
        let contract = FakeContract::new(2);
        let store = LocalStore::new(contract.clone());
        let op = operation(0);
        let hash = store
            .propose(&op, vec![1], Some(signer(10)), None)
            .await
            .unwrap();

        let err = store.execute(&hash).await.unwrap_err();
        match err {
            EngineError::InsufficientConfirmations { have, need } => {
                assert_eq!((have, need), (1, 2));
            }
            other => panic!("expected gating error, got {other:?}"),
        }
        // the contract primitive was never invoked
        assert_eq!(contract.execute_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_quorum_then_execute() {
        let contract = FakeContract::new(2);
        let store = LocalStore::new(contract.clone());
        let op = operation(0);
        let hash = store
            .propose(&op, vec![1], Some(signer(10)), None)
            .await
            .unwrap();

        store.confirm(&hash, vec![2], Some(signer(11))).await.unwrap();
        let status = store.status(&hash).await.unwrap();
        assert_eq!(status.status, OperationStatus::Ready);

        let receipt = store.execute(&hash).await.unwrap();
        assert!(receipt.tx_hash.starts_with("TX-"));
        assert_eq!(contract.execute_calls.load(Ordering::SeqCst), 1);

        // second execute is rejected, not re-submitted
        let err = store.execute(&hash).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExecuted(_)));
        assert_eq!(contract.execute_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_anonymous_and_named_counts_reconcile() {
        let contract = FakeContract::new(3);
        let store = LocalStore::new(contract);
        let op = operation(0);
        // 1-of-1 fast-path style propose without a recorded signer
        let hash = store.propose(&op, vec![1], None, None).await.unwrap();

        store.confirm(&hash, vec![2], None).await.unwrap();
        store.confirm(&hash, vec![3], Some(signer(11))).await.unwrap();

        let status = store.status(&hash).await.unwrap();
        // explicit count 2, named set 1 -> effective 2
        assert_eq!(status.effective_confirmations(), 2);
        assert_eq!(status.status, OperationStatus::Pending);

        store.confirm(&hash, vec![4], Some(signer(12))).await.unwrap();
        store.confirm(&hash, vec![5], Some(signer(13))).await.unwrap();
        let status = store.status(&hash).await.unwrap();
        // named set 3 beats count 2
        assert_eq!(status.effective_confirmations(), 3);
        assert_eq!(status.status, OperationStatus::Ready);
    }

    #[tokio::test]
    async fn test_unknown_hash() {
        let store = LocalStore::new(FakeContract::new(1));
        let missing = OperationHash::new("00".repeat(32));
        assert!(matches!(
            store.status(&missing).await,
            Err(EngineError::UnknownOperation(_))
        ));
        assert!(matches!(
            store.confirm(&missing, vec![], None).await,
            Err(EngineError::UnknownOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pending_excludes_executed() {
        let contract = FakeContract::new(1);
        let store = LocalStore::new(contract);
        let account = AccAddress::from_pubkey(&[1u8; 33]);

        let first = store
            .propose(&operation(0), vec![1], Some(signer(10)), None)
            .await
            .unwrap();
        store
            .propose(&operation(1), vec![1], Some(signer(10)), None)
            .await
            .unwrap();

        store.execute(&first).await.unwrap();
        let pending = store.list_pending(&account).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].operation_hash, first);
    }

    #[tokio::test]
    async fn test_restore_then_attach_clears_rebuild_marker() {
        let store = LocalStore::new(FakeContract::new(2));
        let op = operation(0);
        let mut tracked = TrackedOperation::new(&op, Substrate::Local, 2);
        tracked.needs_rebuild = true;

        store.restore_metadata(tracked).await.unwrap();
        let hash = op.hash();
        assert!(!store.contains(&hash).await);
        assert!(store.status(&hash).await.unwrap().needs_rebuild);

        store.attach_operation(op.clone()).await.unwrap();
        assert!(store.contains(&hash).await);
        assert_eq!(store.operation(&hash).await, Some(op));
        assert!(!store.status(&hash).await.unwrap().needs_rebuild);
    }

    #[tokio::test]
    async fn test_attach_without_metadata_is_unknown() {
        let store = LocalStore::new(FakeContract::new(1));
        assert!(matches!(
            store.attach_operation(operation(0)).await,
            Err(EngineError::UnknownOperation(_))
        ));
    }
}
