//! Lifecycle coordinator
//!
//! Drives an operation through built → proposed(pending) → confirmed
//! (pending|ready) → executed against whichever substrate the runtime policy
//! selected, writing through to persistence on every mutating transition.
//!
//! One coordinator instance owns one account session. Calls are user-paced,
//! but rapid repeated execute clicks on the same hash are serialized by an
//! in-flight guard so the chain never sees a double submission.

use crate::builder::OperationBuilder;
use crate::contract::AccountContract;
use crate::persistence::PersistenceAdapter;
use crate::policy::{RuntimePolicy, SubmissionPath};
use crate::relay::HostRelay;
use crate::store::ConfirmationStore;
use covault_log::{debug, info, warn};
use covault_types::{
    AccAddress, EngineError, Operation, OperationHash, OperationIntent, OperationStatus,
    PersistedOperation, Result, Substrate, TrackedOperation,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a build-and-propose call
#[derive(Clone, Debug)]
pub struct BuildOutcome {
    pub operation_hash: OperationHash,
    pub status: OperationStatus,
}

/// Orchestrates the operation lifecycle for one account session
pub struct Coordinator {
    policy: RuntimePolicy,
    builder: OperationBuilder,
    contract: Arc<dyn AccountContract>,
    store: Arc<dyn ConfirmationStore>,
    relay: Option<Arc<dyn HostRelay>>,
    persistence: PersistenceAdapter,
    /// This session's signer identity when the signing path exposes one
    signer: Option<AccAddress>,
    /// Hashes with an execute currently dispatched
    in_flight: Mutex<HashSet<OperationHash>>,
    /// Executed-operation history; pending state lives in the store
    executed: Mutex<HashMap<OperationHash, TrackedOperation>>,
}

impl Coordinator {
    pub fn new(
        policy: RuntimePolicy,
        builder: OperationBuilder,
        contract: Arc<dyn AccountContract>,
        store: Arc<dyn ConfirmationStore>,
        relay: Option<Arc<dyn HostRelay>>,
        persistence: PersistenceAdapter,
        signer: Option<AccAddress>,
    ) -> Self {
        Self {
            policy,
            builder,
            contract,
            store,
            relay,
            persistence,
            signer,
            in_flight: Mutex::new(HashSet::new()),
            executed: Mutex::new(HashMap::new()),
        }
    }

    /// The capability set this coordinator was resolved with
    pub fn policy(&self) -> RuntimePolicy {
        self.policy
    }

    /// Reload persisted state for a fresh session. Executed operations go to
    /// history; pending ones are restored as metadata carrying the
    /// needs-rebuild marker until their first confirm rebuilds the signable
    /// object.
    pub async fn restore_session(&self) -> Result<()> {
        let persisted = self.persistence.load(&self.builder.account);
        let mut restored = 0usize;
        for entry in persisted {
            let tracked = match entry.to_tracked() {
                Ok(tracked) => tracked,
                Err(e) => {
                    warn!(hash = %entry.operation_hash, error = %e, "skipping unreadable persisted entry");
                    continue;
                }
            };
            if tracked.status == OperationStatus::Executed {
                self.executed
                    .lock()
                    .await
                    .insert(tracked.operation_hash.clone(), tracked);
            } else {
                self.store.restore_metadata(tracked).await?;
                restored += 1;
            }
        }
        debug!(account = %self.builder.account, restored, "session state restored");
        Ok(())
    }

    /// Build an operation from an intent and propose it.
    ///
    /// On the host-relay path the host performs propose+sign+execute in one
    /// atomic call, so the returned identifier is recorded executed with no
    /// pending state in between. Everywhere else the proposal lands pending
    /// with the builder's own approval attached, and a 1-of-1 account
    /// executes inline since waiting for confirmations is meaningless there.
    pub async fn handle_build(&self, intent: &OperationIntent) -> Result<BuildOutcome> {
        if self.policy.submission_path == SubmissionPath::HostRelay {
            return self.build_via_relay(intent).await;
        }

        if !self.policy.can_sign {
            return Err(EngineError::NoSignerAvailable);
        }

        let nonce = self.contract.nonce().await?;
        let operation = self.builder.build(intent, nonce)?;
        let signature = self.contract.sign(&operation).await?;
        let hash = self
            .store
            .propose(&operation, signature, self.signer, intent.origin_tag.clone())
            .await?;
        info!(hash = %hash, "operation proposed");

        let threshold = self.contract.threshold().await?;
        let status = if threshold == 1 {
            self.execute_inner(&hash).await?;
            OperationStatus::Executed
        } else {
            self.store
                .status(&hash)
                .await
                .map(|t| t.status)
                .unwrap_or(OperationStatus::Pending)
        };

        self.persist_snapshot().await;
        Ok(BuildOutcome {
            operation_hash: hash,
            status,
        })
    }

    async fn build_via_relay(&self, intent: &OperationIntent) -> Result<BuildOutcome> {
        let relay = self
            .relay
            .as_ref()
            .ok_or_else(|| EngineError::Internal("no host relay configured".to_string()))?;

        // recipient is validated the same way as on the standalone path; the
        // nonce is the host's concern
        let operation = self.builder.build(intent, 0)?;
        let hash = relay.send_batch(vec![operation.as_call_request()]).await?;
        info!(hash = %hash, "batch executed via host relay");

        let threshold = self.contract.threshold().await.unwrap_or(1);
        let mut tracked = TrackedOperation::new(&operation, Substrate::Local, threshold);
        tracked.operation_hash = hash.clone();
        tracked.origin_tag = intent.origin_tag.clone();
        tracked.mark_executed(hash.as_str());
        self.executed.lock().await.insert(hash.clone(), tracked);

        self.persist_snapshot().await;
        Ok(BuildOutcome {
            operation_hash: hash,
            status: OperationStatus::Executed,
        })
    }

    /// Add this session's confirmation to a pending operation.
    ///
    /// After a reload only metadata survives; the signable operation is
    /// rebuilt deterministically from it before signing, without user input.
    pub async fn handle_confirm(&self, hash: &OperationHash) -> Result<()> {
        if !self.policy.can_sign {
            return Err(EngineError::NoSignerAvailable);
        }

        let operation = match self.store.operation(hash).await {
            Some(operation) => operation,
            None => self.rebuild_operation(hash).await?,
        };

        let signature = self.contract.sign(&operation).await?;
        self.store.confirm(hash, signature, self.signer).await?;
        info!(hash = %hash, "confirmation recorded");

        self.persist_snapshot().await;
        Ok(())
    }

    /// Rebuild the signable operation for a persisted-only entry and attach
    /// it to the store
    async fn rebuild_operation(&self, hash: &OperationHash) -> Result<Operation> {
        let persisted = self.persistence.load(&self.builder.account);
        let entry = persisted
            .iter()
            .find(|p| &p.operation_hash == hash)
            .ok_or_else(|| EngineError::UnknownOperation(hash.clone()))?;

        let operation = entry
            .to_operation()
            .map_err(|e| EngineError::Internal(format!("metadata rebuild failed: {e}")))?;
        if &operation.hash() != hash {
            return Err(EngineError::Internal(
                "persisted metadata does not reproduce the operation hash".to_string(),
            ));
        }

        self.store.attach_operation(operation.clone()).await?;
        debug!(hash = %hash, "signable operation rebuilt from persisted metadata");
        Ok(operation)
    }

    /// Execute a ready operation. Quorum is re-checked by the store
    /// immediately before dispatch; concurrent calls on the same hash are
    /// rejected while one is in flight.
    pub async fn handle_execute(&self, hash: &OperationHash) -> Result<String> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(hash.clone()) {
                return Err(EngineError::ExecutionInFlight(hash.clone()));
            }
        }

        let result = self.execute_inner(hash).await;
        self.in_flight.lock().await.remove(hash);

        match &result {
            Ok(tx_hash) => info!(hash = %hash, tx_hash = %tx_hash, "operation executed"),
            Err(e) if e.is_user_recoverable() => {
                debug!(hash = %hash, reason = %e.user_message(), "execution refused")
            }
            // remote and chain failures surface verbatim; the operation
            // stays in its last non-executed state
            Err(e) => warn!(hash = %hash, error = %e, "execution failed"),
        }
        result
    }

    async fn execute_inner(&self, hash: &OperationHash) -> Result<String> {
        let receipt = self.store.execute(hash).await?;

        // record history; the remote view may lag the execution we just
        // dispatched, so fall back to marking our last-known state
        let entry = match self.store.status(hash).await {
            Ok(mut tracked) => {
                if tracked.status != OperationStatus::Executed {
                    tracked.mark_executed(receipt.tx_hash.clone());
                }
                tracked
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "post-execute status read failed");
                let mut tracked = self
                    .persistence
                    .load(&self.builder.account)
                    .iter()
                    .find(|p| &p.operation_hash == hash)
                    .and_then(|p| p.to_tracked().ok())
                    .unwrap_or_else(|| {
                        let mut t = TrackedOperation::new(
                            &Operation {
                                account: self.builder.account,
                                chain_id: self.builder.chain_id.clone(),
                                to: AccAddress::default(),
                                value: 0,
                                payload: Vec::new(),
                                call_type: Default::default(),
                                nonce: 0,
                            },
                            self.store.substrate(),
                            0,
                        );
                        t.operation_hash = hash.clone();
                        t
                    });
                tracked.mark_executed(receipt.tx_hash.clone());
                tracked
            }
        };
        self.executed.lock().await.insert(hash.clone(), entry);

        self.persist_snapshot().await;
        Ok(receipt.tx_hash)
    }

    /// Current quorum-relevant view of one operation
    pub async fn status(&self, hash: &OperationHash) -> Result<TrackedOperation> {
        if let Some(entry) = self.executed.lock().await.get(hash) {
            return Ok(entry.clone());
        }
        self.store.status(hash).await
    }

    /// All operations still awaiting execution
    pub async fn list_pending(&self) -> Result<Vec<TrackedOperation>> {
        self.store.list_pending(&self.builder.account).await
    }

    /// Executed-operation history. Nothing is garbage collected; entries
    /// leave only through explicit clearing.
    pub async fn list_executed(&self) -> Vec<TrackedOperation> {
        self.executed.lock().await.values().cloned().collect()
    }

    /// Drop all persisted and in-memory history for this account
    pub async fn clear_history(&self) {
        self.executed.lock().await.clear();
        self.persist_snapshot().await;
    }

    /// Write-through of pending + executed metadata. Best effort: a failed
    /// pending read keeps the previously persisted pending entries so a
    /// remote flake cannot erase local knowledge.
    async fn persist_snapshot(&self) {
        let account = self.builder.account;
        let chain_id = &self.builder.chain_id;

        let pending: Vec<PersistedOperation> = match self.store.list_pending(&account).await {
            Ok(tracked) => tracked
                .iter()
                .map(|t| PersistedOperation::from_tracked(t, &account, chain_id))
                .collect(),
            Err(e) => {
                warn!(error = %e, "pending list unavailable, keeping persisted entries");
                self.persistence
                    .load(&account)
                    .into_iter()
                    .filter(|p| p.status != OperationStatus::Executed)
                    .collect()
            }
        };

        let executed = self.executed.lock().await;
        let mut snapshot: HashMap<OperationHash, PersistedOperation> = pending
            .into_iter()
            .map(|p| (p.operation_hash.clone(), p))
            .collect();
        for (hash, tracked) in executed.iter() {
            snapshot.insert(
                hash.clone(),
                PersistedOperation::from_tracked(tracked, &account, chain_id),
            );
        }

        let entries: Vec<PersistedOperation> = snapshot.into_values().collect();
        self.persistence.save(&account, &entries);
    }
}
