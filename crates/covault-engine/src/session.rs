//! Session wiring
//!
//! Opens a coordinator for one tracked account: resolves the runtime policy
//! from config and connection state, picks the confirmation substrate the
//! policy calls for, and assembles the coordinator around it.

use crate::builder::OperationBuilder;
use crate::contract::AccountContract;
use crate::coordinator::Coordinator;
use crate::persistence::{KvStorage, PersistenceAdapter};
use crate::policy::{resolve, AppContext, PolicyContext, SignerKind, SubmissionPath};
use crate::registry::ServiceRegistry;
use crate::relay::HostRelay;
use crate::store::{local::LocalStore, remote::RemoteStore, ConfirmationStore};
use covault_types::{AccAddress, CovaultConfig, Result};
use std::sync::Arc;
use tracing::info;

/// Per-session inputs that are not part of the static config
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// The shared account to track
    pub account: AccAddress,
    pub app_context: AppContext,
    pub is_connected: bool,
    pub signer_kind: Option<SignerKind>,
    /// This session's signer identity, when the signing path exposes one
    pub signer: Option<AccAddress>,
}

/// Resolve the policy and assemble a coordinator for the session.
///
/// The remote substrate is selected iff the resolved submission path is the
/// coordination service; its client comes from the registry so sessions on
/// the same chain share one. Everything else tracks confirmations locally.
pub fn open_session(
    config: &CovaultConfig,
    ctx: SessionContext,
    contract: Arc<dyn AccountContract>,
    relay: Option<Arc<dyn HostRelay>>,
    registry: &ServiceRegistry,
    storage: Arc<dyn KvStorage>,
) -> Result<Coordinator> {
    let chain_id = config.chain.id.clone();
    let policy = resolve(PolicyContext {
        app_context: ctx.app_context,
        is_connected: ctx.is_connected,
        signer_kind: ctx.signer_kind,
        remote_service_enabled: config.coordination.enabled,
        remote_service_supports_chain: config.coordination_supports_chain(&chain_id),
    });

    let store: Arc<dyn ConfirmationStore> =
        if policy.submission_path == SubmissionPath::RemoteCoordination {
            let service = registry.get_or_create(&chain_id, &config.coordination)?;
            Arc::new(RemoteStore::new(service, contract.clone()))
        } else {
            Arc::new(LocalStore::new(contract.clone()))
        };

    info!(
        account = %ctx.account,
        chain_id = %chain_id,
        substrate = ?store.substrate(),
        path = ?policy.submission_path,
        "session opened"
    );

    Ok(Coordinator::new(
        policy,
        OperationBuilder::new(ctx.account, chain_id),
        contract,
        store,
        relay,
        PersistenceAdapter::new(storage),
        ctx.signer,
    ))
}
