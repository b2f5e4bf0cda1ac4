//! Runtime policy resolver
//!
//! Classifies the current session into the capability set the rest of the
//! engine consults: which signer class is active and which submission path
//! operations take. Pure classification, recomputed on every context change,
//! cheap enough to call on every render or poll.

use serde::{Deserialize, Serialize};

/// Where the application is running
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppContext {
    /// Running on its own; signs and submits for itself
    Standalone,
    /// Embedded inside a host application that signs and relays
    EmbeddedHost,
}

/// Which signing path the user activated in a standalone session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerKind {
    LocalDevSigner,
    ExternalWallet,
}

/// Resolved signer class for the session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerProvider {
    None,
    LocalDevSigner,
    ExternalWallet,
}

/// Resolved submission path for the session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPath {
    None,
    /// Host application relays and signs; used only when embedded
    HostRelay,
    /// Submit straight to the chain, confirmations tracked locally
    DirectToChain,
    /// Submit through the remote coordination service
    RemoteCoordination,
}

/// Inputs to policy resolution
#[derive(Clone, Copy, Debug)]
pub struct PolicyContext {
    pub app_context: AppContext,
    pub is_connected: bool,
    pub signer_kind: Option<SignerKind>,
    /// A coordination service is configured at all
    pub remote_service_enabled: bool,
    /// The configured service indexes the active chain
    pub remote_service_supports_chain: bool,
}

/// The capability set for the current session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePolicy {
    pub app_context: AppContext,
    pub signer_provider: SignerProvider,
    pub submission_path: SubmissionPath,
    pub can_sign: bool,
    pub can_submit: bool,
}

/// Resolve session capabilities from context.
///
/// Embedded hosts sign and relay on the app's behalf, so signing is never
/// available there and relay is the only submission path. Standalone
/// sessions get nothing until connected; once connected, the coordination
/// service is used iff it is configured and covers the active chain.
pub fn resolve(ctx: PolicyContext) -> RuntimePolicy {
    match ctx.app_context {
        AppContext::EmbeddedHost => RuntimePolicy {
            app_context: AppContext::EmbeddedHost,
            signer_provider: SignerProvider::None,
            submission_path: SubmissionPath::HostRelay,
            can_sign: false,
            can_submit: true,
        },
        AppContext::Standalone if !ctx.is_connected => RuntimePolicy {
            app_context: AppContext::Standalone,
            signer_provider: SignerProvider::None,
            submission_path: SubmissionPath::None,
            can_sign: false,
            can_submit: false,
        },
        AppContext::Standalone => {
            let signer_provider = match ctx.signer_kind {
                Some(SignerKind::LocalDevSigner) => SignerProvider::LocalDevSigner,
                // connected but no designated dev signer means a wallet is
                // backing the session
                Some(SignerKind::ExternalWallet) | None => SignerProvider::ExternalWallet,
            };
            let submission_path =
                if ctx.remote_service_enabled && ctx.remote_service_supports_chain {
                    SubmissionPath::RemoteCoordination
                } else {
                    SubmissionPath::DirectToChain
                };
            RuntimePolicy {
                app_context: AppContext::Standalone,
                signer_provider,
                submission_path,
                can_sign: true,
                can_submit: true,
            }
        }
    }
}
