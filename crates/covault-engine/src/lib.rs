//! Multisig transaction coordination engine.
//!
//! This crate coordinates operations on a shared smart-contract account that
//! enforces an N-of-M signature threshold. A proposer builds a candidate
//! operation, co-signers add their approval, and once the threshold is met
//! any signer submits it for execution.
//!
//! The moving parts:
//!
//! - [`policy`] decides which signing and submission capabilities are legal
//!   for the current session (standalone vs embedded, connected or not,
//!   coordination service available or not).
//! - [`builder`] turns a user intent into a canonical [`covault_types::Operation`]
//!   and its content hash.
//! - [`store`] tracks collected confirmations on one of two substrates: the
//!   remote coordination service (authoritative, re-fetched on every read) or
//!   a local-only store (a lower bound on real-world approvals).
//! - [`coordinator`] drives build → propose → confirm → execute against the
//!   active substrate, writes through to persistence, and recovers signable
//!   operations after a reload.
//! - [`persistence`] caches plain operation metadata in a key-value store,
//!   degrading to a warning when storage is unavailable.

pub mod builder;
pub mod contract;
pub mod coordinator;
pub mod persistence;
pub mod policy;
pub mod registry;
pub mod relay;
pub mod service;
pub mod session;
pub mod store;

pub use builder::OperationBuilder;
pub use contract::{AccountContract, ExecuteReceipt};
pub use coordinator::{BuildOutcome, Coordinator};
pub use persistence::{FileKv, KvStorage, MemoryKv, PersistenceAdapter};
pub use policy::{resolve, AppContext, PolicyContext, RuntimePolicy, SignerKind, SignerProvider, SubmissionPath};
pub use registry::ServiceRegistry;
pub use relay::HostRelay;
pub use service::{CoordinationService, HttpCoordinationService, RemoteOperationView};
pub use session::{open_session, SessionContext};
pub use store::{local::LocalStore, remote::RemoteStore, ConfirmationStore};

pub use covault_types::{EngineError, Result};
