//! Core types for the covault multisig coordination engine.
//!
//! This crate defines the value objects shared across the engine: account
//! addresses, operations and their content hashes, collected confirmations,
//! the tracked-operation state the coordinator mutates, the error taxonomy,
//! and TOML configuration.

pub mod address;
pub mod config;
pub mod error;
pub mod operation;

pub use address::AccAddress;
pub use config::{ChainConfig, ConfigError, CoordinationConfig, CovaultConfig};
pub use error::{EngineError, Result};
pub use operation::{
    CallRequest, CallType, Confirmation, Operation, OperationHash, OperationIntent,
    OperationStatus, PersistedOperation, Substrate, TrackedOperation,
};
