//! Host relay seam
//!
//! Available only when embedded in a host application. The host signs and
//! submits the batch in one atomic call, which is why the coordinator can
//! mark the returned identifier executed without an intermediate pending
//! state.

use async_trait::async_trait;
use covault_types::{CallRequest, OperationHash, Result};

/// Submission relay exposed by an embedding host
#[async_trait]
pub trait HostRelay: Send + Sync {
    /// Hand a call batch to the host for propose+sign+execute in one step
    async fn send_batch(&self, calls: Vec<CallRequest>) -> Result<OperationHash>;
}
