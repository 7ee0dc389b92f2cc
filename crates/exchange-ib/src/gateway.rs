//! Read-only broker gateway trait.
//!
//! The reconciliation core talks to the broker exclusively through this
//! trait. Each method is one best-effort query: the caller decides how a
//! failure degrades the pass. Implementations map broker-native records
//! into the typed views in [`crate::types`] so ambiguity stays at this edge.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{BrokerExecution, BrokerFill, BrokerOrderView, BrokerPosition};

#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// True while the gateway connection is alive. A pass must not start
    /// without it.
    fn is_connected(&self) -> bool;

    /// Orders the current session has seen fill or update events for.
    async fn list_session_trades(&self) -> Result<Vec<BrokerOrderView>>;

    /// Open orders across all API client sessions.
    async fn list_open_trades(&self) -> Result<Vec<BrokerOrderView>>;

    /// Completed orders, including those placed in prior sessions
    /// (these arrive with order id 0).
    async fn list_completed_orders(&self) -> Result<Vec<BrokerOrderView>>;

    /// Execution reports for the current session's fill events.
    async fn list_executions(&self) -> Result<Vec<BrokerExecution>>;

    /// Commission reports keyed by execution id.
    async fn list_fills(&self) -> Result<Vec<BrokerFill>>;

    /// Raw execution reports requested from the broker directly; overlaps
    /// `list_executions` but can reach further back.
    async fn list_raw_executions(&self) -> Result<Vec<BrokerExecution>>;

    /// Current positions, options and stock, with signed quantities.
    async fn list_positions(&self) -> Result<Vec<BrokerPosition>>;
}
