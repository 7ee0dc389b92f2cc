//! Interactive Brokers boundary for the put-desk system.
//!
//! Maps the broker's duck-typed, partially-NaN wire records into
//! strongly-typed views at this edge, so downstream code never guards
//! against missing attributes. Provides the connection client and the
//! read-only `BrokerGateway` trait the reconciliation core consumes.

pub mod client;
pub mod gateway;
pub mod types;

pub use client::IbClient;
pub use gateway::BrokerGateway;
pub use types::{
    BrokerExecution, BrokerFill, BrokerOrderStatus, BrokerOrderView, BrokerPosition,
    BrokerSecurity, BrokerSource,
};
