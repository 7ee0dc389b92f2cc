//! Order and position reconciliation for the put-desk ledger.
//!
//! A reconciliation pass keeps the local order ledger consistent with the
//! broker's authoritative state despite partial visibility, session
//! boundaries, missing identifiers, silent option expiration, and
//! assignment events the broker never announces.
//!
//! Pipeline: [`aggregate`] merges overlapping broker queries into one
//! deduplicated snapshot; [`matcher`] pairs broker orders with ledger
//! records; [`resolver`] corrects field drift on matched pairs;
//! [`expiry`] explains records the broker has silently purged;
//! [`positions`] and [`assignment`] run the position track. [`service`]
//! orchestrates one pass end to end.

pub mod aggregate;
pub mod assignment;
pub mod error;
pub mod expiry;
pub mod matcher;
pub mod positions;
pub mod report;
pub mod resolver;
pub mod service;
pub mod types;

pub use aggregate::{BrokerSnapshot, BrokerStateAggregator};
pub use assignment::AssignmentResolver;
pub use error::{ReconcileError, Result};
pub use expiry::ExpiryCloser;
pub use matcher::{match_orders, MatchOutcome, MatchedPair};
pub use positions::PositionReconciler;
pub use report::{PassOutcome, PositionReconciliationReport, ReconciliationReport};
pub use resolver::DiscrepancyResolver;
pub use service::Reconciler;
pub use types::{
    AssignmentEvent, Discrepancy, DiscrepancyKind, MissingOrder, OrphanOrder, PositionMismatch,
    PositionMismatchKind,
};
