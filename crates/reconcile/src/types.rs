//! Value types produced by a reconciliation pass.

use chrono::{DateTime, Utc};
use put_desk_core::contract::ContractKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What kind of drift was found between a ledger record and the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    StatusMismatch,
    FillPriceMismatch,
    CommissionMissing,
}

impl DiscrepancyKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusMismatch => "status_mismatch",
            Self::FillPriceMismatch => "fill_price_mismatch",
            Self::CommissionMissing => "commission_missing",
        }
    }
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level difference between a ledger record and broker state.
///
/// `resolved` is false only when the correcting write failed; the next
/// pass will find and fix the same drift again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Ledger id of the affected record.
    pub order_id: i64,
    pub kind: DiscrepancyKind,
    pub old_value: String,
    pub new_value: String,
    pub resolved: bool,
}

impl Discrepancy {
    #[must_use]
    pub fn new(order_id: i64, kind: DiscrepancyKind, old_value: String, new_value: String) -> Self {
        Self {
            order_id,
            kind,
            old_value,
            new_value,
            resolved: false,
        }
    }
}

/// A broker-reported order with no matching ledger record.
///
/// Never auto-imported; importing is a separate, human-gated operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanOrder {
    pub order_id: i64,
    pub perm_id: i64,
    pub key: ContractKey,
    pub status: String,
}

/// A ledger record the broker no longer reports and nothing explains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingOrder {
    /// Ledger id of the record.
    pub order_id: i64,
    pub symbol: String,
    /// Human-readable contract description.
    pub contract: String,
    /// Ledger status at the time of the pass.
    pub status: String,
}

/// Direction-aware position drift classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionMismatchKind {
    /// Both sides hold the contract but quantities differ.
    QuantityMismatch,
    /// The broker reports a position the ledger does not know about.
    InBrokerNotLocal,
    /// The ledger holds an open position the broker no longer reports.
    InLocalNotBroker,
}

impl PositionMismatchKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuantityMismatch => "quantity_mismatch",
            Self::InBrokerNotLocal => "in_broker_not_local",
            Self::InLocalNotBroker => "in_local_not_broker",
        }
    }
}

/// Quantity disagreement for one contract.
///
/// Quantities are absolute values: the broker signs shorts negative while
/// the ledger counts contracts positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionMismatch {
    pub key: ContractKey,
    pub kind: PositionMismatchKind,
    pub local_quantity: Decimal,
    pub broker_quantity: Decimal,
}

impl PositionMismatch {
    /// Signed drift: broker minus local. Negative means the broker holds
    /// less than the ledger believes.
    #[must_use]
    pub fn drift(&self) -> Decimal {
        self.broker_quantity - self.local_quantity
    }
}

/// A short put converted into stock by counterparty exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub symbol: String,
    /// Shares delivered (positive).
    pub shares: Decimal,
    /// Broker average cost for the lot.
    pub avg_cost: Decimal,
    /// Ledger id of the originating short put.
    pub order_id: i64,
    /// Contract key of the originating short put.
    pub key: ContractKey,
    pub detected_at: DateTime<Utc>,
}
