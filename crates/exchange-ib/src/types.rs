//! Strongly-typed broker records.
//!
//! IB reports prices and commissions as floats that may be zero, NaN, or a
//! "value unset" sentinel. All of that is resolved here: a field the broker
//! did not really report becomes `None`, never a magic number.

use chrono::{DateTime, NaiveDate, Utc};
use put_desk_core::contract::{ContractKey, OptionRight};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// IB encodes "unset" double fields as f64::MAX.
const UNSET_DOUBLE: f64 = 1.0e300;

/// Maps a raw broker price into an honest optional.
///
/// Zero is treated as unreported: IB returns avgFillPrice 0 for orders whose
/// fill detail lives only in the execution reports.
#[must_use]
pub fn price_from_raw(raw: f64) -> Option<Decimal> {
    if !raw.is_finite() || raw >= UNSET_DOUBLE || raw <= 0.0 {
        return None;
    }
    Decimal::try_from(raw).ok()
}

/// Maps a raw commission value, dropping the broker's "unavailable" sentinel.
#[must_use]
pub fn commission_from_raw(raw: f64) -> Option<Decimal> {
    if !raw.is_finite() || raw.abs() >= UNSET_DOUBLE {
        return None;
    }
    Decimal::try_from(raw).ok()
}

/// Order status as IB reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerOrderStatus {
    PendingSubmit,
    PreSubmitted,
    Submitted,
    Filled,
    Cancelled,
    ApiCancelled,
    Inactive,
    Other(String),
}

impl BrokerOrderStatus {
    /// Parses the broker's status string; unknown strings are preserved.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "PendingSubmit" => Self::PendingSubmit,
            "PreSubmitted" => Self::PreSubmitted,
            "Submitted" => Self::Submitted,
            "Filled" => Self::Filled,
            "Cancelled" => Self::Cancelled,
            "ApiCancelled" => Self::ApiCancelled,
            "Inactive" => Self::Inactive,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PendingSubmit => "PendingSubmit",
            Self::PreSubmitted => "PreSubmitted",
            Self::Submitted => "Submitted",
            Self::Filled => "Filled",
            Self::Cancelled => "Cancelled",
            Self::ApiCancelled => "ApiCancelled",
            Self::Inactive => "Inactive",
            Self::Other(s) => s,
        }
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ApiCancelled)
    }
}

impl std::fmt::Display for BrokerOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which broker query produced a record. Kept for degraded-pass logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerSource {
    SessionTrades,
    OpenOrders,
    CompletedOrders,
}

impl BrokerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionTrades => "session_trades",
            Self::OpenOrders => "open_orders",
            Self::CompletedOrders => "completed_orders",
        }
    }
}

/// One broker-side order, rebuilt fresh each reconciliation pass.
///
/// `order_id` is only meaningful within the session that placed the order
/// and is 0 for prior-session orders; `perm_id` survives reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOrderView {
    pub order_id: i64,
    pub perm_id: i64,
    pub symbol: String,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub right: OptionRight,
    pub status: BrokerOrderStatus,
    /// None when the broker reported 0/NaN and the real price must come
    /// from execution reports.
    pub avg_fill_price: Option<Decimal>,
    /// Quantity filled so far, in contracts.
    pub filled: Decimal,
    pub source: BrokerSource,
}

impl BrokerOrderView {
    #[must_use]
    pub fn contract_key(&self) -> ContractKey {
        ContractKey::new(&self.symbol, self.strike, self.expiry, self.right)
    }

    /// True when the session-scoped order id can be used for matching.
    #[must_use]
    pub fn has_usable_order_id(&self) -> bool {
        self.order_id > 0
    }

    /// True when execution reports must backfill this view.
    #[must_use]
    pub fn needs_enrichment(&self) -> bool {
        !self.has_usable_order_id() || self.avg_fill_price.is_none()
    }
}

/// A single execution report. Authoritative for price, size, and time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerExecution {
    pub exec_id: String,
    pub order_id: i64,
    pub perm_id: i64,
    pub symbol: String,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub right: OptionRight,
    /// Contracts in this execution.
    pub shares: Decimal,
    /// Price per share for this execution.
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

impl BrokerExecution {
    #[must_use]
    pub fn contract_key(&self) -> ContractKey {
        ContractKey::new(&self.symbol, self.strike, self.expiry, self.right)
    }
}

/// Commission report attached to an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerFill {
    pub exec_id: String,
    /// None when the broker sent its "commission unavailable" sentinel.
    pub commission: Option<Decimal>,
}

/// What kind of instrument a position is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerSecurity {
    Stock,
    Option {
        strike: Decimal,
        expiry: NaiveDate,
        right: OptionRight,
    },
}

/// A current broker position. Quantity is signed: shorts are negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub security: BrokerSecurity,
    pub quantity: Decimal,
    pub avg_cost: Decimal,
}

impl BrokerPosition {
    #[must_use]
    pub fn is_option(&self) -> bool {
        matches!(self.security, BrokerSecurity::Option { .. })
    }

    #[must_use]
    pub fn is_stock(&self) -> bool {
        matches!(self.security, BrokerSecurity::Stock)
    }

    /// Contract key for option positions; None for stock.
    #[must_use]
    pub fn contract_key(&self) -> Option<ContractKey> {
        match &self.security {
            BrokerSecurity::Option {
                strike,
                expiry,
                right,
            } => Some(ContractKey::new(&self.symbol, *strike, *expiry, *right)),
            BrokerSecurity::Stock => None,
        }
    }
}
