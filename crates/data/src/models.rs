//! Order record model for the local ledger.
//!
//! Records are written when an order is placed and mutated afterwards only
//! by the reconciliation core (resolver and expiry closer).

use chrono::{DateTime, NaiveDate, Utc};
use put_desk_core::contract::{standard_multiplier, ContractKey, OptionRight, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Durable record of a placed short-put order.
///
/// `broker_order_id` is only stable within one gateway session and may be
/// absent for orders placed in a prior session; `broker_perm_id` is the
/// cross-session anchor.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocalOrderRecord {
    /// Auto-generated ledger ID.
    pub id: i64,
    /// Session-scoped broker order id, if known.
    pub broker_order_id: Option<i64>,
    /// Broker permanent id, stable across reconnects.
    pub broker_perm_id: Option<i64>,
    /// Underlying symbol.
    pub symbol: String,
    /// Strike price.
    pub strike: Decimal,
    /// Option expiration date.
    pub expiry: NaiveDate,
    /// Option right: "C" or "P".
    pub right: String,
    /// Number of contracts sold.
    pub contracts: i32,
    /// Limit price the order was placed at (premium per share).
    pub limit_price: Decimal,
    /// Lifecycle status: "submitted", "filled", "cancelled", "expired".
    pub status: String,
    /// Average fill price (premium per share), once filled.
    pub fill_price: Option<Decimal>,
    /// Contracts actually filled.
    pub filled_contracts: Option<i32>,
    /// Timestamp of the last execution.
    pub fill_time: Option<DateTime<Utc>>,
    /// Total commission paid, when the broker has reported it.
    pub commission: Option<Decimal>,
    /// Exit price per share (0 for expired-worthless).
    pub exit_price: Option<Decimal>,
    /// Exit reason: "expired", "closed", "assigned", ...
    pub exit_reason: Option<String>,
    /// Timestamp the exit was recorded.
    pub exit_time: Option<DateTime<Utc>>,
    /// Realized profit/loss in dollars.
    pub realized_pnl: Option<Decimal>,
    /// Return on the premium collected, in percent.
    pub roi_pct: Option<Decimal>,
    /// Timestamp the order was entered locally.
    pub entered_at: DateTime<Utc>,
    /// Last time reconciliation touched this record.
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl LocalOrderRecord {
    /// Creates a new submitted record (pre-fill).
    #[must_use]
    pub fn new(
        symbol: &str,
        strike: Decimal,
        expiry: NaiveDate,
        right: OptionRight,
        contracts: i32,
        limit_price: Decimal,
        entered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0, // Will be set by the database
            broker_order_id: None,
            broker_perm_id: None,
            symbol: symbol.to_uppercase(),
            strike,
            expiry,
            right: right.as_str().to_string(),
            contracts,
            limit_price,
            status: OrderStatus::Submitted.as_str().to_string(),
            fill_price: None,
            filled_contracts: None,
            fill_time: None,
            commission: None,
            exit_price: None,
            exit_reason: None,
            exit_time: None,
            realized_pnl: None,
            roi_pct: None,
            entered_at,
            reconciled_at: None,
        }
    }

    /// Returns the parsed option right.
    #[must_use]
    pub fn parsed_right(&self) -> Option<OptionRight> {
        OptionRight::parse(&self.right)
    }

    /// Returns the parsed lifecycle status.
    #[must_use]
    pub fn parsed_status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }

    /// Canonical contract key, or None if the stored right is unreadable.
    #[must_use]
    pub fn contract_key(&self) -> Option<ContractKey> {
        let right = self.parsed_right()?;
        Some(ContractKey::new(&self.symbol, self.strike, self.expiry, right))
    }

    /// Premium per share at entry: the fill price, or the limit price
    /// while the fill report is still outstanding.
    #[must_use]
    pub fn entry_premium(&self) -> Decimal {
        self.fill_price.unwrap_or(self.limit_price)
    }

    /// Total premium collected in dollars.
    #[must_use]
    pub fn premium_collected(&self) -> Decimal {
        self.entry_premium() * Decimal::from(self.contracts) * standard_multiplier()
    }

    /// True for a filled position with no recorded exit.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Filled.as_str() && !self.has_exit()
    }

    /// True once any exit event has been recorded.
    #[must_use]
    pub fn has_exit(&self) -> bool {
        self.exit_time.is_some() || self.exit_reason.is_some()
    }

    /// True while the order is still awaiting a fill or cancel.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Submitted.as_str()
    }

    /// True for a short put (the only kind this desk sells).
    #[must_use]
    pub fn is_put(&self) -> bool {
        self.parsed_right() == Some(OptionRight::Put)
    }
}

/// Field changes the reconciliation core may apply to a record.
///
/// `None` means "leave the column unchanged". The Postgres backend maps
/// this onto a single COALESCE update so a change set touches only the
/// columns it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderChanges {
    pub broker_order_id: Option<i64>,
    pub broker_perm_id: Option<i64>,
    pub status: Option<String>,
    pub fill_price: Option<Decimal>,
    pub filled_contracts: Option<i32>,
    pub fill_time: Option<DateTime<Utc>>,
    pub commission: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<String>,
    pub exit_time: Option<DateTime<Utc>>,
    pub realized_pnl: Option<Decimal>,
    pub roi_pct: Option<Decimal>,
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl OrderChanges {
    /// True when no field would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.broker_order_id.is_none()
            && self.broker_perm_id.is_none()
            && self.status.is_none()
            && self.fill_price.is_none()
            && self.filled_contracts.is_none()
            && self.fill_time.is_none()
            && self.commission.is_none()
            && self.exit_price.is_none()
            && self.exit_reason.is_none()
            && self.exit_time.is_none()
            && self.realized_pnl.is_none()
            && self.roi_pct.is_none()
            && self.reconciled_at.is_none()
    }

    /// Applies the change set to an in-memory record.
    pub fn apply_to(&self, record: &mut LocalOrderRecord) {
        if let Some(v) = self.broker_order_id {
            record.broker_order_id = Some(v);
        }
        if let Some(v) = self.broker_perm_id {
            record.broker_perm_id = Some(v);
        }
        if let Some(v) = &self.status {
            record.status = v.clone();
        }
        if let Some(v) = self.fill_price {
            record.fill_price = Some(v);
        }
        if let Some(v) = self.filled_contracts {
            record.filled_contracts = Some(v);
        }
        if let Some(v) = self.fill_time {
            record.fill_time = Some(v);
        }
        if let Some(v) = self.commission {
            record.commission = Some(v);
        }
        if let Some(v) = self.exit_price {
            record.exit_price = Some(v);
        }
        if let Some(v) = &self.exit_reason {
            record.exit_reason = Some(v.clone());
        }
        if let Some(v) = self.exit_time {
            record.exit_time = Some(v);
        }
        if let Some(v) = self.realized_pnl {
            record.realized_pnl = Some(v);
        }
        if let Some(v) = self.roi_pct {
            record.roi_pct = Some(v);
        }
        if let Some(v) = self.reconciled_at {
            record.reconciled_at = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_record() -> LocalOrderRecord {
        LocalOrderRecord::new(
            "nvda",
            dec!(140),
            NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
            OptionRight::Put,
            2,
            dec!(1.35),
            Utc.with_ymd_and_hms(2026, 2, 10, 15, 30, 0).unwrap(),
        )
    }

    #[test]
    fn new_record_is_pending_and_uppercased() {
        let record = sample_record();
        assert_eq!(record.symbol, "NVDA");
        assert_eq!(record.status, "submitted");
        assert!(record.is_pending());
        assert!(!record.is_open());
        assert!(!record.has_exit());
    }

    #[test]
    fn contract_key_uses_canonical_right() {
        let record = sample_record();
        let key = record.contract_key().unwrap();
        assert_eq!(key.display_name(), "NVDA 140P 2026-03-20");
    }

    #[test]
    fn contract_key_is_none_for_garbage_right() {
        let mut record = sample_record();
        record.right = "straddle".to_string();
        assert!(record.contract_key().is_none());
    }

    #[test]
    fn entry_premium_prefers_fill_price() {
        let mut record = sample_record();
        assert_eq!(record.entry_premium(), dec!(1.35));
        record.fill_price = Some(dec!(1.40));
        assert_eq!(record.entry_premium(), dec!(1.40));
    }

    #[test]
    fn premium_collected_uses_multiplier() {
        let mut record = sample_record();
        record.fill_price = Some(dec!(1.50));
        // 1.50 * 2 contracts * 100 = 300
        assert_eq!(record.premium_collected(), dec!(300));
    }

    #[test]
    fn open_requires_fill_without_exit() {
        let mut record = sample_record();
        record.status = "filled".to_string();
        assert!(record.is_open());

        record.exit_reason = Some("expired".to_string());
        assert!(!record.is_open());
        assert!(record.has_exit());
    }

    #[test]
    fn changes_apply_only_named_fields() {
        let mut record = sample_record();
        let changes = OrderChanges {
            status: Some("filled".to_string()),
            fill_price: Some(dec!(1.32)),
            ..OrderChanges::default()
        };
        assert!(!changes.is_empty());
        changes.apply_to(&mut record);

        assert_eq!(record.status, "filled");
        assert_eq!(record.fill_price, Some(dec!(1.32)));
        assert_eq!(record.commission, None);
        assert_eq!(record.limit_price, dec!(1.35));
    }

    #[test]
    fn empty_changes_report_empty() {
        assert!(OrderChanges::default().is_empty());
    }
}
