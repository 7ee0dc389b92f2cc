//! Explains ledger records the broker has silently dropped.
//!
//! Brokers purge expired-worthless option history without emitting any
//! fill or cancel event, so "missing from the broker" must be
//! disambiguated by date arithmetic before it can be called a problem.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use put_desk_core::config::ReconcileConfig;
use put_desk_core::contract::{ContractKey, OrderStatus};
use put_desk_data::models::{LocalOrderRecord, OrderChanges};
use put_desk_data::store::LocalTradeStore;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::error::ReconcileError;
use crate::types::MissingOrder;

/// Why a missing record is (or is not) accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingExplanation {
    /// A live broker position proves the order filled; the broker merely
    /// purged its order history. Nothing to do.
    LivePosition,
    /// The option expired; the silence is expected and a close can be
    /// synthesized.
    Expired,
    /// Nothing explains the absence; surfaced for manual review.
    Unexplained,
}

/// Closes expired short options and flags what it cannot explain.
pub struct ExpiryCloser {
    market_offset: FixedOffset,
    market_close: NaiveTime,
}

impl ExpiryCloser {
    #[must_use]
    pub fn new(config: &ReconcileConfig) -> Self {
        let market_offset = FixedOffset::east_opt(config.market_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        let market_close =
            NaiveTime::from_hms_opt(config.market_close_hour, config.market_close_minute, 0)
                .unwrap_or(NaiveTime::MIN);
        Self {
            market_offset,
            market_close,
        }
    }

    /// Classifies one missing record against the live position snapshot
    /// and the market clock.
    #[must_use]
    pub fn classify(
        &self,
        record: &LocalOrderRecord,
        live_keys: &HashSet<ContractKey>,
        now: DateTime<Utc>,
    ) -> MissingExplanation {
        if record
            .contract_key()
            .is_some_and(|key| live_keys.contains(&key))
        {
            return MissingExplanation::LivePosition;
        }
        if self.is_past_expiry(record, now) {
            return MissingExplanation::Expired;
        }
        MissingExplanation::Unexplained
    }

    /// Processes the matcher's missing set: drops records explained by a
    /// live position, synthesizes closes for expired options, and returns
    /// the genuinely unexplained remainder along with the close count.
    pub async fn process(
        &self,
        missing: Vec<LocalOrderRecord>,
        live_keys: &HashSet<ContractKey>,
        store: &dyn LocalTradeStore,
        now: DateTime<Utc>,
    ) -> (usize, Vec<MissingOrder>) {
        let mut closed = 0;
        let mut unexplained = Vec::new();

        for record in missing {
            match self.classify(&record, live_keys, now) {
                MissingExplanation::LivePosition => {
                    debug!(
                        order_id = record.id,
                        symbol = record.symbol,
                        "Missing order explained by live position; broker purged its history"
                    );
                }
                MissingExplanation::Expired => {
                    let changes = expired_close(&record, now);
                    match store.update(record.id, &changes).await {
                        Ok(()) => {
                            info!(
                                order_id = record.id,
                                symbol = record.symbol,
                                pnl = %changes.realized_pnl.unwrap_or(Decimal::ZERO),
                                "Closed expired option"
                            );
                            closed += 1;
                        }
                        Err(e) => {
                            let err = ReconcileError::persistence(record.id, e.to_string());
                            error!(
                                error = %err,
                                "Failed to persist expiry close; will retry next pass"
                            );
                            unexplained.push(missing_order(&record));
                        }
                    }
                }
                MissingExplanation::Unexplained => unexplained.push(missing_order(&record)),
            }
        }
        (closed, unexplained)
    }

    /// True once the option can no longer trade: expiry in the past, or
    /// today after the market close cutoff.
    fn is_past_expiry(&self, record: &LocalOrderRecord, now: DateTime<Utc>) -> bool {
        let market_now = now.with_timezone(&self.market_offset);
        let today = market_now.date_naive();
        if record.expiry < today {
            return true;
        }
        record.expiry == today && market_now.time() >= self.market_close
    }
}

/// Synthesized close for a short option that expired worthless: the full
/// premium is kept, so P&L is premium x contracts x multiplier and ROI
/// is 100%.
fn expired_close(record: &LocalOrderRecord, now: DateTime<Utc>) -> OrderChanges {
    OrderChanges {
        status: Some(OrderStatus::Expired.as_str().to_string()),
        exit_price: Some(Decimal::ZERO),
        exit_reason: Some("expired".to_string()),
        exit_time: Some(now),
        realized_pnl: Some(record.premium_collected()),
        roi_pct: Some(Decimal::ONE_HUNDRED),
        reconciled_at: Some(now),
        ..OrderChanges::default()
    }
}

fn missing_order(record: &LocalOrderRecord) -> MissingOrder {
    MissingOrder {
        order_id: record.id,
        symbol: record.symbol.clone(),
        contract: format!(
            "{} {}{} {}",
            record.symbol, record.strike, record.right, record.expiry
        ),
        status: record.status.clone(),
    }
}
