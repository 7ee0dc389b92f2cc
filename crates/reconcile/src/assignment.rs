//! Detects option assignment from unexplained stock lots.
//!
//! The broker never announces assignment; it just delivers stock. A long
//! lot sized in whole contract multiples with no local stock trade behind
//! it is attributed to the newest open short put on that symbol, since
//! assignment risk concentrates near expiration.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use put_desk_core::contract::standard_multiplier;
use put_desk_data::models::LocalOrderRecord;
use put_desk_ib::types::BrokerPosition;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::types::AssignmentEvent;

/// Matches new stock lots to the short puts that produced them.
pub struct AssignmentResolver;

impl AssignmentResolver {
    /// Scans broker long-stock lots for probable assignments.
    ///
    /// `known_stock_symbols` lists symbols with a local stock trade on
    /// record; lots on those symbols are organic purchases, not
    /// assignments. Lots with no candidate put are ignored entirely.
    #[must_use]
    pub fn detect(
        stock_lots: &[&BrokerPosition],
        known_stock_symbols: &HashSet<String>,
        open_puts: &[LocalOrderRecord],
        now: DateTime<Utc>,
    ) -> Vec<AssignmentEvent> {
        let mut events = Vec::new();

        for lot in stock_lots {
            if !is_assignment_shaped(lot) {
                continue;
            }
            if known_stock_symbols.contains(&lot.symbol) {
                debug!(symbol = lot.symbol, "Stock lot matches a local trade; not an assignment");
                continue;
            }
            let Some(put) = newest_open_put(open_puts, &lot.symbol) else {
                debug!(
                    symbol = lot.symbol,
                    shares = %lot.quantity,
                    "Stock lot has no candidate put; ignoring"
                );
                continue;
            };
            let Some(key) = put.contract_key() else {
                continue;
            };

            info!(
                symbol = lot.symbol,
                shares = %lot.quantity,
                order_id = put.id,
                key = %key,
                "Assignment detected"
            );
            events.push(AssignmentEvent {
                symbol: lot.symbol.clone(),
                shares: lot.quantity,
                avg_cost: lot.avg_cost,
                order_id: put.id,
                key,
                detected_at: now,
            });
        }
        events
    }
}

/// Assignment delivers whole contracts: a positive share count in exact
/// multiples of the contract multiplier.
fn is_assignment_shaped(lot: &BrokerPosition) -> bool {
    lot.quantity > Decimal::ZERO && (lot.quantity % standard_multiplier()).is_zero()
}

/// The most recently entered open put on the symbol; ties break toward
/// the higher ledger id for determinism.
fn newest_open_put<'a>(
    open_puts: &'a [LocalOrderRecord],
    symbol: &str,
) -> Option<&'a LocalOrderRecord> {
    open_puts
        .iter()
        .filter(|p| p.is_put() && p.is_open() && p.symbol == symbol)
        .max_by_key(|p| (p.entered_at, p.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use put_desk_core::contract::OptionRight;
    use put_desk_ib::types::BrokerSecurity;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 21, 14, 0, 0).unwrap()
    }

    fn open_put(id: i64, symbol: &str, entered_day: u32) -> LocalOrderRecord {
        let mut record = LocalOrderRecord::new(
            symbol,
            dec!(140),
            NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
            OptionRight::Put,
            1,
            dec!(1.30),
            Utc.with_ymd_and_hms(2026, 2, entered_day, 15, 0, 0).unwrap(),
        );
        record.id = id;
        record.status = "filled".to_string();
        record
    }

    fn stock_lot(symbol: &str, shares: Decimal) -> BrokerPosition {
        BrokerPosition {
            symbol: symbol.to_string(),
            security: BrokerSecurity::Stock,
            quantity: shares,
            avg_cost: dec!(140),
        }
    }

    #[test]
    fn assigns_to_the_newest_put() {
        let older = open_put(1, "NVDA", 5);
        let newer = open_put(2, "NVDA", 12);
        let lot = stock_lot("NVDA", dec!(100));

        let events =
            AssignmentResolver::detect(&[&lot], &HashSet::new(), &[older, newer], now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id, 2);
        assert_eq!(events[0].shares, dec!(100));
    }

    #[test]
    fn odd_share_counts_are_not_assignments() {
        let put = open_put(1, "NVDA", 5);
        let lot = stock_lot("NVDA", dec!(137));

        let events = AssignmentResolver::detect(&[&lot], &HashSet::new(), &[put], now());
        assert!(events.is_empty());
    }

    #[test]
    fn lots_without_candidate_puts_are_ignored() {
        let put = open_put(1, "NVDA", 5);
        let lot = stock_lot("AMD", dec!(200));

        let events = AssignmentResolver::detect(&[&lot], &HashSet::new(), &[put], now());
        assert!(events.is_empty());
    }

    #[test]
    fn known_stock_trades_suppress_detection() {
        let put = open_put(1, "NVDA", 5);
        let lot = stock_lot("NVDA", dec!(100));
        let mut known = HashSet::new();
        known.insert("NVDA".to_string());

        let events = AssignmentResolver::detect(&[&lot], &known, &[put], now());
        assert!(events.is_empty());
    }

    #[test]
    fn closed_puts_are_not_candidates() {
        let mut closed = open_put(1, "NVDA", 12);
        closed.exit_reason = Some("expired".to_string());
        let lot = stock_lot("NVDA", dec!(100));

        let events = AssignmentResolver::detect(&[&lot], &HashSet::new(), &[closed], now());
        assert!(events.is_empty());
    }
}
