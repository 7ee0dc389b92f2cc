//! Pairs broker order views with local ledger records.
//!
//! Match priority: a nonzero broker order id known to the ledger, then
//! the broker permanent id, then contract key equality. Each side is
//! consumed at most once per pass.

use std::collections::HashMap;

use put_desk_core::contract::{ContractKey, OrderStatus};
use put_desk_data::models::LocalOrderRecord;
use put_desk_ib::types::BrokerOrderView;
use tracing::{debug, warn};

/// One ledger record paired with its broker view.
#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub local: LocalOrderRecord,
    pub view: BrokerOrderView,
}

/// Result of matching one pass's ledger window against the broker snapshot.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub pairs: Vec<MatchedPair>,
    /// Broker orders with no ledger counterpart.
    pub orphans: Vec<BrokerOrderView>,
    /// Ledger records the broker no longer reports. Records with a
    /// recorded exit or a terminal non-filled status never appear here;
    /// resolved records are not re-opened for reconciliation.
    pub missing: Vec<LocalOrderRecord>,
}

/// Matches ledger records against broker order views.
#[must_use]
pub fn match_orders(
    locals: Vec<LocalOrderRecord>,
    views: Vec<BrokerOrderView>,
) -> MatchOutcome {
    let mut by_broker_id: HashMap<i64, usize> = HashMap::new();
    let mut by_perm_id: HashMap<i64, usize> = HashMap::new();
    let mut by_key: HashMap<ContractKey, Vec<usize>> = HashMap::new();

    for (idx, local) in locals.iter().enumerate() {
        if let Some(id) = local.broker_order_id.filter(|id| *id > 0) {
            by_broker_id.insert(id, idx);
        }
        if let Some(id) = local.broker_perm_id.filter(|id| *id > 0) {
            by_perm_id.insert(id, idx);
        }
        match local.contract_key() {
            Some(key) => by_key.entry(key).or_default().push(idx),
            None => warn!(
                order_id = local.id,
                right = local.right,
                "Ledger record has an unreadable option right; key matching disabled for it"
            ),
        }
    }

    let exited: Vec<bool> = locals.iter().map(LocalOrderRecord::has_exit).collect();
    let mut taken = vec![false; locals.len()];
    let mut pairs_idx: Vec<(usize, BrokerOrderView)> = Vec::new();
    let mut orphans = Vec::new();

    for view in views {
        let idx = find_match(&view, &by_broker_id, &by_perm_id, &by_key, &taken, &exited);
        match idx {
            Some(idx) => {
                taken[idx] = true;
                pairs_idx.push((idx, view));
            }
            None => {
                debug!(
                    perm_id = view.perm_id,
                    key = %view.contract_key(),
                    "Broker order has no ledger counterpart"
                );
                orphans.push(view);
            }
        }
    }

    let mut pairs = Vec::with_capacity(pairs_idx.len());
    let mut missing = Vec::new();
    let mut locals: Vec<Option<LocalOrderRecord>> = locals.into_iter().map(Some).collect();

    for (idx, view) in pairs_idx {
        if let Some(local) = locals[idx].take() {
            pairs.push(MatchedPair { local, view });
        }
    }
    for local in locals.into_iter().flatten() {
        if considered_missing(&local) {
            missing.push(local);
        }
    }

    MatchOutcome {
        pairs,
        orphans,
        missing,
    }
}

fn find_match(
    view: &BrokerOrderView,
    by_broker_id: &HashMap<i64, usize>,
    by_perm_id: &HashMap<i64, usize>,
    by_key: &HashMap<ContractKey, Vec<usize>>,
    taken: &[bool],
    exited: &[bool],
) -> Option<usize> {
    if view.has_usable_order_id() {
        if let Some(&idx) = by_broker_id.get(&view.order_id) {
            if !taken[idx] {
                return Some(idx);
            }
        }
    }
    if view.perm_id > 0 {
        if let Some(&idx) = by_perm_id.get(&view.perm_id) {
            if !taken[idx] {
                return Some(idx);
            }
        }
    }
    // Still-open records get first claim on a shared key; an exited
    // record must not steal the view and push the open one into missing.
    let candidates = by_key.get(&view.contract_key())?;
    candidates
        .iter()
        .copied()
        .find(|&idx| !taken[idx] && !exited[idx])
        .or_else(|| candidates.iter().copied().find(|&idx| !taken[idx]))
}

/// Only records still awaiting broker confirmation count as missing:
/// anything with a recorded exit, or cancelled/expired outright, has
/// already been resolved.
fn considered_missing(local: &LocalOrderRecord) -> bool {
    if local.has_exit() {
        return false;
    }
    !matches!(
        local.parsed_status(),
        Some(OrderStatus::Cancelled | OrderStatus::Expired)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use put_desk_core::contract::OptionRight;
    use put_desk_ib::types::{BrokerOrderStatus, BrokerSource};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()
    }

    fn local(id: i64, symbol: &str, strike: Decimal) -> LocalOrderRecord {
        let mut record = LocalOrderRecord::new(
            symbol,
            strike,
            expiry(),
            OptionRight::Put,
            1,
            dec!(1.20),
            Utc.with_ymd_and_hms(2026, 2, 10, 15, 0, 0).unwrap(),
        );
        record.id = id;
        record
    }

    fn broker_view(order_id: i64, perm_id: i64, symbol: &str, strike: Decimal) -> BrokerOrderView {
        BrokerOrderView {
            order_id,
            perm_id,
            symbol: symbol.to_string(),
            strike,
            expiry: expiry(),
            right: OptionRight::Put,
            status: BrokerOrderStatus::Filled,
            avg_fill_price: Some(dec!(1.20)),
            filled: dec!(1),
            source: BrokerSource::SessionTrades,
        }
    }

    #[test]
    fn matches_by_broker_order_id_first() {
        let mut a = local(1, "NVDA", dec!(140));
        a.broker_order_id = Some(555);
        // Same contract, different record: key matching alone would be
        // ambiguous, so the id must win.
        let b = local(2, "NVDA", dec!(140));

        let outcome = match_orders(vec![a, b], vec![broker_view(555, 900, "NVDA", dec!(140))]);
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].local.id, 1);
        assert_eq!(outcome.missing.len(), 1);
        assert_eq!(outcome.missing[0].id, 2);
    }

    #[test]
    fn falls_back_to_contract_key_when_broker_id_is_zero() {
        let mut record = local(1, "NVDA", dec!(140));
        record.broker_order_id = Some(555);

        // Prior-session order: broker reports order id 0.
        let outcome = match_orders(vec![record], vec![broker_view(0, 900, "NVDA", dec!(140))]);
        assert_eq!(outcome.pairs.len(), 1);
        assert!(outcome.orphans.is_empty());
        assert!(outcome.missing.is_empty());
    }

    #[test]
    fn perm_id_beats_contract_key() {
        let a = local(1, "NVDA", dec!(140));
        let mut b = local(2, "NVDA", dec!(140));
        b.broker_perm_id = Some(900);

        let outcome = match_orders(vec![a, b], vec![broker_view(0, 900, "NVDA", dec!(140))]);
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].local.id, 2);
    }

    #[test]
    fn unmatched_view_is_orphan() {
        let outcome = match_orders(
            vec![local(1, "NVDA", dec!(140))],
            vec![
                broker_view(0, 900, "NVDA", dec!(140)),
                broker_view(0, 901, "AMD", dec!(95)),
            ],
        );
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.orphans.len(), 1);
        assert_eq!(outcome.orphans[0].symbol, "AMD");
    }

    #[test]
    fn each_view_consumes_at_most_one_record() {
        let a = local(1, "NVDA", dec!(140));
        let b = local(2, "NVDA", dec!(140));
        let outcome = match_orders(
            vec![a, b],
            vec![
                broker_view(0, 900, "NVDA", dec!(140)),
                broker_view(0, 901, "NVDA", dec!(140)),
            ],
        );
        assert_eq!(outcome.pairs.len(), 2);
        let matched: Vec<i64> = outcome.pairs.iter().map(|p| p.local.id).collect();
        assert!(matched.contains(&1) && matched.contains(&2));
    }

    #[test]
    fn open_records_win_key_fallback_over_exited() {
        // The exited record sits earlier in the window; the view must
        // still pair with the open one.
        let mut closed = local(1, "NVDA", dec!(140));
        closed.status = "expired".to_string();
        closed.exit_reason = Some("expired".to_string());
        let open = local(2, "NVDA", dec!(140));

        let outcome = match_orders(
            vec![closed, open],
            vec![broker_view(0, 900, "NVDA", dec!(140))],
        );
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].local.id, 2);
        assert!(outcome.missing.is_empty());
    }

    #[test]
    fn exited_records_never_go_missing() {
        let mut closed = local(1, "NVDA", dec!(140));
        closed.status = "expired".to_string();
        closed.exit_reason = Some("expired".to_string());

        let mut cancelled = local(2, "AMD", dec!(95));
        cancelled.status = "cancelled".to_string();

        let open = local(3, "TSM", dec!(180));

        let outcome = match_orders(vec![closed, cancelled, open], vec![]);
        assert_eq!(outcome.missing.len(), 1);
        assert_eq!(outcome.missing[0].id, 3);
    }
}
