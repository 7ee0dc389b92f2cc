//! Broker state aggregation.
//!
//! Merges the broker's overlapping order queries into one deduplicated
//! snapshot and backfills fields the broker zeroes out. Broker order ids
//! are only stable within a connection session; the permanent id is the
//! sole cross-session anchor, so dedup and enrichment both key on it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use put_desk_core::contract::ContractKey;
use put_desk_ib::gateway::BrokerGateway;
use put_desk_ib::types::{BrokerExecution, BrokerFill, BrokerOrderView, BrokerPosition};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::ReconcileError;

/// Everything the rest of the pass needs from the broker, fetched once.
///
/// Request-scoped: rebuilt from scratch each pass, never shared across
/// passes.
#[derive(Debug, Default)]
pub struct BrokerSnapshot {
    /// Deduplicated, enriched order views.
    pub orders: Vec<BrokerOrderView>,
    /// Execution reports indexed by permanent id.
    pub executions_by_perm: HashMap<i64, Vec<BrokerExecution>>,
    /// Execution reports indexed by (session-scoped) order id.
    pub executions_by_order: HashMap<i64, Vec<BrokerExecution>>,
    /// Commission per execution id, sentinel-free.
    pub commissions: HashMap<String, Decimal>,
    /// Current positions, options and stock.
    pub positions: Vec<BrokerPosition>,
    /// Names of queries that failed or timed out this pass.
    pub degraded_sources: Vec<String>,
}

impl BrokerSnapshot {
    /// Executions belonging to an order, unioned across both indexes and
    /// deduplicated by execution id.
    #[must_use]
    pub fn executions_for(&self, order_id: i64, perm_id: i64) -> Vec<&BrokerExecution> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut result = Vec::new();

        let by_order = (order_id > 0)
            .then(|| self.executions_by_order.get(&order_id))
            .flatten();
        let by_perm = (perm_id > 0)
            .then(|| self.executions_by_perm.get(&perm_id))
            .flatten();

        for exec in by_order.into_iter().chain(by_perm).flatten() {
            if seen.insert(exec.exec_id.as_str()) {
                result.push(exec);
            }
        }
        result
    }

    /// Share-weighted average price across executions.
    #[must_use]
    pub fn weighted_avg_price(executions: &[&BrokerExecution]) -> Option<Decimal> {
        let total_shares: Decimal = executions.iter().map(|e| e.shares).sum();
        if total_shares.is_zero() {
            return None;
        }
        let notional: Decimal = executions.iter().map(|e| e.price * e.shares).sum();
        Some(notional / total_shares)
    }

    /// Timestamp of the latest execution.
    #[must_use]
    pub fn latest_exec_time(executions: &[&BrokerExecution]) -> Option<DateTime<Utc>> {
        executions.iter().map(|e| e.time).max()
    }

    /// Total commission across executions. None when no execution has a
    /// usable commission report.
    #[must_use]
    pub fn commission_total(&self, executions: &[&BrokerExecution]) -> Option<Decimal> {
        let mut total = Decimal::ZERO;
        let mut found = false;
        for exec in executions {
            if let Some(c) = self.commissions.get(&exec.exec_id) {
                total += *c;
                found = true;
            }
        }
        found.then_some(total)
    }

    /// Contract keys of every live option position.
    #[must_use]
    pub fn live_option_keys(&self) -> HashSet<ContractKey> {
        self.positions
            .iter()
            .filter(|p| !p.quantity.is_zero())
            .filter_map(BrokerPosition::contract_key)
            .collect()
    }

    /// Option positions with a nonzero quantity.
    #[must_use]
    pub fn option_positions(&self) -> Vec<&BrokerPosition> {
        self.positions
            .iter()
            .filter(|p| p.is_option() && !p.quantity.is_zero())
            .collect()
    }

    /// Long stock positions.
    #[must_use]
    pub fn stock_positions(&self) -> Vec<&BrokerPosition> {
        self.positions
            .iter()
            .filter(|p| p.is_stock() && p.quantity > Decimal::ZERO)
            .collect()
    }
}

/// Merges broker query results into one [`BrokerSnapshot`].
pub struct BrokerStateAggregator {
    query_timeout: Duration,
}

impl BrokerStateAggregator {
    #[must_use]
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    /// Runs every broker query sequentially and assembles the snapshot.
    ///
    /// Each query is independent and best-effort: a failure or timeout
    /// logs once, records the source as degraded, and contributes nothing.
    pub async fn collect(&self, gateway: &dyn BrokerGateway) -> BrokerSnapshot {
        let mut degraded = Vec::new();

        let session = self
            .source("session_trades", gateway.list_session_trades(), &mut degraded)
            .await;
        let open = self
            .source("open_orders", gateway.list_open_trades(), &mut degraded)
            .await;
        let completed = self
            .source(
                "completed_orders",
                gateway.list_completed_orders(),
                &mut degraded,
            )
            .await;
        let executions = self
            .source("executions", gateway.list_executions(), &mut degraded)
            .await;
        let raw_executions = self
            .source(
                "raw_executions",
                gateway.list_raw_executions(),
                &mut degraded,
            )
            .await;
        let fills = self.source("fills", gateway.list_fills(), &mut degraded).await;
        let positions = self
            .source("positions", gateway.list_positions(), &mut degraded)
            .await;

        let mut snapshot = BrokerSnapshot {
            orders: dedup_by_perm_id(session, open, completed),
            positions,
            degraded_sources: degraded,
            ..BrokerSnapshot::default()
        };
        index_executions(&mut snapshot, executions, raw_executions);
        index_commissions(&mut snapshot, fills);
        enrich_orders(&mut snapshot);

        debug!(
            orders = snapshot.orders.len(),
            positions = snapshot.positions.len(),
            degraded = snapshot.degraded_sources.len(),
            "Broker snapshot assembled"
        );
        snapshot
    }

    /// Runs one query under the pass timeout; failures degrade, never abort.
    async fn source<T, F>(
        &self,
        name: &'static str,
        query: F,
        degraded: &mut Vec<String>,
    ) -> Vec<T>
    where
        F: Future<Output = Result<Vec<T>>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                let err = ReconcileError::source_unavailable(name, e.to_string());
                warn!(error = %err, "Broker query failed; degrading pass");
                degraded.push(name.to_string());
                Vec::new()
            }
            Err(_) => {
                let err = ReconcileError::source_unavailable(name, "query timed out");
                warn!(error = %err, "Broker query timed out; degrading pass");
                degraded.push(name.to_string());
                Vec::new()
            }
        }
    }
}

/// Union of the three order queries, first-seen record wins per perm id.
fn dedup_by_perm_id(
    session: Vec<BrokerOrderView>,
    open: Vec<BrokerOrderView>,
    completed: Vec<BrokerOrderView>,
) -> Vec<BrokerOrderView> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut orders = Vec::new();

    for view in session.into_iter().chain(open).chain(completed) {
        // A perm id of 0 means the broker never assigned one; keep those
        // rather than collapsing them into each other.
        if view.perm_id > 0 && !seen.insert(view.perm_id) {
            continue;
        }
        orders.push(view);
    }
    orders
}

fn index_executions(
    snapshot: &mut BrokerSnapshot,
    executions: Vec<BrokerExecution>,
    raw_executions: Vec<BrokerExecution>,
) {
    let mut seen: HashSet<String> = HashSet::new();
    for exec in executions.into_iter().chain(raw_executions) {
        if !seen.insert(exec.exec_id.clone()) {
            continue;
        }
        if exec.order_id > 0 {
            snapshot
                .executions_by_order
                .entry(exec.order_id)
                .or_default()
                .push(exec.clone());
        }
        if exec.perm_id > 0 {
            snapshot
                .executions_by_perm
                .entry(exec.perm_id)
                .or_default()
                .push(exec);
        }
    }
}

fn index_commissions(snapshot: &mut BrokerSnapshot, fills: Vec<BrokerFill>) {
    for fill in fills {
        if let Some(commission) = fill.commission {
            snapshot.commissions.insert(fill.exec_id, commission);
        }
    }
}

/// Backfills order ids and average fill prices from execution reports.
fn enrich_orders(snapshot: &mut BrokerSnapshot) {
    let mut updates: Vec<(usize, Option<i64>, Option<Decimal>)> = Vec::new();

    for (idx, view) in snapshot.orders.iter().enumerate() {
        if !view.needs_enrichment() {
            continue;
        }
        let executions = snapshot.executions_for(view.order_id, view.perm_id);
        if executions.is_empty() {
            continue;
        }

        let adopted_order_id = (!view.has_usable_order_id())
            .then(|| executions.iter().map(|e| e.order_id).find(|id| *id > 0))
            .flatten();
        let avg_price = view
            .avg_fill_price
            .is_none()
            .then(|| BrokerSnapshot::weighted_avg_price(&executions))
            .flatten();

        if adopted_order_id.is_some() || avg_price.is_some() {
            updates.push((idx, adopted_order_id, avg_price));
        }
    }

    for (idx, order_id, avg_price) in updates {
        let view = &mut snapshot.orders[idx];
        if let Some(id) = order_id {
            debug!(perm_id = view.perm_id, order_id = id, "Adopted execution order id");
            view.order_id = id;
        }
        if let Some(price) = avg_price {
            view.avg_fill_price = Some(price);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use put_desk_core::contract::OptionRight;
    use put_desk_ib::types::{BrokerOrderStatus, BrokerSource};
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()
    }

    fn view(order_id: i64, perm_id: i64, source: BrokerSource) -> BrokerOrderView {
        BrokerOrderView {
            order_id,
            perm_id,
            symbol: "NVDA".to_string(),
            strike: dec!(140),
            expiry: expiry(),
            right: OptionRight::Put,
            status: BrokerOrderStatus::Filled,
            avg_fill_price: None,
            filled: dec!(2),
            source,
        }
    }

    fn execution(exec_id: &str, order_id: i64, perm_id: i64, shares: Decimal, price: Decimal) -> BrokerExecution {
        BrokerExecution {
            exec_id: exec_id.to_string(),
            order_id,
            perm_id,
            symbol: "NVDA".to_string(),
            strike: dec!(140),
            expiry: expiry(),
            right: OptionRight::Put,
            shares,
            price,
            time: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
        }
    }

    #[test]
    fn dedup_prefers_first_seen_record() {
        let mut a = view(10, 500, BrokerSource::SessionTrades);
        a.avg_fill_price = Some(dec!(1.40));
        let b = view(0, 500, BrokerSource::CompletedOrders);
        let c = view(0, 501, BrokerSource::CompletedOrders);

        let orders = dedup_by_perm_id(vec![a], vec![], vec![b, c]);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, 10);
        assert_eq!(orders[0].avg_fill_price, Some(dec!(1.40)));
        assert_eq!(orders[1].perm_id, 501);
    }

    #[test]
    fn dedup_keeps_views_without_perm_id() {
        let a = view(10, 0, BrokerSource::SessionTrades);
        let b = view(11, 0, BrokerSource::OpenOrders);
        let orders = dedup_by_perm_id(vec![a], vec![b], vec![]);
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn enrichment_adopts_order_id_and_weighted_price() {
        let mut snapshot = BrokerSnapshot {
            orders: vec![view(0, 777, BrokerSource::CompletedOrders)],
            ..BrokerSnapshot::default()
        };
        index_executions(
            &mut snapshot,
            vec![
                execution("e1", 42, 777, dec!(150), dec!(1.00)),
                execution("e2", 42, 777, dec!(50), dec!(1.20)),
            ],
            vec![],
        );
        enrich_orders(&mut snapshot);

        let enriched = &snapshot.orders[0];
        assert_eq!(enriched.order_id, 42);
        // (1.00 * 150 + 1.20 * 50) / 200 = 1.05
        assert_eq!(enriched.avg_fill_price, Some(dec!(1.05)));
    }

    #[test]
    fn enrichment_leaves_unmatched_views_alone() {
        let mut snapshot = BrokerSnapshot {
            orders: vec![view(0, 777, BrokerSource::CompletedOrders)],
            ..BrokerSnapshot::default()
        };
        enrich_orders(&mut snapshot);
        assert_eq!(snapshot.orders[0].order_id, 0);
        assert_eq!(snapshot.orders[0].avg_fill_price, None);
    }

    #[test]
    fn executions_for_unions_without_duplicates() {
        let mut snapshot = BrokerSnapshot::default();
        index_executions(
            &mut snapshot,
            vec![execution("e1", 42, 777, dec!(100), dec!(1.00))],
            // Raw report repeats e1 and adds e2.
            vec![
                execution("e1", 42, 777, dec!(100), dec!(1.00)),
                execution("e2", 42, 777, dec!(100), dec!(1.10)),
            ],
        );

        let executions = snapshot.executions_for(42, 777);
        assert_eq!(executions.len(), 2);
        assert_eq!(
            BrokerSnapshot::weighted_avg_price(&executions),
            Some(dec!(1.05))
        );
    }

    #[test]
    fn commission_total_skips_missing_reports() {
        let mut snapshot = BrokerSnapshot::default();
        index_executions(
            &mut snapshot,
            vec![
                execution("e1", 42, 777, dec!(100), dec!(1.00)),
                execution("e2", 42, 777, dec!(100), dec!(1.10)),
            ],
            vec![],
        );
        index_commissions(
            &mut snapshot,
            vec![
                BrokerFill {
                    exec_id: "e1".to_string(),
                    commission: Some(dec!(0.65)),
                },
                // e2's commission arrived as the unset sentinel.
                BrokerFill {
                    exec_id: "e2".to_string(),
                    commission: None,
                },
            ],
        );

        let executions = snapshot.executions_for(42, 777);
        assert_eq!(snapshot.commission_total(&executions), Some(dec!(0.65)));

        let no_reports = BrokerSnapshot::default();
        assert_eq!(no_reports.commission_total(&executions), None);
    }

    #[test]
    fn weighted_avg_price_handles_zero_shares() {
        let exec = execution("e1", 42, 777, dec!(0), dec!(1.00));
        assert_eq!(BrokerSnapshot::weighted_avg_price(&[&exec]), None);
    }
}
