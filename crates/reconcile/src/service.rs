//! Runs one reconciliation pass end to end.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use put_desk_core::config::ReconcileConfig;
use put_desk_data::store::LocalTradeStore;
use put_desk_ib::gateway::BrokerGateway;
use tokio::sync::Mutex;
use tracing::info;

use crate::aggregate::BrokerStateAggregator;
use crate::assignment::AssignmentResolver;
use crate::error::{ReconcileError, Result};
use crate::expiry::ExpiryCloser;
use crate::matcher::match_orders;
use crate::positions::PositionReconciler;
use crate::report::{PassOutcome, PositionReconciliationReport, ReconciliationReport};
use crate::resolver::DiscrepancyResolver;
use crate::types::OrphanOrder;

/// Reconciles the local ledger against broker state.
///
/// Passes are single-flight: a pass requested while one is running fails
/// fast with [`ReconcileError::PassInProgress`] rather than queueing.
/// Every correction is idempotent, so overlapping schedules and retried
/// passes are safe by construction.
pub struct Reconciler {
    gateway: Arc<dyn BrokerGateway>,
    store: Arc<dyn LocalTradeStore>,
    config: ReconcileConfig,
    /// Symbols with a local stock trade on record; suppresses assignment
    /// detection for organic purchases.
    known_stock_symbols: HashSet<String>,
    pass_guard: Mutex<()>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn BrokerGateway>,
        store: Arc<dyn LocalTradeStore>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            config,
            known_stock_symbols: HashSet::new(),
            pass_guard: Mutex::new(()),
        }
    }

    /// Registers symbols whose stock lots are organic purchases.
    #[must_use]
    pub fn with_known_stock_symbols(mut self, symbols: HashSet<String>) -> Self {
        self.known_stock_symbols = symbols;
        self
    }

    /// Runs one pass against the current wall clock.
    ///
    /// # Errors
    ///
    /// Fails fast when a pass is already running, when the gateway reports
    /// disconnected, or when the ledger itself cannot be read. Individual
    /// broker query failures degrade the pass instead of failing it.
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        self.run_pass_at(Utc::now()).await
    }

    /// Runs one pass with an explicit clock.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<PassOutcome> {
        let _guard = self
            .pass_guard
            .try_lock()
            .map_err(|_| ReconcileError::PassInProgress)?;

        if !self.gateway.is_connected() {
            return Err(ReconcileError::connection(
                "broker gateway reports disconnected",
            ));
        }

        info!(
            window_days = self.config.window_days,
            "Reconciliation pass started"
        );

        let aggregator =
            BrokerStateAggregator::new(Duration::from_secs(self.config.query_timeout_secs));
        let snapshot = aggregator.collect(self.gateway.as_ref()).await;

        let since = (now - chrono::Duration::days(self.config.window_days)).date_naive();
        let locals = self
            .store
            .trades_in_window(since)
            .await
            .map_err(|e| ReconcileError::Store(e.to_string()))?;

        let outcome = match_orders(locals, snapshot.orders.clone());
        let matched_count = outcome.pairs.len();
        let orphans: Vec<OrphanOrder> = outcome
            .orphans
            .iter()
            .map(|view| OrphanOrder {
                order_id: view.order_id,
                perm_id: view.perm_id,
                key: view.contract_key(),
                status: view.status.as_str().to_string(),
            })
            .collect();

        let resolver = DiscrepancyResolver::new(self.config.price_tolerance);
        let mut discrepancies = Vec::new();
        let mut resolved_count = 0;
        for mut pair in outcome.pairs {
            if let Some(discrepancy) = resolver
                .resolve(&mut pair.local, &pair.view, &snapshot, self.store.as_ref(), now)
                .await
            {
                if discrepancy.resolved {
                    resolved_count += 1;
                }
                discrepancies.push(discrepancy);
            }
        }

        let live_keys = snapshot.live_option_keys();
        let closer = ExpiryCloser::new(&self.config);
        let (expired_closed_count, missing_in_broker) = closer
            .process(outcome.missing, &live_keys, self.store.as_ref(), now)
            .await;

        // The order track may have just closed positions; re-read the open
        // set so the position track sees the corrected ledger.
        let open = self
            .store
            .open_positions()
            .await
            .map_err(|e| ReconcileError::Store(e.to_string()))?;
        let mismatches = PositionReconciler::reconcile(&open, &snapshot.option_positions());
        let assignments = AssignmentResolver::detect(
            &snapshot.stock_positions(),
            &self.known_stock_symbols,
            &open,
            now,
        );

        let orders = ReconciliationReport {
            matched_count,
            discrepancy_count: discrepancies.len(),
            resolved_count,
            expired_closed_count,
            orphans,
            missing_in_broker,
            discrepancies,
            degraded_sources: snapshot.degraded_sources.clone(),
        };
        let positions = PositionReconciliationReport::from_mismatches(mismatches, assignments);

        info!(
            matched = orders.matched_count,
            discrepancies = orders.discrepancy_count,
            resolved = orders.resolved_count,
            expired_closed = orders.expired_closed_count,
            orphans = orders.orphans.len(),
            missing = orders.missing_in_broker.len(),
            position_mismatches = positions.quantity_mismatches.len()
                + positions.broker_only.len()
                + positions.local_only.len(),
            assignments = positions.assignments.len(),
            degraded = orders.degraded_sources.len(),
            "Reconciliation pass finished"
        );

        Ok(PassOutcome { orders, positions })
    }
}
