//! Field-level drift resolution for matched order pairs.
//!
//! The broker is authoritative. Every correction is conditional on "local
//! already differs", so re-running a pass after a partial failure applies
//! nothing twice.

use chrono::{DateTime, Utc};
use put_desk_core::contract::OrderStatus;
use put_desk_data::models::{LocalOrderRecord, OrderChanges};
use put_desk_data::store::LocalTradeStore;
use put_desk_ib::types::BrokerOrderView;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{error, warn};

use crate::aggregate::BrokerSnapshot;
use crate::error::ReconcileError;
use crate::types::{Discrepancy, DiscrepancyKind};

/// Diffs a matched pair and writes corrections back to the ledger.
pub struct DiscrepancyResolver {
    price_tolerance: Decimal,
}

impl DiscrepancyResolver {
    #[must_use]
    pub fn new(price_tolerance: Decimal) -> Self {
        Self { price_tolerance }
    }

    /// Resolves one matched pair, persisting any correction immediately.
    ///
    /// A persistence failure is logged per record and reported as an
    /// unresolved discrepancy; it never blocks the remaining pairs.
    pub async fn resolve(
        &self,
        local: &mut LocalOrderRecord,
        view: &BrokerOrderView,
        snapshot: &BrokerSnapshot,
        store: &dyn LocalTradeStore,
        now: DateTime<Utc>,
    ) -> Option<Discrepancy> {
        let (changes, discrepancy) = self.diff(local, view, snapshot, now);
        if changes.is_empty() {
            return None;
        }

        match store.update(local.id, &changes).await {
            Ok(()) => {
                changes.apply_to(local);
                discrepancy.map(|mut d| {
                    d.resolved = true;
                    d
                })
            }
            Err(e) => {
                let err = ReconcileError::persistence(local.id, e.to_string());
                error!(
                    error = %err,
                    "Failed to persist reconciliation changes; will retry next pass"
                );
                discrepancy
            }
        }
    }

    /// Computes the change set and headline discrepancy for a pair without
    /// touching the store.
    #[must_use]
    pub fn diff(
        &self,
        local: &LocalOrderRecord,
        view: &BrokerOrderView,
        snapshot: &BrokerSnapshot,
        now: DateTime<Utc>,
    ) -> (OrderChanges, Option<Discrepancy>) {
        let mut changes = OrderChanges::default();
        let mut discrepancy: Option<Discrepancy> = None;

        // Silent id backfill: ties the record to its cross-session anchor.
        if local.broker_order_id.unwrap_or(0) <= 0 && view.order_id > 0 {
            changes.broker_order_id = Some(view.order_id);
        }
        if local.broker_perm_id.unwrap_or(0) <= 0 && view.perm_id > 0 {
            changes.broker_perm_id = Some(view.perm_id);
        }

        let executions = snapshot.executions_for(view.order_id, view.perm_id);
        let broker_price = view
            .avg_fill_price
            .or_else(|| BrokerSnapshot::weighted_avg_price(&executions));
        let commission = snapshot.commission_total(&executions);

        if local.is_pending() {
            if view.status.is_filled() {
                changes.status = Some(OrderStatus::Filled.as_str().to_string());
                // Order-status price, else execution average, else the
                // original limit price as a last resort.
                changes.fill_price = Some(broker_price.unwrap_or(local.limit_price));
                changes.filled_contracts = Some(
                    view.filled
                        .to_i32()
                        .filter(|n| *n > 0)
                        .unwrap_or(local.contracts),
                );
                changes.fill_time =
                    Some(BrokerSnapshot::latest_exec_time(&executions).unwrap_or(now));
                if let Some(total) = commission.filter(|c| !c.is_zero()) {
                    changes.commission = Some(total);
                }
                discrepancy = Some(Discrepancy::new(
                    local.id,
                    DiscrepancyKind::StatusMismatch,
                    local.status.clone(),
                    OrderStatus::Filled.as_str().to_string(),
                ));
            } else if view.status.is_cancelled() {
                changes.status = Some(OrderStatus::Cancelled.as_str().to_string());
                discrepancy = Some(Discrepancy::new(
                    local.id,
                    DiscrepancyKind::StatusMismatch,
                    local.status.clone(),
                    OrderStatus::Cancelled.as_str().to_string(),
                ));
            }
        } else if view.status.is_cancelled() && local.status == OrderStatus::Filled.as_str() {
            // Conflicting terminal states; surfaced for operators, never
            // rewritten automatically.
            warn!(
                order_id = local.id,
                local_status = local.status,
                broker_status = %view.status,
                "Terminal status conflict between ledger and broker"
            );
        }

        // The original fill report can be stale, so the price check fires
        // even for records already marked filled.
        if changes.status.is_none() {
            if let (Some(local_price), Some(price)) = (local.fill_price, broker_price) {
                if (price - local_price).abs() > self.price_tolerance {
                    changes.fill_price = Some(price);
                    if discrepancy.is_none() {
                        discrepancy = Some(Discrepancy::new(
                            local.id,
                            DiscrepancyKind::FillPriceMismatch,
                            local_price.to_string(),
                            price.to_string(),
                        ));
                    }
                }
            }
        }

        // Commission backfill: whenever locally absent/zero and the broker
        // has a real (nonzero, non-sentinel) figure.
        if changes.commission.is_none() && local.commission.unwrap_or(Decimal::ZERO).is_zero() {
            if let Some(total) = commission.filter(|c| !c.is_zero()) {
                changes.commission = Some(total);
                if discrepancy.is_none() {
                    discrepancy = Some(Discrepancy::new(
                        local.id,
                        DiscrepancyKind::CommissionMissing,
                        local
                            .commission
                            .map_or_else(|| "none".to_string(), |c| c.to_string()),
                        total.to_string(),
                    ));
                }
            }
        }

        if !changes.is_empty() {
            changes.reconciled_at = Some(now);
        }
        (changes, discrepancy)
    }
}
