//! Pass reports.
//!
//! Reports carry counts plus the identifiers behind them so operators can
//! triage unexplained discrepancies without digging through logs.

use serde::{Deserialize, Serialize};

use crate::types::{
    AssignmentEvent, Discrepancy, MissingOrder, OrphanOrder, PositionMismatch,
    PositionMismatchKind,
};

/// Outcome of the order track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Ledger records paired with a broker view.
    pub matched_count: usize,
    /// Field-level differences found.
    pub discrepancy_count: usize,
    /// Differences corrected and persisted this pass.
    pub resolved_count: usize,
    /// Expired options closed by the expiry closer.
    pub expired_closed_count: usize,
    /// Broker orders with no ledger counterpart (never auto-imported).
    pub orphans: Vec<OrphanOrder>,
    /// Ledger records nothing explains; for manual review.
    pub missing_in_broker: Vec<MissingOrder>,
    /// Every discrepancy found, resolved or not.
    pub discrepancies: Vec<Discrepancy>,
    /// Broker queries that failed or timed out this pass.
    pub degraded_sources: Vec<String>,
}

impl ReconciliationReport {
    /// True when nothing needs operator attention.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
            && self.missing_in_broker.is_empty()
            && self.discrepancy_count == self.resolved_count
    }
}

/// Outcome of the position track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionReconciliationReport {
    pub quantity_mismatches: Vec<PositionMismatch>,
    pub broker_only: Vec<PositionMismatch>,
    pub local_only: Vec<PositionMismatch>,
    pub assignments: Vec<AssignmentEvent>,
}

impl PositionReconciliationReport {
    /// Buckets raw mismatches by kind and attaches assignments.
    #[must_use]
    pub fn from_mismatches(
        mismatches: Vec<PositionMismatch>,
        assignments: Vec<AssignmentEvent>,
    ) -> Self {
        let mut report = Self {
            assignments,
            ..Self::default()
        };
        for mismatch in mismatches {
            match mismatch.kind {
                PositionMismatchKind::QuantityMismatch => {
                    report.quantity_mismatches.push(mismatch);
                }
                PositionMismatchKind::InBrokerNotLocal => report.broker_only.push(mismatch),
                PositionMismatchKind::InLocalNotBroker => report.local_only.push(mismatch),
            }
        }
        report
    }

    /// True when both sides agree and no assignments were detected.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.quantity_mismatches.is_empty()
            && self.broker_only.is_empty()
            && self.local_only.is_empty()
            && self.assignments.is_empty()
    }
}

/// Both reports from one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassOutcome {
    pub orders: ReconciliationReport,
    pub positions: PositionReconciliationReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use put_desk_core::contract::{ContractKey, OptionRight};
    use rust_decimal_macros::dec;

    fn mismatch(kind: PositionMismatchKind) -> PositionMismatch {
        PositionMismatch {
            key: ContractKey::new(
                "NVDA",
                dec!(140),
                NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
                OptionRight::Put,
            ),
            kind,
            local_quantity: dec!(1),
            broker_quantity: dec!(2),
        }
    }

    #[test]
    fn mismatches_bucket_by_kind() {
        let report = PositionReconciliationReport::from_mismatches(
            vec![
                mismatch(PositionMismatchKind::QuantityMismatch),
                mismatch(PositionMismatchKind::InBrokerNotLocal),
                mismatch(PositionMismatchKind::InLocalNotBroker),
            ],
            vec![],
        );
        assert_eq!(report.quantity_mismatches.len(), 1);
        assert_eq!(report.broker_only.len(), 1);
        assert_eq!(report.local_only.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn clean_reports() {
        assert!(ReconciliationReport::default().is_clean());
        assert!(PositionReconciliationReport::default().is_clean());

        let report = ReconciliationReport {
            matched_count: 3,
            discrepancy_count: 2,
            resolved_count: 1,
            ..ReconciliationReport::default()
        };
        assert!(!report.is_clean());
    }
}
