//! Aggregate position comparison between the ledger and the broker.
//!
//! Quantities compare as absolute values: the broker signs short options
//! negative while the ledger counts contracts sold as positive.

use std::collections::HashMap;

use put_desk_core::contract::ContractKey;
use put_desk_data::models::LocalOrderRecord;
use put_desk_ib::types::BrokerPosition;
use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{PositionMismatch, PositionMismatchKind};

/// Compares broker option quantities against local open positions.
pub struct PositionReconciler;

impl PositionReconciler {
    /// Diffs the two sides, keyed by contract.
    ///
    /// Local-only entries are whatever the expiry closer could not already
    /// explain away: callers pass the open set as it stands after the
    /// order track has run.
    #[must_use]
    pub fn reconcile(
        local_open: &[LocalOrderRecord],
        broker_positions: &[&BrokerPosition],
    ) -> Vec<PositionMismatch> {
        let mut local: HashMap<ContractKey, Decimal> = HashMap::new();
        for record in local_open {
            if let Some(key) = record.contract_key() {
                *local.entry(key).or_default() += Decimal::from(record.contracts).abs();
            }
        }

        let mut broker: HashMap<ContractKey, Decimal> = HashMap::new();
        for position in broker_positions {
            if let Some(key) = position.contract_key() {
                *broker.entry(key).or_default() += position.quantity.abs();
            }
        }

        let mut mismatches = Vec::new();

        for (key, local_quantity) in &local {
            match broker.get(key) {
                Some(broker_quantity) if broker_quantity != local_quantity => {
                    mismatches.push(PositionMismatch {
                        key: key.clone(),
                        kind: PositionMismatchKind::QuantityMismatch,
                        local_quantity: *local_quantity,
                        broker_quantity: *broker_quantity,
                    });
                }
                Some(_) => debug!(key = %key, "Position quantities agree"),
                None => mismatches.push(PositionMismatch {
                    key: key.clone(),
                    kind: PositionMismatchKind::InLocalNotBroker,
                    local_quantity: *local_quantity,
                    broker_quantity: Decimal::ZERO,
                }),
            }
        }

        for (key, broker_quantity) in &broker {
            if !local.contains_key(key) {
                mismatches.push(PositionMismatch {
                    key: key.clone(),
                    kind: PositionMismatchKind::InBrokerNotLocal,
                    local_quantity: Decimal::ZERO,
                    broker_quantity: *broker_quantity,
                });
            }
        }

        mismatches
    }
}
