//! Option contract identity shared by the local ledger and the broker boundary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Contract multiplier for standard US equity options.
#[must_use]
pub fn standard_multiplier() -> Decimal {
    Decimal::ONE_HUNDRED
}

/// Options contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Canonical single-letter code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }

    /// Parses any spelling the broker or the ledger uses ("P", "PUT", "put", ...).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `(symbol, strike, expiry, right)` identity for an option contract.
///
/// Both the local ledger and every broker record map onto this key, so the
/// two sides can be compared regardless of how each source spells the
/// contract. Strike is normalized so `95.0` and `95.00` hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    pub symbol: String,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub right: OptionRight,
}

impl ContractKey {
    #[must_use]
    pub fn new(symbol: &str, strike: Decimal, expiry: NaiveDate, right: OptionRight) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            strike: strike.normalize(),
            expiry,
            right,
        }
    }

    /// Human-readable key (e.g., "NVDA 140P 2026-03-20").
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}{} {}", self.symbol, self.strike, self.right, self.expiry)
    }
}

impl std::fmt::Display for ContractKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Lifecycle status of a locally recorded order.
///
/// `Submitted` is the only non-terminal state; reconciliation moves it to
/// `Filled` or `Cancelled`, and the expiry closer moves filled short options
/// to `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Submitted,
    Filled,
    Cancelled,
    Expired,
}

impl OrderStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "filled" => Some(Self::Filled),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()
    }

    #[test]
    fn right_parses_broker_spellings() {
        assert_eq!(OptionRight::parse("P"), Some(OptionRight::Put));
        assert_eq!(OptionRight::parse("PUT"), Some(OptionRight::Put));
        assert_eq!(OptionRight::parse("put"), Some(OptionRight::Put));
        assert_eq!(OptionRight::parse("C"), Some(OptionRight::Call));
        assert_eq!(OptionRight::parse("call"), Some(OptionRight::Call));
        assert_eq!(OptionRight::parse("x"), None);
    }

    #[test]
    fn key_normalizes_strike_and_symbol() {
        let a = ContractKey::new("nvda", dec!(140.00), expiry(), OptionRight::Put);
        let b = ContractKey::new("NVDA", dec!(140), expiry(), OptionRight::Put);
        assert_eq!(a, b);

        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn key_distinguishes_right_and_expiry() {
        let put = ContractKey::new("NVDA", dec!(140), expiry(), OptionRight::Put);
        let call = ContractKey::new("NVDA", dec!(140), expiry(), OptionRight::Call);
        assert_ne!(put, call);

        let later = ContractKey::new(
            "NVDA",
            dec!(140),
            NaiveDate::from_ymd_opt(2026, 4, 17).unwrap(),
            OptionRight::Put,
        );
        assert_ne!(put, later);
    }

    #[test]
    fn key_display_name() {
        let key = ContractKey::new("NVDA", dec!(140), expiry(), OptionRight::Put);
        assert_eq!(key.display_name(), "NVDA 140P 2026-03-20");
    }

    #[test]
    fn status_round_trips() {
        for status in [
            OrderStatus::Submitted,
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);
    }

    #[test]
    fn only_submitted_is_non_terminal() {
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }
}
