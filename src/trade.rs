//! Normalised trade record and the handful of small enums that describe it.
//!
//! Construction is fallible: the invariants from spec §3 (quantity > 0,
//! `strike` implies `put_call`) are enforced at the boundary so every `Trade`
//! downstream of `Trade::new` can be trusted without re-checking.

use crate::ids::TradeId;
use crate::month::ContractMonth;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Side {
    Trader,
    Exchange,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum BuySell {
    Buy,
    Sell,
}

impl BuySell {
    pub fn opposite(self) -> BuySell {
        match self {
            BuySell::Buy => BuySell::Sell,
            BuySell::Sell => BuySell::Buy,
        }
    }
}

impl fmt::Display for BuySell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuySell::Buy => write!(f, "B"),
            BuySell::Sell => write!(f, "S"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Unit {
    Mt,
    Bbl,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum PutCall {
    Put,
    Call,
}

/// A universal matching field, per spec §3/§9 — a value that must be equal
/// across every leg of any match produced by any rule.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum UniversalField {
    BrokerGroupId,
    ExchClearingAcctId,
    ExchangeGroupId,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TradeError {
    #[error("quantity must be strictly positive, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("strike {strike} set without put_call")]
    StrikeWithoutPutCall { strike: Decimal },
}

/// Everything the (out-of-scope) ingestion layer hands the engine for a
/// single row, prior to derived-field computation. Mirrors the field set
/// `ice_match/core/trade_factory.py` assembles before constructing a `Trade`.
#[derive(Debug, Clone)]
pub struct TradeInput {
    pub id: TradeId,
    pub source: Side,
    pub product: SmolStr,
    pub contract_month: ContractMonth,
    pub quantity: Decimal,
    pub unit: Unit,
    pub price: Decimal,
    pub buy_sell: BuySell,
    pub broker_group_id: Option<i64>,
    pub exch_clearing_acct_id: Option<i64>,
    pub exchange_group_id: Option<i64>,
    pub strike: Option<Decimal>,
    pub put_call: Option<PutCall>,
    pub spread_flag: Option<SmolStr>,
    pub deal_id: Option<SmolStr>,
    pub trade_native_id: Option<SmolStr>,
    pub trade_datetime: Option<SmolStr>,
}

/// Immutable normalised trade, always constructed via [`Trade::new`].
///
/// `product` is stored lower-cased: spec §3 requires case-insensitive
/// product comparison, and the ingestion layer is not trusted to have
/// normalised case (only the lexicon/spelling, which is out of scope here).
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: TradeId,
    pub source: Side,
    product: SmolStr,
    pub contract_month: ContractMonth,
    pub quantity: Decimal,
    pub unit: Unit,
    pub price: Decimal,
    pub buy_sell: BuySell,
    pub broker_group_id: Option<i64>,
    pub exch_clearing_acct_id: Option<i64>,
    pub exchange_group_id: Option<i64>,
    pub strike: Option<Decimal>,
    pub put_call: Option<PutCall>,
    pub spread_flag: Option<SmolStr>,
    pub deal_id: Option<SmolStr>,
    pub trade_native_id: Option<SmolStr>,
    pub trade_datetime: Option<SmolStr>,
    quantity_mt: Decimal,
    quantity_bbl: Decimal,
}

impl Trade {
    /// Builds a `Trade`, eagerly deriving `quantity_mt`/`quantity_bbl` via
    /// `ratio`. `ratio` is the per-product MT↔BBL conversion ratio the
    /// caller (normally [`crate::config::Config::ratio_for`]) resolves.
    pub fn new(input: TradeInput, ratio: Decimal) -> Result<Self, TradeError> {
        if input.quantity <= Decimal::ZERO {
            return Err(TradeError::NonPositiveQuantity(input.quantity));
        }
        if input.strike.is_some() && input.put_call.is_none() {
            return Err(TradeError::StrikeWithoutPutCall {
                strike: input.strike.unwrap(),
            });
        }

        let (quantity_mt, quantity_bbl) = match input.unit {
            Unit::Mt => (input.quantity, input.quantity * ratio),
            Unit::Bbl => (input.quantity / ratio, input.quantity),
        };

        Ok(Trade {
            id: input.id,
            source: input.source,
            product: SmolStr::new(input.product.to_lowercase()),
            contract_month: input.contract_month,
            quantity: input.quantity,
            unit: input.unit,
            price: input.price,
            buy_sell: input.buy_sell,
            broker_group_id: input.broker_group_id,
            exch_clearing_acct_id: input.exch_clearing_acct_id,
            exchange_group_id: input.exchange_group_id,
            strike: input.strike,
            put_call: input.put_call,
            spread_flag: input.spread_flag,
            deal_id: input.deal_id,
            trade_native_id: input.trade_native_id,
            trade_datetime: input.trade_datetime,
            quantity_mt,
            quantity_bbl,
        })
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn quantity_mt(&self) -> Decimal {
        self.quantity_mt
    }

    pub fn quantity_bbl(&self) -> Decimal {
        self.quantity_bbl
    }

    pub fn is_option(&self) -> bool {
        self.strike.is_some()
    }

    /// Whether `self` and `other` have compatible option terms: either
    /// neither is an option, or both are options with an identical
    /// `(strike, put_call)` pair. Enforced on every multi-trade rule (spec §4.4).
    pub fn option_compatible(&self, other: &Trade) -> bool {
        match (self.strike, other.strike) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b && self.put_call == other.put_call,
            _ => false,
        }
    }

    pub fn universal_field(&self, field: UniversalField) -> Option<i64> {
        match field {
            UniversalField::BrokerGroupId => self.broker_group_id,
            UniversalField::ExchClearingAcctId => self.exch_clearing_acct_id,
            UniversalField::ExchangeGroupId => self.exchange_group_id,
        }
    }

    /// Whether `self` contains the token `"crack"` in its product name —
    /// used by rules 3/4/8/11/12 to filter candidate pools.
    pub fn is_crack(&self) -> bool {
        self.product.contains("crack")
    }

    /// For a crack product like `"380cst crack"`, returns `"380cst"`.
    /// Grounded on `ice_match/utils/trade_helpers.py::extract_base_product`.
    pub fn base_product(&self) -> Option<&str> {
        self.product
            .strip_suffix(" crack")
            .or_else(|| self.product.strip_suffix("crack"))
            .map(|s| s.trim_end())
            .filter(|s| !s.is_empty())
    }

    /// Parses a hyphenated product spread name (`"X-Y"`) into its two legs.
    pub fn split_hyphenated(product: &str) -> Option<(&str, &str)> {
        product.split_once('-')
    }

    /// Builds a virtual representative leg standing in for an aggregated
    /// bucket of same-side trades (rule 9's per-month exchange aggregation):
    /// same identity/price/B-S as `self`, but with the bucket's summed MT
    /// quantity and the BBL quantity re-derived from `ratio`.
    pub(crate) fn with_aggregated_mt_quantity(&self, quantity_mt: Decimal, ratio: Decimal) -> Trade {
        let mut clone = self.clone();
        clone.quantity = quantity_mt;
        clone.quantity_mt = quantity_mt;
        clone.quantity_bbl = quantity_mt * ratio;
        clone
    }
}

/// Universal-field equality across two trades, per spec §4.4: enforced by
/// every rule without exception.
pub fn universal_fields_match(a: &Trade, b: &Trade, fields: &[UniversalField]) -> bool {
    fields
        .iter()
        .all(|&field| a.universal_field(field) == b.universal_field(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(qty: Decimal, unit: Unit) -> TradeInput {
        TradeInput {
            id: TradeId::from("t1"),
            source: Side::Trader,
            product: "FE".into(),
            contract_month: ContractMonth::parse("Oct-25").unwrap(),
            quantity: qty,
            unit,
            price: Decimal::new(10165, 2),
            buy_sell: BuySell::Buy,
            broker_group_id: Some(1),
            exch_clearing_acct_id: Some(1),
            exchange_group_id: None,
            strike: None,
            put_call: None,
            spread_flag: None,
            deal_id: None,
            trade_native_id: None,
            trade_datetime: None,
        }
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let err = Trade::new(input(Decimal::ZERO, Unit::Mt), Decimal::new(7, 0)).unwrap_err();
        assert!(matches!(err, TradeError::NonPositiveQuantity(_)));
    }

    #[test]
    fn rejects_strike_without_put_call() {
        let mut i = input(Decimal::ONE, Unit::Mt);
        i.strike = Some(Decimal::new(100, 0));
        let err = Trade::new(i, Decimal::new(7, 0)).unwrap_err();
        assert!(matches!(err, TradeError::StrikeWithoutPutCall { .. }));
    }

    #[test]
    fn derives_mt_and_bbl_from_mt_native() {
        let t = Trade::new(input(Decimal::new(1000, 0), Unit::Mt), Decimal::new(7, 0)).unwrap();
        assert_eq!(t.quantity_mt(), Decimal::new(1000, 0));
        assert_eq!(t.quantity_bbl(), Decimal::new(7000, 0));
    }

    #[test]
    fn derives_mt_and_bbl_from_bbl_native() {
        let t = Trade::new(input(Decimal::new(7000, 0), Unit::Bbl), Decimal::new(7, 0)).unwrap();
        assert_eq!(t.quantity_mt(), Decimal::new(1000, 0));
        assert_eq!(t.quantity_bbl(), Decimal::new(7000, 0));
    }

    #[test]
    fn base_product_strips_crack_suffix() {
        let mut i = input(Decimal::ONE, Unit::Mt);
        i.product = "380cst crack".into();
        let t = Trade::new(i, Decimal::new(7, 0)).unwrap();
        assert_eq!(t.base_product(), Some("380cst"));
    }

    #[test]
    fn product_is_lowercased() {
        let mut i = input(Decimal::ONE, Unit::Mt);
        i.product = "Marine 0.5%-380CST".into();
        let t = Trade::new(i, Decimal::new(7, 0)).unwrap();
        assert_eq!(t.product(), "marine 0.5%-380cst");
    }
}
