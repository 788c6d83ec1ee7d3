//! Immutable record of one committed match.
//!
//! Grounds on `original_source/energy_match/models/match_result.py` for the
//! convenience-accessor surface (`quantity_difference`, `price_difference`,
//! `quality_band`), re-typed against the full 13-variant rule set `ice_match`
//! requires.

use crate::ids::MatchId;
use crate::trade::Trade;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum MatchType {
    Exact,
    Spread,
    Crack,
    ComplexCrack,
    ProductSpread,
    Fly,
    Aggregation,
    AggregatedSpread,
    AggregatedCrack,
    AggregatedComplexCrack,
    AggregatedProductSpread,
    MultilegSpread,
    ComplexCrackRoll,
}

impl MatchType {
    pub fn rule_number(&self) -> u8 {
        match self {
            MatchType::Exact => 1,
            MatchType::Spread => 2,
            MatchType::Crack => 3,
            MatchType::ComplexCrack => 4,
            MatchType::ProductSpread => 5,
            MatchType::Fly => 6,
            MatchType::Aggregation => 7,
            MatchType::AggregatedComplexCrack => 8,
            MatchType::AggregatedSpread => 9,
            MatchType::MultilegSpread => 10,
            MatchType::AggregatedCrack => 11,
            MatchType::ComplexCrackRoll => 12,
            MatchType::AggregatedProductSpread => 13,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum MatchStatus {
    Matched,
    GroupMatched,
}

/// Coarse shape of a match, surfaced on the reconciliation report per spec §6.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum AggregationType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// Immutable record of one committed match: the display ("primary") trade on
/// each side plus any additional legs, the rule that produced it, and the
/// fixed confidence associated with that rule.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub rule_number: u8,
    pub match_type: MatchType,
    pub confidence: u8,
    pub trader_primary: Trade,
    pub exchange_primary: Trade,
    pub trader_additional: Vec<Trade>,
    pub exchange_additional: Vec<Trade>,
    pub matched_fields: Vec<String>,
    pub tolerances_applied: IndexMap<String, Decimal>,
    pub status: MatchStatus,
}

impl MatchResult {
    pub fn all_trader_trades(&self) -> impl Iterator<Item = &Trade> {
        std::iter::once(&self.trader_primary).chain(self.trader_additional.iter())
    }

    pub fn all_exchange_trades(&self) -> impl Iterator<Item = &Trade> {
        std::iter::once(&self.exchange_primary).chain(self.exchange_additional.iter())
    }

    pub fn trader_leg_count(&self) -> usize {
        1 + self.trader_additional.len()
    }

    pub fn exchange_leg_count(&self) -> usize {
        1 + self.exchange_additional.len()
    }

    pub fn aggregation_type(&self) -> AggregationType {
        match (self.trader_leg_count(), self.exchange_leg_count()) {
            (1, 1) => AggregationType::OneToOne,
            (1, _) => AggregationType::OneToMany,
            (_, 1) => AggregationType::ManyToOne,
            _ => AggregationType::ManyToMany,
        }
    }

    /// Sum of trader-side MT quantity minus sum of exchange-side MT quantity.
    pub fn quantity_difference(&self) -> Decimal {
        let trader: Decimal = self.all_trader_trades().map(|t| t.quantity_mt()).sum();
        let exchange: Decimal = self.all_exchange_trades().map(|t| t.quantity_mt()).sum();
        trader - exchange
    }

    pub fn price_difference(&self) -> Decimal {
        self.trader_primary.price - self.exchange_primary.price
    }

    /// Human-readable confidence band, retained from
    /// `energy_match/models/match_result.py::MatchResult.match_quality` as a
    /// pure display helper; it does not feed back into matching semantics.
    pub fn quality_band(&self) -> &'static str {
        match self.confidence {
            90..=100 => "Excellent",
            80..=89 => "Very Good",
            70..=79 => "Good",
            60..=69 => "Fair",
            _ => "Poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TradeId;
    use crate::month::ContractMonth;
    use crate::trade::{BuySell, Side, TradeInput, Unit};

    fn trade(id: &str, source: Side, qty: Decimal) -> Trade {
        Trade::new(
            TradeInput {
                id: TradeId::from(id),
                source,
                product: "FE".into(),
                contract_month: ContractMonth::parse("Oct-25").unwrap(),
                quantity: qty,
                unit: Unit::Mt,
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
            },
            Decimal::new(7, 0),
        )
        .unwrap()
    }

    #[test]
    fn one_to_one_aggregation_type() {
        let m = MatchResult {
            match_id: MatchId::from("m1"),
            rule_number: 1,
            match_type: MatchType::Exact,
            confidence: 100,
            trader_primary: trade("t1", Side::Trader, Decimal::new(1000, 0)),
            exchange_primary: trade("e1", Side::Exchange, Decimal::new(1000, 0)),
            trader_additional: vec![],
            exchange_additional: vec![],
            matched_fields: vec![],
            tolerances_applied: IndexMap::new(),
            status: MatchStatus::Matched,
        };
        assert_eq!(m.aggregation_type(), AggregationType::OneToOne);
        assert_eq!(m.quantity_difference(), Decimal::ZERO);
        assert_eq!(m.quality_band(), "Excellent");
    }
}
