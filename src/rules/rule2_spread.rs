//! Rule 2 — SPREAD (confidence ≈95). Grounds on
//! `original_source/ice_match/matchers/spread_matcher.py`: pairs a trader
//! calendar-spread (two rows, opposite B/S, different months) with two
//! exchange outright legs, with the exchange side grouped by three
//! sequential tiers (deal/trade-id, exact-datetime, product/quantity).
//!
//! The pair-finding routine in this module ([`find_spread_pairs`]) is the
//! reusable helper spec §9 calls out for rule 10 to share.

use super::Matcher;
use super::support::{is_spread_pair, order_by_month};
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::{Trade, UniversalField};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct SpreadMatcher;

/// A validated two-leg outright spread, ordered chronologically, plus the
/// tier it was found under (for `tracing`/telemetry only — spec §3's
/// `SupplementedFeatures` carries this for provenance, not for `MatchResult`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SpreadTier {
    DealId,
    ExactDatetime,
    ProductQuantity,
    TraderSide,
}

#[derive(Debug, Clone)]
pub struct SpreadPair {
    pub early: Trade,
    pub late: Trade,
    pub tier: SpreadTier,
}

impl SpreadPair {
    /// The non-zero leg's price, or zero if both legs are priced at zero.
    pub fn spread_price(&self) -> Decimal {
        if !self.early.price.is_zero() {
            self.early.price
        } else {
            self.late.price
        }
    }

    /// `earlier.price - later.price` — the differential formula spec §4.4
    /// uses for two real-priced exchange legs (as opposed to
    /// [`Self::spread_price`], which reads a trader row's single carried
    /// price and is meaningless called on an exchange pair).
    pub fn price_differential(&self) -> Decimal {
        self.early.price - self.late.price
    }

    fn month_set(&self) -> (crate::month::ContractMonth, crate::month::ContractMonth) {
        (self.early.contract_month, self.late.contract_month)
    }
}

/// Greedy, order-preserving pairing: walks `trades` once, and for each
/// not-yet-used trade looks forward for the first not-yet-used partner
/// satisfying `is_spread_pair` (product/quantity/month/B-S/universal) plus
/// `extra`. Shared by rule 2's trader grouping and all three exchange
/// tiers, and reused by rule 10 (spec §9).
pub fn find_spread_pairs(
    trades: &[Trade],
    universal: &[UniversalField],
    tier: SpreadTier,
    extra: impl Fn(&Trade, &Trade) -> bool,
) -> Vec<SpreadPair> {
    let mut used = HashSet::new();
    let mut pairs = Vec::new();
    for i in 0..trades.len() {
        if used.contains(&trades[i].id) {
            continue;
        }
        for j in (i + 1)..trades.len() {
            if used.contains(&trades[j].id) {
                continue;
            }
            if is_spread_pair(&trades[i], &trades[j], universal) && extra(&trades[i], &trades[j]) {
                let (early, late) = order_by_month(&trades[i], &trades[j]);
                used.insert(trades[i].id.clone());
                used.insert(trades[j].id.clone());
                pairs.push(SpreadPair {
                    early: early.clone(),
                    late: late.clone(),
                    tier,
                });
                break;
            }
        }
    }
    pairs
}

/// DealID data-quality gate (`DESIGN.md` Open Question 2), grounded on
/// `ice_match/matchers/spread_matcher.py::_is_dealid_data_usable`: tier-1
/// grouping is skipped entirely (not merely degraded) when fewer than 2
/// distinct non-empty deal ids exist, when they're all identical, or when
/// any deal id looks like CSV scientific-notation corruption.
fn dealid_data_usable(trades: &[Trade]) -> bool {
    let ids: Vec<&str> = trades.iter().filter_map(|t| t.deal_id.as_deref()).filter(|s| !s.is_empty()).collect();
    if ids.len() < 2 {
        return false;
    }
    let distinct: HashSet<&str> = ids.iter().copied().collect();
    if distinct.len() < 2 {
        return false;
    }
    if ids.iter().any(|s| s.contains("E+") || s.contains("E-") || s.contains("e+") || s.contains("e-")) {
        return false;
    }
    true
}

fn tier1_dealid_pairs(exchange: &[Trade], universal: &[UniversalField]) -> Vec<SpreadPair> {
    if !dealid_data_usable(exchange) {
        return Vec::new();
    }
    let mut groups: IndexMap<String, Vec<Trade>> = IndexMap::new();
    for trade in exchange {
        if let Some(deal_id) = trade.deal_id.as_deref().filter(|s| !s.is_empty()) {
            groups.entry(deal_id.to_string()).or_default().push(trade.clone());
        }
    }
    let mut pairs = Vec::new();
    for group in groups.values() {
        let has_distinct_native_ids = group
            .iter()
            .map(|t| t.trade_native_id.as_deref())
            .collect::<HashSet<_>>()
            .len()
            > 1;
        if group.len() >= 2 && has_distinct_native_ids {
            pairs.extend(find_spread_pairs(group, universal, SpreadTier::DealId, |_, _| true));
        }
    }
    pairs
}

fn tier2_datetime_pairs(exchange: &[Trade], universal: &[UniversalField], trader_pairs: &[SpreadPair]) -> Vec<SpreadPair> {
    let mut groups: IndexMap<String, Vec<Trade>> = IndexMap::new();
    for trade in exchange {
        if let Some(dt) = trade.trade_datetime.as_deref() {
            groups.entry(dt.to_string()).or_default().push(trade.clone());
        }
    }
    let mut pairs = Vec::new();
    for group in groups.values() {
        pairs.extend(find_spread_pairs(group, universal, SpreadTier::ExactDatetime, |a, b| {
            let (early, late) = order_by_month(a, b);
            trader_pairs
                .iter()
                .any(|tp| tp.month_set() == (early.contract_month, late.contract_month) && early.price - late.price == tp.spread_price())
        }));
    }
    pairs
}

fn tier3_product_quantity_pairs(exchange: &[Trade], universal: &[UniversalField]) -> Vec<SpreadPair> {
    let mut groups: IndexMap<(String, Decimal), Vec<Trade>> = IndexMap::new();
    for trade in exchange {
        groups.entry((trade.product().to_string(), trade.quantity_mt().normalize())).or_default().push(trade.clone());
    }
    let mut pairs = Vec::new();
    for group in groups.values() {
        pairs.extend(find_spread_pairs(group, universal, SpreadTier::ProductQuantity, |_, _| true));
    }
    pairs
}

/// Runs all three exchange-side tiers in sequence, each operating only on
/// the trades the previous tier left unconsumed.
pub fn exchange_spread_pairs(exchange: &[Trade], universal: &[UniversalField], trader_pairs: &[SpreadPair]) -> Vec<SpreadPair> {
    let tier1 = tier1_dealid_pairs(exchange, universal);
    let consumed: HashSet<_> = tier1.iter().flat_map(|p| [p.early.id.clone(), p.late.id.clone()]).collect();
    let remainder: Vec<Trade> = exchange.iter().filter(|t| !consumed.contains(&t.id)).cloned().collect();

    let tier2 = tier2_datetime_pairs(&remainder, universal, trader_pairs);
    let consumed2: HashSet<_> = tier2.iter().flat_map(|p| [p.early.id.clone(), p.late.id.clone()]).collect();
    let remainder2: Vec<Trade> = remainder.into_iter().filter(|t| !consumed2.contains(&t.id)).collect();

    let tier3 = tier3_product_quantity_pairs(&remainder2, universal);

    debug!(tier1 = tier1.len(), tier2 = tier2.len(), tier3 = tier3.len(), "rule 2 exchange spread tiers");
    tier1.into_iter().chain(tier2).chain(tier3).collect()
}

fn compatible(trader: &SpreadPair, exchange: &SpreadPair) -> bool {
    if trader.month_set() != exchange.month_set() {
        return false;
    }
    if trader.early.buy_sell != exchange.early.buy_sell || trader.late.buy_sell != exchange.late.buy_sell {
        return false;
    }
    exchange.early.price - exchange.late.price == trader.spread_price()
}

impl Matcher for SpreadMatcher {
    fn rule_number(&self) -> u8 {
        2
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let universal = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(2);

        let trader_snapshot = pool.unmatched_trader_snapshot();
        let mut trader_groups: IndexMap<(String, Decimal), Vec<Trade>> = IndexMap::new();
        for trade in trader_snapshot {
            trader_groups.entry((trade.product().to_string(), trade.quantity_mt().normalize())).or_default().push(trade);
        }
        let mut trader_pairs = Vec::new();
        for group in trader_groups.values() {
            trader_pairs.extend(find_spread_pairs(group, universal, SpreadTier::TraderSide, |a, b| {
                a.spread_flag.as_deref() == Some("S")
                    || b.spread_flag.as_deref() == Some("S")
                    || a.price.is_zero()
                    || b.price.is_zero()
                    || a.price == b.price
            }));
        }

        let exchange_snapshot = pool.unmatched_exchange_snapshot();
        let mut exchange_pairs = exchange_spread_pairs(&exchange_snapshot, universal, &trader_pairs);

        let mut matches = Vec::new();
        for trader_pair in &trader_pairs {
            let Some(idx) = exchange_pairs.iter().position(|ep| compatible(trader_pair, ep)) else {
                continue;
            };
            let exchange_pair = exchange_pairs.remove(idx);

            let candidate = MatchCandidate {
                rule_number: 2,
                match_type: MatchType::Spread,
                confidence,
                trader_primary: trader_pair.early.id.clone(),
                exchange_primary: exchange_pair.early.id.clone(),
                trader_additional: vec![trader_pair.late.id.clone()],
                exchange_additional: vec![exchange_pair.late.id.clone()],
                matched_fields: vec!["product".into(), "contract_month".into(), "buy_sell".into(), "price".into()],
                tolerances_applied: IndexMap::new(),
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 2, matches = matches.len(), "spread matching complete");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TradeId;
    use crate::month::ContractMonth;
    use crate::trade::{BuySell, Side, TradeInput, Unit};
    use rust_decimal_macros::dec;

    fn mk(id: &str, source: Side, month: &str, bs: BuySell, price: Decimal) -> Trade {
        Trade::new(
            TradeInput {
                id: TradeId::from(id),
                source,
                product: "X".into(),
                contract_month: ContractMonth::parse(month).unwrap(),
                quantity: dec!(1000),
                unit: Unit::Mt,
                price,
                buy_sell: bs,
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
            dec!(7),
        )
        .unwrap()
    }

    #[test]
    fn scenario_s3_spread() {
        let mut pool = Pool::new(
            vec![
                mk("t1", Side::Trader, "Mar-25", BuySell::Buy, dec!(2.5)),
                mk("t2", Side::Trader, "Apr-25", BuySell::Sell, dec!(0)),
            ],
            vec![
                mk("e1", Side::Exchange, "Mar-25", BuySell::Buy, dec!(82.5)),
                mk("e2", Side::Exchange, "Apr-25", BuySell::Sell, dec!(80)),
            ],
        );
        let cfg = Config::default();
        let matches = SpreadMatcher.run(&mut pool, &cfg);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Spread);
        assert!(pool.validate_integrity());
    }

    #[test]
    fn price_differential_mismatch_does_not_match() {
        let mut pool = Pool::new(
            vec![
                mk("t1", Side::Trader, "Mar-25", BuySell::Buy, dec!(2.5)),
                mk("t2", Side::Trader, "Apr-25", BuySell::Sell, dec!(0)),
            ],
            vec![
                mk("e1", Side::Exchange, "Mar-25", BuySell::Buy, dec!(82.5)),
                mk("e2", Side::Exchange, "Apr-25", BuySell::Sell, dec!(81)),
            ],
        );
        let cfg = Config::default();
        let matches = SpreadMatcher.run(&mut pool, &cfg);
        assert!(matches.is_empty());
    }
}
