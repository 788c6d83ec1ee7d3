//! Rule 6 — FLY (confidence per config). Grounds on
//! `original_source/ice_match/matchers/fly_matcher.py`: a butterfly spread
//! across three contract months, built as 3-SUM on quantity (`q(X) + q(Z)
//! == q(Y)`) rather than the naive O(n^3) triple loop.

use super::Matcher;
use super::support::universal_and_option_ok;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::month::ContractMonth;
use crate::pool::{MatchCandidate, Pool};
use crate::trade::{BuySell, Trade, UniversalField};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::info;

pub struct FlyMatcher;

/// A validated outer-middle-outer triplet, ordered chronologically.
#[derive(Debug, Clone)]
pub struct FlyTriplet {
    pub x: Trade,
    pub y: Trade,
    pub z: Trade,
}

impl FlyTriplet {
    fn months(&self) -> [ContractMonth; 3] {
        [self.x.contract_month, self.y.contract_month, self.z.contract_month]
    }

    fn fly_price(&self) -> Decimal {
        (self.x.price - self.y.price) + (self.z.price - self.y.price)
    }
}

/// 3-SUM search over one product/universal bucket: for every pair of
/// candidate outer legs `(a, b)` on distinct months with matching B/S,
/// looks up a middle leg whose quantity equals `q(a) + q(b)` in O(1) via a
/// pre-built quantity index, and whose B/S is opposite.
fn find_triplets(rows: &[Trade], fields: &[UniversalField]) -> Vec<FlyTriplet> {
    let mut by_quantity: IndexMap<Decimal, Vec<usize>> = IndexMap::new();
    for (idx, row) in rows.iter().enumerate() {
        by_quantity.entry(row.quantity_mt().normalize()).or_default().push(idx);
    }

    let mut used = std::collections::HashSet::new();
    let mut triplets = Vec::new();

    for i in 0..rows.len() {
        if used.contains(&i) {
            continue;
        }
        for j in (i + 1)..rows.len() {
            if used.contains(&j) {
                continue;
            }
            let (outer1, outer2) = (&rows[i], &rows[j]);
            if outer1.contract_month == outer2.contract_month {
                continue;
            }
            if outer1.buy_sell != outer2.buy_sell {
                continue;
            }
            if !universal_and_option_ok(outer1, outer2, fields) {
                continue;
            }
            let target = (outer1.quantity_mt() + outer2.quantity_mt()).normalize();
            let Some(candidates) = by_quantity.get(&target) else {
                continue;
            };
            let found = candidates.iter().find(|&&k| {
                k != i
                    && k != j
                    && !used.contains(&k)
                    && rows[k].buy_sell != outer1.buy_sell
                    && rows[k].contract_month != outer1.contract_month
                    && rows[k].contract_month != outer2.contract_month
                    && universal_and_option_ok(&rows[k], outer1, fields)
            });
            let Some(&middle_idx) = found else {
                continue;
            };

            let (x, z) = if outer1.contract_month < outer2.contract_month {
                (outer1.clone(), outer2.clone())
            } else {
                (outer2.clone(), outer1.clone())
            };
            used.insert(i);
            used.insert(j);
            used.insert(middle_idx);
            triplets.push(FlyTriplet {
                x,
                y: rows[middle_idx].clone(),
                z,
            });
            break;
        }
    }
    triplets
}

fn group_by_product<'a>(rows: &'a [Trade]) -> IndexMap<&'a str, Vec<Trade>> {
    let mut groups: IndexMap<&str, Vec<Trade>> = IndexMap::new();
    for row in rows {
        groups.entry(row.product()).or_default().push(row.clone());
    }
    groups
}

fn compatible(trader: &FlyTriplet, exchange: &FlyTriplet) -> bool {
    if trader.x.product() != exchange.x.product() {
        return false;
    }
    if trader.months() != exchange.months() {
        return false;
    }
    if trader.x.buy_sell != exchange.x.buy_sell || trader.y.buy_sell != exchange.y.buy_sell || trader.z.buy_sell != exchange.z.buy_sell {
        return false;
    }
    let trader_spread_price = if !trader.x.price.is_zero() {
        trader.x.price
    } else if !trader.y.price.is_zero() {
        trader.y.price
    } else {
        trader.z.price
    };
    exchange.fly_price() == trader_spread_price
}

fn exchange_deal_triplets(exchange: &[Trade], fields: &[UniversalField]) -> Vec<FlyTriplet> {
    let mut by_deal: IndexMap<String, Vec<Trade>> = IndexMap::new();
    for row in exchange {
        if let Some(deal_id) = row.deal_id.as_deref().filter(|s| !s.is_empty()) {
            by_deal.entry(deal_id.to_string()).or_default().push(row.clone());
        }
    }
    let mut triplets = Vec::new();
    for group in by_deal.values() {
        if group.len() >= 3 {
            triplets.extend(find_triplets(group, fields));
        }
    }
    triplets
}

impl Matcher for FlyMatcher {
    fn rule_number(&self) -> u8 {
        6
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let fields = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(6);

        let trader_spread_rows: Vec<Trade> = pool
            .unmatched_trader_snapshot()
            .into_iter()
            .filter(|t| t.spread_flag.as_deref() == Some("S"))
            .collect();
        let mut trader_triplets = Vec::new();
        for group in group_by_product(&trader_spread_rows).values() {
            trader_triplets.extend(find_triplets(group, fields));
        }

        let exchange_snapshot = pool.unmatched_exchange_snapshot();
        let mut exchange_triplets = exchange_deal_triplets(&exchange_snapshot, fields);

        let mut matches = Vec::new();
        for trader_triplet in &trader_triplets {
            let Some(idx) = exchange_triplets.iter().position(|et| compatible(trader_triplet, et)) else {
                continue;
            };
            let exchange_triplet = exchange_triplets.remove(idx);

            let candidate = MatchCandidate {
                rule_number: 6,
                match_type: MatchType::Fly,
                confidence,
                trader_primary: trader_triplet.x.id.clone(),
                exchange_primary: exchange_triplet.x.id.clone(),
                trader_additional: vec![trader_triplet.y.id.clone(), trader_triplet.z.id.clone()],
                exchange_additional: vec![exchange_triplet.y.id.clone(), exchange_triplet.z.id.clone()],
                matched_fields: vec!["product".into(), "contract_month".into(), "buy_sell".into(), "price".into()],
                tolerances_applied: IndexMap::new(),
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 6, matches = matches.len(), "fly matching complete");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TradeId;
    use crate::trade::{Side, TradeInput, Unit};
    use rust_decimal_macros::dec;

    fn mk(id: &str, source: Side, month: &str, bs: BuySell, price: Decimal, qty: Decimal, spread: bool, deal_id: Option<&str>) -> Trade {
        Trade::new(
            TradeInput {
                id: TradeId::from(id),
                source,
                product: "X".into(),
                contract_month: ContractMonth::parse(month).unwrap(),
                quantity: qty,
                unit: Unit::Mt,
                price,
                buy_sell: bs,
                broker_group_id: Some(1),
                exch_clearing_acct_id: Some(1),
                exchange_group_id: None,
                strike: None,
                put_call: None,
                spread_flag: if spread { Some("S".into()) } else { None },
                deal_id: deal_id.map(Into::into),
                trade_native_id: None,
                trade_datetime: None,
            },
            dec!(7),
        )
        .unwrap()
    }

    #[test]
    fn fly_triplet_matches_across_sides() {
        let mut pool = Pool::new(
            vec![
                mk("t1", Side::Trader, "Mar-25", BuySell::Buy, dec!(1.0), dec!(500), true, None),
                mk("t2", Side::Trader, "Apr-25", BuySell::Sell, dec!(0), dec!(1000), true, None),
                mk("t3", Side::Trader, "May-25", BuySell::Buy, dec!(0), dec!(500), true, None),
            ],
            vec![
                mk("e1", Side::Exchange, "Mar-25", BuySell::Buy, dec!(81.0), dec!(500), false, Some("D1")),
                mk("e2", Side::Exchange, "Apr-25", BuySell::Sell, dec!(80.0), dec!(1000), false, Some("D1")),
                mk("e3", Side::Exchange, "May-25", BuySell::Buy, dec!(80.0), dec!(500), false, Some("D1")),
            ],
        );
        let cfg = Config::default();
        let matches = FlyMatcher.run(&mut pool, &cfg);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Fly);
        assert_eq!(matches[0].trader_leg_count(), 3);
        assert_eq!(matches[0].exchange_leg_count(), 3);
        assert!(pool.validate_integrity());
    }
}
