//! Rule 8 — AGGREGATED COMPLEX CRACK (confidence per config). Grounds on
//! `original_source/energy_match/matchers/aggregated_complex_crack_matcher.py`:
//! extends rule 4 by allowing the base-product side to be split across N
//! exchange rows sharing `(price, buy_sell, contract_month, universal_fields)`.

use super::Matcher;
use super::rule4_complex_crack::direction_ok;
use super::support::abs_diff;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::{Trade, UniversalField};
use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

pub struct AggregatedComplexCrackMatcher;

fn same_month_and_universal(a: &Trade, b: &Trade, fields: &[UniversalField]) -> bool {
    a.contract_month == b.contract_month && super::support::universal_and_option_ok(a, b, fields)
}

impl Matcher for AggregatedComplexCrackMatcher {
    fn rule_number(&self) -> u8 {
        8
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let fields = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(8);

        let exchange = pool.unmatched_exchange_snapshot();
        let trader: Vec<Trade> = pool.unmatched_trader_snapshot().into_iter().filter(|t| t.is_crack()).collect();

        let mut matches = Vec::new();
        for crack_trade in &trader {
            let Some(base_product) = crack_trade.base_product() else {
                continue;
            };
            let ratio = cfg.ratio_for(crack_trade.product());

            let brents: Vec<&Trade> = exchange
                .iter()
                .filter(|e| {
                    pool.available_exchange(&e.id).is_some() && e.product() == "brent swap" && same_month_and_universal(crack_trade, e, fields)
                })
                .collect();

            let mut bases_by_key: IndexMap<(Decimal, &str), Vec<&Trade>> = IndexMap::new();
            for e in exchange.iter().filter(|e| {
                pool.available_exchange(&e.id).is_some() && e.product() == base_product && same_month_and_universal(crack_trade, e, fields)
            }) {
                bases_by_key.entry((e.price, if e.buy_sell == crate::trade::BuySell::Buy { "B" } else { "S" })).or_default().push(e);
            }

            let mut commit = None;
            'search: for bucket in bases_by_key.values() {
                if bucket.len() < 2 {
                    continue;
                }
                let base_sum: Decimal = bucket.iter().map(|b| b.quantity_mt()).sum();
                if abs_diff(crack_trade.quantity_mt(), base_sum) > cfg.universal_tolerance_mt {
                    continue;
                }
                let base_price = bucket[0].price;
                for brent in &brents {
                    if !direction_ok(crack_trade, bucket[0], brent) {
                        continue;
                    }
                    let expected_brent_bbl = crack_trade.quantity_mt() * ratio;
                    if abs_diff(expected_brent_bbl, brent.quantity_bbl()) > cfg.universal_tolerance_bbl {
                        continue;
                    }
                    let intermediate = (base_price / ratio).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
                    if intermediate - brent.price != crack_trade.price {
                        continue;
                    }
                    commit = Some((bucket.iter().map(|b| b.id.clone()).collect::<Vec<_>>(), brent.id.clone()));
                    break 'search;
                }
            }

            let Some((base_ids, brent_id)) = commit else {
                continue;
            };
            let (base_primary, base_rest) = base_ids.split_first().expect("bucket len >= 2");

            let mut tolerances = IndexMap::new();
            tolerances.insert("quantity_mt".to_string(), cfg.universal_tolerance_mt);
            tolerances.insert("quantity_bbl".to_string(), cfg.universal_tolerance_bbl);

            let candidate = MatchCandidate {
                rule_number: 8,
                match_type: MatchType::AggregatedComplexCrack,
                confidence,
                trader_primary: crack_trade.id.clone(),
                exchange_primary: base_primary.clone(),
                trader_additional: vec![],
                exchange_additional: base_rest.iter().cloned().chain(std::iter::once(brent_id)).collect(),
                matched_fields: vec!["product".into(), "contract_month".into(), "buy_sell".into(), "price".into()],
                tolerances_applied: tolerances,
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 8, matches = matches.len(), "aggregated complex crack matching complete");
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

    fn mk(id: &str, source: Side, product: &str, bs: BuySell, qty: Decimal, unit: Unit, price: Decimal) -> Trade {
        Trade::new(
            TradeInput {
                id: TradeId::from(id),
                source,
                product: product.into(),
                contract_month: ContractMonth::parse("Mar-25").unwrap(),
                quantity: qty,
                unit,
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
            dec!(6.35),
        )
        .unwrap()
    }

    #[test]
    fn aggregated_base_legs_match_single_crack() {
        let mut pool = Pool::new(
            vec![mk("t1", Side::Trader, "380cst crack", BuySell::Sell, dec!(1000), Unit::Mt, dec!(5.00))],
            vec![
                mk("e1", Side::Exchange, "380cst", BuySell::Sell, dec!(600), Unit::Mt, dec!(444.5)),
                mk("e2", Side::Exchange, "380cst", BuySell::Sell, dec!(400), Unit::Mt, dec!(444.5)),
                mk("e3", Side::Exchange, "brent swap", BuySell::Buy, dec!(6350), Unit::Bbl, dec!(65.00)),
            ],
        );
        let cfg = Config::default();
        let matches = AggregatedComplexCrackMatcher.run(&mut pool, &cfg);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].exchange_leg_count(), 3);
        assert!(pool.validate_integrity());
    }
}
