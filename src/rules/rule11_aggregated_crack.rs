//! Rule 11 — AGGREGATED CRACK (confidence per config). Grounds on
//! `original_source/ice_match/matchers/aggregated_crack_matcher.py`: rule
//! 3 with the exchange side split across N BBL rows instead of one.

use super::Matcher;
use super::support::abs_diff;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::signature::{SigValue, Signature};
use crate::trade::{Trade, Unit, UniversalField};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::info;

pub struct AggregatedCrackMatcher;

fn key(trade: &Trade, universal: &[UniversalField]) -> Signature {
    let rule_fields = vec![
        SigValue::from(trade.product()),
        SigValue::from(trade.contract_month.to_string().as_str()),
        SigValue::from(trade.price),
        SigValue::from(trade.buy_sell.to_string().as_str()),
    ];
    Signature::new(rule_fields, trade, universal)
}

impl Matcher for AggregatedCrackMatcher {
    fn rule_number(&self) -> u8 {
        11
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let universal = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(11);

        let exchange: Vec<Trade> = pool
            .unmatched_exchange_snapshot()
            .into_iter()
            .filter(|t| t.is_crack() && t.unit == Unit::Bbl)
            .collect();
        let mut exchange_groups: IndexMap<Signature, Vec<Trade>> = IndexMap::new();
        for trade in exchange {
            exchange_groups.entry(key(&trade, universal)).or_default().push(trade);
        }

        let trader: Vec<Trade> = pool.unmatched_trader_snapshot().into_iter().filter(|t| t.is_crack()).collect();

        let mut matches = Vec::new();
        for trader_trade in &trader {
            let sig = key(trader_trade, universal);
            let Some(bucket) = exchange_groups.get(&sig) else { continue };
            if bucket.len() < 2 {
                continue;
            }
            let ratio = cfg.ratio_for(trader_trade.product());
            let expected_bbl = trader_trade.quantity_mt() * ratio;
            let bucket_sum: Decimal = bucket.iter().map(|t| t.quantity_bbl()).sum();
            if abs_diff(expected_bbl, bucket_sum) > cfg.universal_tolerance_bbl {
                continue;
            }
            if !bucket.iter().all(|t| pool.available_exchange(&t.id).is_some()) {
                continue;
            }

            let (primary, rest) = bucket.split_first().expect("bucket len >= 2");
            let mut tolerances = IndexMap::new();
            tolerances.insert("quantity_bbl".to_string(), cfg.universal_tolerance_bbl);

            let candidate = MatchCandidate {
                rule_number: 11,
                match_type: MatchType::AggregatedCrack,
                confidence,
                trader_primary: trader_trade.id.clone(),
                exchange_primary: primary.id.clone(),
                trader_additional: vec![],
                exchange_additional: rest.iter().map(|t| t.id.clone()).collect(),
                matched_fields: vec!["product".into(), "contract_month".into(), "price".into(), "buy_sell".into()],
                tolerances_applied: tolerances,
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 11, matches = matches.len(), "aggregated crack matching complete");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TradeId;
    use crate::month::ContractMonth;
    use crate::trade::{BuySell, Side, TradeInput};
    use rust_decimal_macros::dec;

    fn mk(id: &str, source: Side, qty: Decimal, unit: Unit) -> Trade {
        Trade::new(
            TradeInput {
                id: TradeId::from(id),
                source,
                product: "marine 0.5% crack".into(),
                contract_month: ContractMonth::parse("Mar-25").unwrap(),
                quantity: qty,
                unit,
                price: dec!(3.10),
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
            dec!(6.35),
        )
        .unwrap()
    }

    #[test]
    fn n_exchange_crack_rows_aggregate_to_one_trader_row() {
        let mut pool = Pool::new(
            vec![mk("t1", Side::Trader, dec!(2040), Unit::Mt)],
            vec![
                mk("e1", Side::Exchange, dec!(6000), Unit::Bbl),
                mk("e2", Side::Exchange, dec!(7000), Unit::Bbl),
            ],
        );
        let cfg = Config::default();
        let matches = AggregatedCrackMatcher.run(&mut pool, &cfg);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].exchange_leg_count(), 2);
        assert!(pool.validate_integrity());
    }
}
