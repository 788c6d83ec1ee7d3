//! Rule 3 — CRACK (confidence ≈95). Grounds on
//! `original_source/ice_match/matchers/crack_matcher.py`: both sides
//! filtered to "crack" products, exchange side indexed on
//! `(product, contract_month, price, buy_sell, universal_fields)`, MT↔BBL
//! tolerance applied via `utils/conversion_helpers.py`'s shared validator.
//! Only fires against exchange rows recorded in BBL — an MT-recorded
//! exchange crack row would already have been caught by Rule 1.

use super::Matcher;
use super::support::abs_diff;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::signature::{SigValue, Signature, SignatureIndex};
use crate::trade::{Trade, Unit, UniversalField};
use indexmap::IndexMap;
use tracing::info;

pub struct CrackMatcher;

fn key(trade: &Trade, universal: &[UniversalField]) -> Signature {
    let rule_fields = vec![
        SigValue::from(trade.product()),
        SigValue::from(trade.contract_month.to_string().as_str()),
        SigValue::from(trade.price),
        SigValue::from(trade.buy_sell.to_string().as_str()),
    ];
    Signature::new(rule_fields, trade, universal)
}

impl Matcher for CrackMatcher {
    fn rule_number(&self) -> u8 {
        3
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let universal = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(3);

        let exchange: Vec<Trade> = pool
            .unmatched_exchange_snapshot()
            .into_iter()
            .filter(|t| t.is_crack() && t.unit == Unit::Bbl)
            .collect();
        let mut index = SignatureIndex::build(exchange.iter(), |t| key(t, universal));

        let trader: Vec<Trade> = pool
            .unmatched_trader_snapshot()
            .into_iter()
            .filter(|t| t.is_crack())
            .collect();

        let mut matches = Vec::new();
        for trader_trade in &trader {
            let sig = key(trader_trade, universal);
            let ratio = cfg.ratio_for(trader_trade.product());
            let expected_bbl = trader_trade.quantity_mt() * ratio;

            let mut found = None;
            for candidate_id in index.candidates(&sig) {
                let Some(exchange_trade) = pool.available_exchange(candidate_id) else {
                    continue;
                };
                if abs_diff(expected_bbl, exchange_trade.quantity_bbl()) <= cfg.universal_tolerance_bbl {
                    found = Some(candidate_id.clone());
                    break;
                }
            }
            let Some(exchange_id) = found else { continue };
            index.remove(&sig, &exchange_id);

            let mut tolerances = IndexMap::new();
            tolerances.insert("quantity_bbl".to_string(), cfg.universal_tolerance_bbl);

            let candidate = MatchCandidate {
                rule_number: 3,
                match_type: MatchType::Crack,
                confidence,
                trader_primary: trader_trade.id.clone(),
                exchange_primary: exchange_id,
                trader_additional: vec![],
                exchange_additional: vec![],
                matched_fields: vec![
                    "product".into(),
                    "contract_month".into(),
                    "price".into(),
                    "buy_sell".into(),
                ],
                tolerances_applied: tolerances,
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 3, matches = matches.len(), "crack matching complete");
        matches
    }
}
