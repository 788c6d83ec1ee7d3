//! Rule 1 — EXACT (confidence 100). Grounds on
//! `original_source/ice_match/matchers/exact_matcher.py`: index the
//! exchange side on the 6-field signature, walk the trader side, take the
//! first still-available candidate sharing the signature. No tolerances;
//! pure 1:1.

use super::Matcher;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::signature::{SigValue, Signature, SignatureIndex};
use crate::trade::{Trade, UniversalField};
use indexmap::IndexMap;
use tracing::info;

pub struct ExactMatcher;

fn key(trade: &Trade, universal: &[UniversalField]) -> Signature {
    let rule_fields = vec![
        SigValue::from(trade.product()),
        SigValue::from(trade.quantity_mt()),
        SigValue::from(trade.price),
        SigValue::from(trade.contract_month.to_string().as_str()),
        SigValue::from(trade.buy_sell.to_string().as_str()),
    ];
    Signature::new(rule_fields, trade, universal)
}

impl Matcher for ExactMatcher {
    fn rule_number(&self) -> u8 {
        1
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let universal = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(1);

        let exchange = pool.unmatched_exchange_snapshot();
        let mut index = SignatureIndex::build(exchange.iter(), |t| key(t, universal));

        let trader = pool.unmatched_trader_snapshot();
        let mut matches = Vec::new();

        for trader_trade in &trader {
            let sig = key(trader_trade, universal);
            let mut matched_exchange_id = None;
            for candidate_id in index.candidates(&sig) {
                if pool.available_exchange(candidate_id).is_some() {
                    matched_exchange_id = Some(candidate_id.clone());
                    break;
                }
            }
            let Some(exchange_id) = matched_exchange_id else {
                continue;
            };
            index.remove(&sig, &exchange_id);

            let candidate = MatchCandidate {
                rule_number: 1,
                match_type: MatchType::Exact,
                confidence,
                trader_primary: trader_trade.id.clone(),
                exchange_primary: exchange_id,
                trader_additional: vec![],
                exchange_additional: vec![],
                matched_fields: vec![
                    "product".into(),
                    "quantity_mt".into(),
                    "price".into(),
                    "contract_month".into(),
                    "buy_sell".into(),
                ],
                tolerances_applied: IndexMap::new(),
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 1, matches = matches.len(), "exact matching complete");
        matches
    }
}
