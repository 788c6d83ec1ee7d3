//! Unmatched pool: the single source of truth for which trades remain, with
//! atomic removal on match commit.
//!
//! Grounds on `original_source/ice_match/core/unmatched_pool.py` for the
//! method surface (`record_match`, `get_unmatched_*`, `get_statistics`,
//! `is_trade_matched`) and the teacher's `FnvIndexMap`-backed deterministic
//! storage idiom (`jackbot-integration/src/collection/mod.rs`). Atomicity of
//! `record_match` follows spec §4.2's explicit invariant rather than the
//! Python original's looser one-at-a-time removal (see `DESIGN.md`, Open
//! Question 3).

use crate::ids::TradeId;
use crate::match_result::{MatchResult, MatchStatus, MatchType};
use crate::trade::{Side, Trade};
use fnv::FnvBuildHasher;
use indexmap::{IndexMap, IndexSet};
use rust_decimal::Decimal;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, error, warn};

type FnvIndexMap<K, V> = IndexMap<K, V, FnvBuildHasher>;
type FnvIndexSet<T> = IndexSet<T, FnvBuildHasher>;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum PoolError {
    #[error("trader trade {0} is not available (already matched or unknown)")]
    TraderUnavailable(TradeId),
    #[error("exchange trade {0} is not available (already matched or unknown)")]
    ExchangeUnavailable(TradeId),
    #[error("match candidate names the same trade id {0} more than once")]
    DuplicateLeg(TradeId),
}

/// A proposed match, named by [`TradeId`] rather than by owned [`Trade`].
/// The pool resolves ids to trades, validates availability, and only then
/// commits — this is what makes `record_match` atomic.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub rule_number: u8,
    pub match_type: MatchType,
    pub confidence: u8,
    pub trader_primary: TradeId,
    pub exchange_primary: TradeId,
    pub trader_additional: Vec<TradeId>,
    pub exchange_additional: Vec<TradeId>,
    pub matched_fields: Vec<String>,
    pub tolerances_applied: IndexMap<String, Decimal>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SideStatistics {
    pub original: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub match_rate_pct: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PoolStatistics {
    pub trader: SideStatistics,
    pub exchange: SideStatistics,
    pub overall_match_rate_pct: f64,
    pub matches_by_rule: IndexMap<u8, usize>,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    trader_id: TradeId,
    exchange_id: TradeId,
    match_type: MatchType,
}

/// Owns the available/matched trade sets for both sides of a reconciliation
/// run. All mutation goes through [`Pool::record_match`]; all other
/// operations are read-only.
#[derive(Debug)]
pub struct Pool {
    available_trader: FnvIndexMap<TradeId, Trade>,
    available_exchange: FnvIndexMap<TradeId, Trade>,
    matched_trader: FnvIndexSet<TradeId>,
    matched_exchange: FnvIndexSet<TradeId>,
    history: Vec<HistoryEntry>,
    matches_by_rule: IndexMap<u8, usize>,
    original_trader_count: usize,
    original_exchange_count: usize,
}

impl Pool {
    pub fn new(trader: Vec<Trade>, exchange: Vec<Trade>) -> Self {
        let original_trader_count = trader.len();
        let original_exchange_count = exchange.len();
        debug!(
            original_trader_count,
            original_exchange_count, "initialised unmatched pool"
        );
        Pool {
            available_trader: trader.into_iter().map(|t| (t.id.clone(), t)).collect(),
            available_exchange: exchange.into_iter().map(|t| (t.id.clone(), t)).collect(),
            matched_trader: FnvIndexSet::default(),
            matched_exchange: FnvIndexSet::default(),
            history: Vec::new(),
            matches_by_rule: IndexMap::new(),
            original_trader_count,
            original_exchange_count,
        }
    }

    pub fn is_matched(&self, side: Side, id: &TradeId) -> bool {
        match side {
            Side::Trader => self.matched_trader.contains(id),
            Side::Exchange => self.matched_exchange.contains(id),
        }
    }

    pub fn available_trader(&self, id: &TradeId) -> Option<&Trade> {
        self.available_trader.get(id)
    }

    pub fn available_exchange(&self, id: &TradeId) -> Option<&Trade> {
        self.available_exchange.get(id)
    }

    /// Unmatched trader trades, in insertion order (spec §5 determinism).
    pub fn unmatched_trader(&self) -> impl Iterator<Item = &Trade> {
        self.available_trader.values()
    }

    pub fn unmatched_exchange(&self) -> impl Iterator<Item = &Trade> {
        self.available_exchange.values()
    }

    /// Owned snapshot of currently-unmatched trader trades. Rules clone a
    /// snapshot up front so their candidate-generation code can build
    /// indices and enumerate combinations without juggling borrows against
    /// the `&mut Pool` needed later for `record_match`.
    pub fn unmatched_trader_snapshot(&self) -> Vec<Trade> {
        self.available_trader.values().cloned().collect()
    }

    pub fn unmatched_exchange_snapshot(&self) -> Vec<Trade> {
        self.available_exchange.values().cloned().collect()
    }

    pub fn unmatched_trader_count(&self) -> usize {
        self.available_trader.len()
    }

    pub fn unmatched_exchange_count(&self) -> usize {
        self.available_exchange.len()
    }

    /// Atomically commits a proposed match: validates every leg is still
    /// available, and only if every leg passes does it remove any of them.
    /// A partial failure leaves the pool completely unchanged.
    pub fn record_match(&mut self, candidate: MatchCandidate) -> Result<MatchResult, PoolError> {
        let trader_ids: Vec<TradeId> = std::iter::once(candidate.trader_primary.clone())
            .chain(candidate.trader_additional.iter().cloned())
            .collect();
        let exchange_ids: Vec<TradeId> = std::iter::once(candidate.exchange_primary.clone())
            .chain(candidate.exchange_additional.iter().cloned())
            .collect();

        let mut seen = HashSet::with_capacity(trader_ids.len() + exchange_ids.len());
        for id in trader_ids.iter().chain(exchange_ids.iter()) {
            if !seen.insert(id.clone()) {
                return Err(PoolError::DuplicateLeg(id.clone()));
            }
        }

        for id in &trader_ids {
            if !self.available_trader.contains_key(id) {
                warn!(trade_id = %id, rule = candidate.rule_number, "trader leg unavailable, discarding hypothesis");
                return Err(PoolError::TraderUnavailable(id.clone()));
            }
        }
        for id in &exchange_ids {
            if !self.available_exchange.contains_key(id) {
                warn!(trade_id = %id, rule = candidate.rule_number, "exchange leg unavailable, discarding hypothesis");
                return Err(PoolError::ExchangeUnavailable(id.clone()));
            }
        }

        let mut trader_trades: Vec<Trade> = trader_ids
            .iter()
            .map(|id| self.available_trader.shift_remove(id).expect("checked above"))
            .collect();
        let mut exchange_trades: Vec<Trade> = exchange_ids
            .iter()
            .map(|id| self.available_exchange.shift_remove(id).expect("checked above"))
            .collect();

        for id in &trader_ids {
            self.matched_trader.insert(id.clone());
        }
        for id in &exchange_ids {
            self.matched_exchange.insert(id.clone());
        }

        let trader_primary = trader_trades.remove(0);
        let exchange_primary = exchange_trades.remove(0);

        self.history.push(HistoryEntry {
            trader_id: trader_primary.id.clone(),
            exchange_id: exchange_primary.id.clone(),
            match_type: candidate.match_type,
        });
        *self.matches_by_rule.entry(candidate.rule_number).or_insert(0) += 1;

        let status = if trader_ids.len() == 1 && exchange_ids.len() == 1 {
            MatchStatus::Matched
        } else {
            MatchStatus::GroupMatched
        };

        debug!(
            rule = candidate.rule_number,
            trader_legs = trader_ids.len(),
            exchange_legs = exchange_ids.len(),
            "committed match"
        );

        Ok(MatchResult {
            match_id: crate::ids::MatchId::from(format!(
                "rule{}-{}-{}",
                candidate.rule_number, trader_primary.id, exchange_primary.id
            )
            .as_str()),
            rule_number: candidate.rule_number,
            match_type: candidate.match_type,
            confidence: candidate.confidence,
            trader_primary,
            exchange_primary,
            trader_additional: trader_trades,
            exchange_additional: exchange_trades,
            matched_fields: candidate.matched_fields,
            tolerances_applied: candidate.tolerances_applied,
            status,
        })
    }

    pub fn statistics(&self) -> PoolStatistics {
        let trader_matched = self.matched_trader.len();
        let exchange_matched = self.matched_exchange.len();
        let trader_rate = rate_pct(trader_matched, self.original_trader_count);
        let exchange_rate = rate_pct(exchange_matched, self.original_exchange_count);

        let mut matches_by_rule: IndexMap<u8, usize> = IndexMap::new();
        for entry in &self.history {
            *matches_by_rule.entry(entry.match_type.rule_number()).or_insert(0) += 1;
        }

        PoolStatistics {
            trader: SideStatistics {
                original: self.original_trader_count,
                matched: trader_matched,
                unmatched: self.available_trader.len(),
                match_rate_pct: trader_rate,
            },
            exchange: SideStatistics {
                original: self.original_exchange_count,
                matched: exchange_matched,
                unmatched: self.available_exchange.len(),
                match_rate_pct: exchange_rate,
            },
            overall_match_rate_pct: trader_rate * 0.5 + exchange_rate * 0.5,
            matches_by_rule,
        }
    }

    /// Sanity check for tests: no id appears in both available and matched,
    /// and every history entry names only ids in `matched_*`.
    pub fn validate_integrity(&self) -> bool {
        for id in self.available_trader.keys() {
            if self.matched_trader.contains(id) {
                error!(trade_id = %id, "trader trade present in both available and matched");
                return false;
            }
        }
        for id in self.available_exchange.keys() {
            if self.matched_exchange.contains(id) {
                error!(trade_id = %id, "exchange trade present in both available and matched");
                return false;
            }
        }
        for entry in &self.history {
            if !self.matched_trader.contains(&entry.trader_id) {
                error!(trade_id = %entry.trader_id, "history references untracked trader id");
                return false;
            }
            if !self.matched_exchange.contains(&entry.exchange_id) {
                error!(trade_id = %entry.exchange_id, "history references untracked exchange id");
                return false;
            }
        }
        true
    }
}

fn rate_pct(matched: usize, original: usize) -> f64 {
    if original == 0 {
        0.0
    } else {
        matched as f64 / original as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TradeId;
    use crate::month::ContractMonth;
    use crate::trade::{BuySell, Side, TradeInput, Unit};
    use indexmap::IndexMap as Map;
    use rust_decimal::Decimal;

    fn trade(id: &str, source: Side) -> Trade {
        Trade::new(
            TradeInput {
                id: TradeId::from(id),
                source,
                product: "FE".into(),
                contract_month: ContractMonth::parse("Oct-25").unwrap(),
                quantity: Decimal::new(1000, 0),
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

    fn candidate(trader: &str, exchange: &str) -> MatchCandidate {
        MatchCandidate {
            rule_number: 1,
            match_type: MatchType::Exact,
            confidence: 100,
            trader_primary: TradeId::from(trader),
            exchange_primary: TradeId::from(exchange),
            trader_additional: vec![],
            exchange_additional: vec![],
            matched_fields: vec![],
            tolerances_applied: Map::new(),
        }
    }

    #[test]
    fn record_match_removes_both_legs_and_appends_history() {
        let mut pool = Pool::new(vec![trade("t1", Side::Trader)], vec![trade("e1", Side::Exchange)]);
        let result = pool.record_match(candidate("t1", "e1")).unwrap();
        assert_eq!(result.status, MatchStatus::Matched);
        assert!(pool.is_matched(Side::Trader, &TradeId::from("t1")));
        assert!(pool.is_matched(Side::Exchange, &TradeId::from("e1")));
        assert_eq!(pool.unmatched_trader_count(), 0);
        assert_eq!(pool.unmatched_exchange_count(), 0);
        assert!(pool.validate_integrity());
    }

    #[test]
    fn record_match_rejects_unavailable_trade_without_mutating_pool() {
        let mut pool = Pool::new(vec![trade("t1", Side::Trader)], vec![trade("e1", Side::Exchange)]);
        let err = pool.record_match(candidate("missing", "e1")).unwrap_err();
        assert!(matches!(err, PoolError::TraderUnavailable(_)));
        assert_eq!(pool.unmatched_trader_count(), 1);
        assert_eq!(pool.unmatched_exchange_count(), 1);
    }

    #[test]
    fn record_match_rejects_already_matched_trade() {
        let mut pool = Pool::new(
            vec![trade("t1", Side::Trader)],
            vec![trade("e1", Side::Exchange), trade("e2", Side::Exchange)],
        );
        pool.record_match(candidate("t1", "e1")).unwrap();
        let err = pool.record_match(candidate("t1", "e2")).unwrap_err();
        assert!(matches!(err, PoolError::TraderUnavailable(_)));
    }

    #[test]
    fn statistics_weight_both_sides_fifty_fifty() {
        let mut pool = Pool::new(
            vec![trade("t1", Side::Trader), trade("t2", Side::Trader)],
            vec![trade("e1", Side::Exchange)],
        );
        pool.record_match(candidate("t1", "e1")).unwrap();
        let stats = pool.statistics();
        assert_eq!(stats.trader.match_rate_pct, 50.0);
        assert_eq!(stats.exchange.match_rate_pct, 100.0);
        assert_eq!(stats.overall_match_rate_pct, 75.0);
    }
}
