//! The reconciliation engine: sequences the configured rule cascade over a
//! [`Pool`] and returns the cumulative outcome.
//!
//! Grounds on `original_source/ice_match/core/reconciliation_engine.py` for
//! the pseudocode shape (spec §4.5) and on `jackbot-engine/src/lib.rs`'s
//! `Engine` struct (holds a processing plan built once, run synchronously)
//! for the Rust idiom.

use crate::config::Config;
use crate::match_result::MatchResult;
use crate::pool::Pool;
use crate::rules::{matcher_for_rule, Matcher};
use crate::trade::Trade;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error("processing_order names rule {0}, which has no registered matcher")]
    UnknownRule(u8),
}

/// Everything the engine produced from one reconciliation run: the ordered
/// match list, the residual unmatched trades on each side, and the
/// tabular report (spec §6/§7).
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub matches: Vec<MatchResult>,
    pub unmatched_trader: Vec<Trade>,
    pub unmatched_exchange: Vec<Trade>,
    pub rows: Vec<crate::report::ReconRow>,
    pub pool_integrity_ok: bool,
}

/// Drives the configured rule cascade over a [`Pool`]. Built once from a
/// [`Config`]; `run` is the only entry point and never fails — unknown rule
/// ids in `processing_order` are logged and skipped (spec §7).
pub struct Engine {
    matchers: Vec<Box<dyn Matcher>>,
}

impl Engine {
    /// Resolves `config.processing_order` into matcher instances. Rule ids
    /// with no registered matcher are recorded as a (non-fatal)
    /// [`ConfigError`] and omitted from the run.
    pub fn new(config: &Config) -> (Self, Vec<ConfigError>) {
        let mut matchers = Vec::new();
        let mut errors = Vec::new();
        for &rule in &config.processing_order {
            match matcher_for_rule(rule) {
                Some(matcher) => matchers.push(matcher),
                None => {
                    warn!(rule, "no matcher registered for rule id in processing_order, skipping");
                    errors.push(ConfigError::UnknownRule(rule));
                }
            }
        }
        (Engine { matchers }, errors)
    }

    /// Runs every configured rule in order over a fresh [`Pool`] built from
    /// `trader`/`exchange`, then asserts pool integrity and assembles the
    /// reconciliation report.
    pub fn run(&self, trader: Vec<Trade>, exchange: Vec<Trade>, config: &Config) -> EngineReport {
        let mut pool = Pool::new(trader, exchange);
        let mut matches = Vec::new();

        for matcher in &self.matchers {
            let produced = matcher.run(&mut pool, config);
            info!(rule = matcher.rule_number(), produced = produced.len(), "rule pass complete");
            matches.extend(produced);
        }

        let pool_integrity_ok = pool.validate_integrity();
        if !pool_integrity_ok {
            tracing::error!("pool integrity check failed after cascade; returning partial results");
        }

        let unmatched_trader: Vec<Trade> = pool.unmatched_trader().cloned().collect();
        let unmatched_exchange: Vec<Trade> = pool.unmatched_exchange().cloned().collect();
        let rows = crate::report::build_report(&matches, &unmatched_trader, &unmatched_exchange);

        EngineReport {
            matches,
            unmatched_trader,
            unmatched_exchange,
            rows,
            pool_integrity_ok,
        }
    }
}
