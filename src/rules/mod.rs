//! The thirteen rule matchers and the shared [`Matcher`] trait that lets the
//! [`crate::engine::Engine`] drive them uniformly (spec §9: "matchers share
//! large contracts... belong on a shared trait/interface implemented by
//! every matcher").
//!
//! Trait shape grounds on `jackbot/src/risk/check/mod.rs`'s `RiskCheck`
//! associated-method trait: one required entry point, config/state passed
//! in by reference, no shared mutable fields on the matcher itself (every
//! matcher here is a zero-sized unit struct).

mod rule1_exact;
mod rule2_spread;
mod rule3_crack;
mod rule4_complex_crack;
mod rule5_product_spread;
mod rule6_fly;
mod rule7_aggregation;
mod rule8_aggregated_complex_crack;
mod rule9_aggregated_spread;
mod rule10_multileg_spread;
mod rule11_aggregated_crack;
mod rule12_complex_crack_roll;
mod rule13_aggregated_product_spread;
pub(crate) mod support;

use crate::config::Config;
use crate::match_result::MatchResult;
use crate::pool::Pool;

/// One matching rule. Implementations consume the pool's current unmatched
/// trades, emit zero or more matches, and delegate to [`Pool::record_match`]
/// for removal — a matcher never mutates pool state directly.
pub trait Matcher {
    fn rule_number(&self) -> u8;
    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult>;
}

/// Resolves a rule id from `Config::processing_order` to its matcher.
/// Unknown ids return `None`; the engine logs a warning and skips them
/// (spec §7: "configuration error... skipped with a warning").
pub fn matcher_for_rule(rule: u8) -> Option<Box<dyn Matcher>> {
    match rule {
        1 => Some(Box::new(rule1_exact::ExactMatcher)),
        2 => Some(Box::new(rule2_spread::SpreadMatcher)),
        3 => Some(Box::new(rule3_crack::CrackMatcher)),
        4 => Some(Box::new(rule4_complex_crack::ComplexCrackMatcher)),
        5 => Some(Box::new(rule5_product_spread::ProductSpreadMatcher)),
        6 => Some(Box::new(rule6_fly::FlyMatcher)),
        7 => Some(Box::new(rule7_aggregation::AggregationMatcher)),
        8 => Some(Box::new(rule8_aggregated_complex_crack::AggregatedComplexCrackMatcher)),
        9 => Some(Box::new(rule9_aggregated_spread::AggregatedSpreadMatcher)),
        10 => Some(Box::new(rule10_multileg_spread::MultilegSpreadMatcher)),
        11 => Some(Box::new(rule11_aggregated_crack::AggregatedCrackMatcher)),
        12 => Some(Box::new(rule12_complex_crack_roll::ComplexCrackRollMatcher)),
        13 => Some(Box::new(rule13_aggregated_product_spread::AggregatedProductSpreadMatcher)),
        _ => None,
    }
}
