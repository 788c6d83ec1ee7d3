//! Frozen configuration record: tolerances, confidence table, conversion
//! ratios, universal-field list, and rule processing order.
//!
//! Grounds on `jackbot/src/strategy/config.rs`'s plain-serde-struct-with-
//! `Default` idiom and `original_source/ice_match`'s tolerance/conversion-
//! ratio/processing-order knobs (`utils/conversion_helpers.py`, rule
//! registration order used across `matchers/*`).

use crate::trade::UniversalField;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The 13 rule identifiers, in the order spec §4.4 documents them. Actual
/// execution order is whatever `Config::processing_order` lists.
pub const ALL_RULE_IDS: [u8; 13] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub conversion_ratio_default: Decimal,
    pub per_product_conversion_ratios: IndexMap<String, Decimal>,
    pub universal_tolerance_bbl: Decimal,
    pub universal_tolerance_mt: Decimal,
    pub confidence_by_rule: IndexMap<u8, u8>,
    pub processing_order: Vec<u8>,
    pub universal_matching_fields: Vec<UniversalField>,
    pub max_trades_per_batch: usize,
    /// Tier-adjusted confidence for product-spread family rules (5, 13):
    /// `(hyphenated/two-leg, aggregated, cross-spread)`. spec §9's Open
    /// Question: "tier-to-adjustment mapping should be taken from
    /// configuration rather than hard-coded".
    pub product_spread_confidence_tiers: (u8, u8, u8),
}

impl Default for Config {
    fn default() -> Self {
        let mut ratios = IndexMap::new();
        ratios.insert("marine 0.5% crack".to_string(), Decimal::new(635, 2));
        ratios.insert("380cst crack".to_string(), Decimal::new(635, 2));
        ratios.insert("naphtha crack".to_string(), Decimal::new(89, 1));
        ratios.insert("naphtha japan crack".to_string(), Decimal::new(89, 1));
        ratios.insert("naphtha nwe crack".to_string(), Decimal::new(89, 1));

        let mut confidence = IndexMap::new();
        confidence.insert(1, 100);
        confidence.insert(2, 95);
        confidence.insert(3, 95);
        confidence.insert(4, 90);
        confidence.insert(5, 90);
        confidence.insert(6, 88);
        confidence.insert(7, 97);
        confidence.insert(8, 85);
        confidence.insert(9, 85);
        confidence.insert(10, 80);
        confidence.insert(11, 85);
        confidence.insert(12, 82);
        confidence.insert(13, 80);

        Config {
            conversion_ratio_default: Decimal::new(7, 0),
            per_product_conversion_ratios: ratios,
            universal_tolerance_bbl: Decimal::new(500, 0),
            universal_tolerance_mt: Decimal::new(145, 0),
            confidence_by_rule: confidence,
            processing_order: ALL_RULE_IDS.to_vec(),
            universal_matching_fields: vec![
                UniversalField::BrokerGroupId,
                UniversalField::ExchClearingAcctId,
            ],
            max_trades_per_batch: 50_000,
            product_spread_confidence_tiers: (95, 92, 90),
        }
    }
}

impl Config {
    /// Per-product MT↔BBL conversion ratio, falling back to
    /// `conversion_ratio_default`. Product is matched case-insensitively;
    /// caller is expected to pass an already-lowercased product name (as
    /// `Trade::product` always is).
    pub fn ratio_for(&self, product: &str) -> Decimal {
        self.per_product_conversion_ratios
            .get(product)
            .copied()
            .unwrap_or(self.conversion_ratio_default)
    }

    pub fn confidence_for(&self, rule: u8) -> u8 {
        self.confidence_by_rule.get(&rule).copied().unwrap_or(0)
    }
}
