//! Helpers shared across multiple rule matchers: universal-field/option
//! validation, the generic outright spread-pair predicate (rules 2, 9, 10),
//! and quantity/price tolerance checks (spec §4.4, §9).

use crate::trade::{Trade, UniversalField, universal_fields_match};
use rust_decimal::Decimal;

/// Universal-field equality plus option-term compatibility — the two checks
/// spec §4.4 says every multi-trade rule enforces without exception.
pub fn universal_and_option_ok(a: &Trade, b: &Trade, fields: &[UniversalField]) -> bool {
    universal_fields_match(a, b, fields) && a.option_compatible(b)
}

/// Generic outright spread-pair predicate: same product, same MT quantity,
/// different contract months, opposite B/S, universal fields and option
/// terms aligned. Shared by rule 2's trader grouping and all three of its
/// exchange tiers, and reused verbatim by rules 9 and 10 (spec §9).
pub fn is_spread_pair(a: &Trade, b: &Trade, fields: &[UniversalField]) -> bool {
    a.product() == b.product()
        && a.quantity_mt() == b.quantity_mt()
        && a.contract_month != b.contract_month
        && a.buy_sell != b.buy_sell
        && universal_and_option_ok(a, b, fields)
}

/// `(earlier, later)` ordered by contract month.
pub fn order_by_month<'t>(a: &'t Trade, b: &'t Trade) -> (&'t Trade, &'t Trade) {
    if a.contract_month <= b.contract_month {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn abs_diff(a: Decimal, b: Decimal) -> Decimal {
    (a - b).abs()
}

pub fn within(diff: Decimal, tolerance: Decimal) -> bool {
    diff <= tolerance
}
