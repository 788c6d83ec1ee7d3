//! Signature index: a hash index from a rule-specific key (plus universal
//! fields) to candidate trades, built once per rule invocation.
//!
//! Grounds on `original_source/ice_match/models/__init__.py`'s
//! `SignatureValue` union concept — re-expressed here as a concrete Rust
//! enum (`SigValue`) rather than the Python original's loosely-typed tuple,
//! per spec §9's "encode as a concrete Key type" guidance — indexed via an
//! `FnvIndexMap` for deterministic bucket order (spec §5).

use crate::ids::TradeId;
use crate::trade::{Trade, UniversalField};
use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use smol_str::SmolStr;

/// A single component of a rule-specific matching signature. Hashable,
/// normalised on construction so trades that are semantically equal hash
/// and compare equal regardless of internal `Decimal` scale.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SigValue {
    Str(SmolStr),
    Decimal(Decimal),
    Int(i64),
    None,
}

impl From<&str> for SigValue {
    fn from(value: &str) -> Self {
        SigValue::Str(SmolStr::new(value))
    }
}

impl From<Decimal> for SigValue {
    fn from(value: Decimal) -> Self {
        SigValue::Decimal(value.normalize())
    }
}

impl From<Option<i64>> for SigValue {
    fn from(value: Option<i64>) -> Self {
        value.map(SigValue::Int).unwrap_or(SigValue::None)
    }
}

/// Concrete product-type key: an ordered list of rule-specific components
/// followed by the trade's universal-field values, so key equality always
/// implies universal-field equality (spec §4.3).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Signature(Vec<SigValue>);

impl Signature {
    pub fn new(rule_fields: Vec<SigValue>, trade: &Trade, universal_fields: &[UniversalField]) -> Self {
        let mut parts = rule_fields;
        parts.extend(universal_fields.iter().map(|&f| trade.universal_field(f).into()));
        Signature(parts)
    }
}

/// Hash index over a candidate side, keyed on a rule-specific
/// [`Signature`]. Buckets preserve insertion order; consumed candidates are
/// removed so a trade is never paired twice within one rule pass.
#[derive(Debug, Default)]
pub struct SignatureIndex {
    buckets: IndexMap<Signature, Vec<TradeId>, FnvBuildHasher>,
}

impl SignatureIndex {
    pub fn build<'t>(
        trades: impl IntoIterator<Item = &'t Trade>,
        key_of: impl Fn(&Trade) -> Signature,
    ) -> Self {
        let mut buckets: IndexMap<Signature, Vec<TradeId>, FnvBuildHasher> = IndexMap::default();
        for trade in trades {
            buckets.entry(key_of(trade)).or_default().push(trade.id.clone());
        }
        SignatureIndex { buckets }
    }

    pub fn candidates(&self, key: &Signature) -> &[TradeId] {
        self.buckets.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Removes a consumed candidate from its bucket so subsequent lookups
    /// within the same rule pass never see it again.
    pub fn remove(&mut self, key: &Signature, id: &TradeId) {
        if let Some(bucket) = self.buckets.get_mut(key) {
            bucket.retain(|i| i != id);
            if bucket.is_empty() {
                self.buckets.shift_remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_signature_values_normalise_scale() {
        let a: SigValue = Decimal::new(1000, 0).into();
        let b: SigValue = Decimal::new(100000, 2).into();
        assert_eq!(a, b);
    }
}
