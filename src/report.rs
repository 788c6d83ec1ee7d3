//! Tabular reconciliation report assembled after the rule cascade.
//!
//! Grounds on spec §6's output schema and `original_source/ice_match/core/reconciliation_engine.py`'s
//! final report-assembly step (one row per match, plus one row per residual
//! unmatched trade on each side). Rendering and persistence of this table
//! stay out of scope (spec §1 Non-goals); this module only produces the rows.

use crate::match_result::{AggregationType, MatchResult};
use crate::trade::{Side, Trade};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum ReconStatus {
    Matched,
    GroupMatched,
    UnmatchedTraders,
    UnmatchedExch,
}

/// One row of the reconciliation report, schema per spec §6.
#[derive(Debug, Clone, Serialize)]
pub struct ReconRow {
    pub recon_id: String,
    pub trader_ids: Vec<String>,
    pub exchange_ids: Vec<String>,
    pub status: ReconStatus,
    pub run_timestamp: DateTime<Utc>,
    pub remarks: String,
    pub confidence: u8,
    pub quantity: rust_decimal::Decimal,
    pub contract_month: String,
    pub product: String,
    pub match_id: Option<String>,
    pub aggregation_type: Option<AggregationType>,
}

/// Builds the reconciliation report: one row per match, then one row per
/// residual unmatched trade on each side, all stamped with the same
/// `run_timestamp` (spec §7: "the reconciliation report is always produced").
pub fn build_report(
    matches: &[MatchResult],
    unmatched_trader: &[Trade],
    unmatched_exchange: &[Trade],
) -> Vec<ReconRow> {
    let run_timestamp = Utc::now();
    let mut rows = Vec::with_capacity(matches.len() + unmatched_trader.len() + unmatched_exchange.len());

    for m in matches {
        let status = match m.status {
            crate::match_result::MatchStatus::Matched => ReconStatus::Matched,
            crate::match_result::MatchStatus::GroupMatched => ReconStatus::GroupMatched,
        };
        rows.push(ReconRow {
            recon_id: format!("recon-{}", m.match_id),
            trader_ids: m.all_trader_trades().map(|t| t.id.to_string()).collect(),
            exchange_ids: m.all_exchange_trades().map(|t| t.id.to_string()).collect(),
            status,
            run_timestamp,
            remarks: remark_for(m.rule_number),
            confidence: m.confidence,
            quantity: m.trader_primary.quantity_mt(),
            contract_month: m.trader_primary.contract_month.to_string(),
            product: m.trader_primary.product().to_string(),
            match_id: Some(m.match_id.to_string()),
            aggregation_type: Some(m.aggregation_type()),
        });
    }

    for t in unmatched_trader {
        rows.push(unmatched_row(t, Side::Trader, run_timestamp));
    }
    for t in unmatched_exchange {
        rows.push(unmatched_row(t, Side::Exchange, run_timestamp));
    }

    rows
}

fn unmatched_row(trade: &Trade, side: Side, run_timestamp: DateTime<Utc>) -> ReconRow {
    let (status, ids_on_this_side) = match side {
        Side::Trader => (ReconStatus::UnmatchedTraders, vec![trade.id.to_string()]),
        Side::Exchange => (ReconStatus::UnmatchedExch, vec![trade.id.to_string()]),
    };
    ReconRow {
        recon_id: format!("recon-unmatched-{}", trade.id),
        trader_ids: if matches!(side, Side::Trader) { ids_on_this_side.clone() } else { vec![] },
        exchange_ids: if matches!(side, Side::Exchange) { ids_on_this_side } else { vec![] },
        status,
        run_timestamp,
        remarks: match status {
            ReconStatus::UnmatchedTraders => "UNMATCHED_TRADERS".to_string(),
            ReconStatus::UnmatchedExch => "UNMATCHED_EXCH".to_string(),
            _ => unreachable!(),
        },
        confidence: 0,
        quantity: trade.quantity_mt(),
        contract_month: trade.contract_month.to_string(),
        product: trade.product().to_string(),
        match_id: None,
        aggregation_type: None,
    }
}

fn remark_for(rule_number: u8) -> String {
    format!("RULE_{rule_number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MatchId, TradeId};
    use crate::match_result::{MatchStatus, MatchType};
    use crate::month::ContractMonth;
    use crate::trade::{BuySell, TradeInput, Unit};
    use indexmap::IndexMap;
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

    #[test]
    fn one_match_yields_one_row_with_one_to_one_aggregation() {
        let m = MatchResult {
            match_id: MatchId::from("m1"),
            rule_number: 1,
            match_type: MatchType::Exact,
            confidence: 100,
            trader_primary: trade("t1", Side::Trader),
            exchange_primary: trade("e1", Side::Exchange),
            trader_additional: vec![],
            exchange_additional: vec![],
            matched_fields: vec![],
            tolerances_applied: IndexMap::new(),
            status: MatchStatus::Matched,
        };
        let rows = build_report(&[m], &[], &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ReconStatus::Matched);
        assert_eq!(rows[0].remarks, "RULE_1");
        assert_eq!(rows[0].aggregation_type, Some(AggregationType::OneToOne));
        assert_eq!(rows[0].trader_ids, vec!["t1".to_string()]);
        assert_eq!(rows[0].exchange_ids, vec!["e1".to_string()]);
    }

    #[test]
    fn unmatched_trades_yield_one_row_each_with_side_specific_status() {
        let rows = build_report(&[], &[trade("t1", Side::Trader)], &[trade("e1", Side::Exchange)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, ReconStatus::UnmatchedTraders);
        assert_eq!(rows[0].trader_ids, vec!["t1".to_string()]);
        assert!(rows[0].exchange_ids.is_empty());
        assert_eq!(rows[1].status, ReconStatus::UnmatchedExch);
        assert_eq!(rows[1].exchange_ids, vec!["e1".to_string()]);
    }

    #[test]
    fn empty_input_yields_empty_report() {
        assert!(build_report(&[], &[], &[]).is_empty());
    }
}
