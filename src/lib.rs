#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Trade Recon
//! A deterministic, single-threaded reconciliation engine for commodity-derivatives
//! trades, pairing an internal trader blotter against an exchange trade feed.
//!
//! Both feeds describe the same economic activity, but differ in representation: the
//! trader side often reports a single economic position (a calendar spread, a crack
//! spread, a product spread) as one or two synthetic rows, while the exchange side
//! reports every constituent leg separately. The engine recognises not only 1:1
//! equality but 1:N, N:1, and N:M structural equivalences, involving unit conversion
//! (metric tons ↔ barrels), price arithmetic (spread/crack/fly formulas), and
//! directional logic (sell-crack ≡ sell-base + buy-brent).
//!
//! ## Overview
//! * **[`trade`]**: the immutable, normalised [`Trade`](trade::Trade) record with
//!   derived MT/BBL quantities.
//! * **[`config`]**: tolerances, the per-rule confidence table, conversion ratios,
//!   the universal-field list, and rule processing order.
//! * **[`pool`]**: the [`Pool`](pool::Pool) — single source of truth for which trades
//!   remain unmatched, with atomic, all-or-nothing match commit.
//! * **[`signature`]**: the hash index from a rule-specific key to candidate trades.
//! * **[`match_result`]**: the immutable record of one committed match.
//! * **[`rules`]**: the thirteen rule matchers and the shared [`Matcher`](rules::Matcher)
//!   trait.
//! * **[`engine`]**: [`Engine`](engine::Engine) — sequences the configured rule
//!   cascade over a [`Pool`](pool::Pool) and returns the cumulative outcome.
//! * **[`report`]**: assembles the tabular reconciliation report after a run.
//!
//! ## Getting Started
//! ```
//! use rust_decimal_macros::dec;
//! use trade_recon::config::Config;
//! use trade_recon::engine::Engine;
//! use trade_recon::ids::TradeId;
//! use trade_recon::month::ContractMonth;
//! use trade_recon::trade::{BuySell, Side, Trade, TradeInput, Unit};
//!
//! fn row(id: &str, source: Side) -> TradeInput {
//!     TradeInput {
//!         id: TradeId::from(id),
//!         source,
//!         product: "FE".into(),
//!         contract_month: ContractMonth::parse("Oct-25").unwrap(),
//!         quantity: dec!(15000),
//!         unit: Unit::Mt,
//!         price: dec!(101.65),
//!         buy_sell: BuySell::Buy,
//!         broker_group_id: Some(1),
//!         exch_clearing_acct_id: Some(1),
//!         exchange_group_id: None,
//!         strike: None,
//!         put_call: None,
//!         spread_flag: None,
//!         deal_id: None,
//!         trade_native_id: None,
//!         trade_datetime: None,
//!     }
//! }
//!
//! let cfg = Config::default();
//! let ratio = cfg.ratio_for("fe");
//! let trader = Trade::new(row("t1", Side::Trader), ratio).unwrap();
//! let exchange = Trade::new(row("e1", Side::Exchange), ratio).unwrap();
//!
//! let (engine, config_errors) = Engine::new(&cfg);
//! assert!(config_errors.is_empty());
//!
//! let report = engine.run(vec![trader], vec![exchange], &cfg);
//! assert_eq!(report.matches.len(), 1);
//! assert_eq!(report.matches[0].rule_number, 1);
//! ```

/// Process-unique identifiers ([`ids::TradeId`], [`ids::MatchId`]).
pub mod ids;

/// Contract-month parsing and chronological ordering ([`month::ContractMonth`]).
pub mod month;

/// The normalised [`trade::Trade`] record and its supporting enums.
pub mod trade;

/// Frozen reconciliation [`config::Config`]: tolerances, confidence table,
/// conversion ratios, universal-field list, rule processing order.
pub mod config;

/// The [`pool::Pool`] of unmatched trades — the engine's sole mutable state.
pub mod pool;

/// Hash index from a rule-specific key to candidate trades ([`signature::SignatureIndex`]).
pub mod signature;

/// The immutable [`match_result::MatchResult`] of one committed match.
pub mod match_result;

/// The thirteen rule matchers and the shared [`rules::Matcher`] trait the
/// [`engine::Engine`] drives them through.
pub mod rules;

/// [`engine::Engine`]: sequences the configured rule cascade over a [`pool::Pool`]
/// and returns the cumulative match list, residual unmatched trades, and report.
pub mod engine;

/// Tabular reconciliation report assembled after the rule cascade ([`report::ReconRow`]).
pub mod report;
