//! Contract month parsing and chronological ordering.
//!
//! Month tokens arrive already normalised by the (out-of-scope) ingestion
//! layer as `"Balmo"`, `"BalmoNd"`, or `"MMM-YY"`. `Balmo`/`BalmoNd` sort
//! before every calendar month; this is a working convention, not something
//! externally documented (see `DESIGN.md`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ContractMonth {
    Balmo,
    BalmoNd,
    Month { year: u16, month: u8 },
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ContractMonthError {
    #[error("unrecognised contract month token: {0}")]
    Unparseable(String),
}

impl ContractMonth {
    /// `(tier, ordinal)` used purely for `Ord`; `Balmo` and `BalmoNd` occupy
    /// tiers below every calendar month so they always sort first.
    fn sort_key(&self) -> (i32, i32) {
        match self {
            ContractMonth::Balmo => (-1, 0),
            ContractMonth::BalmoNd => (0, 0),
            ContractMonth::Month { year, month } => (*year as i32, *month as i32),
        }
    }

    pub fn parse(token: &str) -> Result<Self, ContractMonthError> {
        match token {
            "Balmo" => return Ok(ContractMonth::Balmo),
            "BalmoNd" => return Ok(ContractMonth::BalmoNd),
            _ => {}
        }
        let (name, year) = token
            .split_once('-')
            .ok_or_else(|| ContractMonthError::Unparseable(token.to_owned()))?;
        let month = month_index(name).ok_or_else(|| ContractMonthError::Unparseable(token.to_owned()))?;
        let year_short: u16 = year
            .parse()
            .map_err(|_| ContractMonthError::Unparseable(token.to_owned()))?;
        Ok(ContractMonth::Month {
            year: 2000 + year_short,
            month,
        })
    }
}

fn month_index(name: &str) -> Option<u8> {
    const NAMES: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| (i + 1) as u8)
}

impl Ord for ContractMonth {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for ContractMonth {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ContractMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        match self {
            ContractMonth::Balmo => write!(f, "Balmo"),
            ContractMonth::BalmoNd => write!(f, "BalmoNd"),
            ContractMonth::Month { year, month } => {
                write!(f, "{}-{:02}", NAMES[*month as usize - 1], year % 100)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balmo_sorts_before_balmo_nd_and_calendar_months() {
        let balmo = ContractMonth::Balmo;
        let balmo_nd = ContractMonth::BalmoNd;
        let mar25 = ContractMonth::parse("Mar-25").unwrap();
        assert!(balmo < balmo_nd);
        assert!(balmo_nd < mar25);
        assert!(balmo < mar25);
    }

    #[test]
    fn calendar_months_sort_chronologically() {
        let mar25 = ContractMonth::parse("Mar-25").unwrap();
        let apr25 = ContractMonth::parse("Apr-25").unwrap();
        let dec24 = ContractMonth::parse("Dec-24").unwrap();
        assert!(dec24 < mar25);
        assert!(mar25 < apr25);
    }

    #[test]
    fn round_trips_through_display() {
        for token in ["Mar-25", "Dec-24", "Balmo", "BalmoNd"] {
            let parsed = ContractMonth::parse(token).unwrap();
            assert_eq!(parsed.to_string(), token);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(ContractMonth::parse("Foo-99").is_err());
        assert!(ContractMonth::parse("2025-03").is_err());
    }
}
