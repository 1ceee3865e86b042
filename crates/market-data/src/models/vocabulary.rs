//! Closed vocabularies for historical requests.
//!
//! `1M` means one month as a [`Period`] and one minute as a [`Timeframe`];
//! the parameter position alone decides. Parsing is case-insensitive and
//! rejects anything outside the vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::MarketDataError;

/// Total span of a historical request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Period {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "5D")]
    FiveDays,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "2Y")]
    TwoYears,
}

impl Period {
    pub const ALL: [Period; 8] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneWeek,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::FiveDays => "5D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1Y",
            Self::TwoYears => "2Y",
        }
    }
}

impl FromStr for Period {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == token)
            .ok_or_else(|| {
                MarketDataError::validation(format!(
                    "unrecognized period '{}', expected one of 1D, 5D, 1W, 1M, 3M, 6M, 1Y, 2Y",
                    s
                ))
            })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bar granularity of a historical request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1M")]
    OneMinute,
    #[serde(rename = "5M")]
    FiveMinutes,
    #[serde(rename = "15M")]
    FifteenMinutes,
    #[serde(rename = "30M")]
    ThirtyMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "2H")]
    TwoHours,
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
}

impl Timeframe {
    pub const ALL: [Timeframe; 9] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::FourHours,
        Self::OneDay,
        Self::OneWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1M",
            Self::FiveMinutes => "5M",
            Self::FifteenMinutes => "15M",
            Self::ThirtyMinutes => "30M",
            Self::OneHour => "1H",
            Self::TwoHours => "2H",
            Self::FourHours => "4H",
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
        }
    }
}

impl FromStr for Timeframe {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == token)
            .ok_or_else(|| {
                MarketDataError::validation(format!(
                    "unrecognized timeframe '{}', expected one of 1M, 5M, 15M, 30M, 1H, 2H, 4H, 1D, 1W",
                    s
                ))
            })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which price stream historical bars are built from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhatToShow {
    #[default]
    Trades,
    Midpoint,
    Bid,
    Ask,
    BidAsk,
}

impl WhatToShow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trades => "TRADES",
            Self::Midpoint => "MIDPOINT",
            Self::Bid => "BID",
            Self::Ask => "ASK",
            Self::BidAsk => "BID_ASK",
        }
    }
}

impl FromStr for WhatToShow {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRADES" => Ok(Self::Trades),
            "MIDPOINT" => Ok(Self::Midpoint),
            "BID" => Ok(Self::Bid),
            "ASK" => Ok(Self::Ask),
            "BID_ASK" => Ok(Self::BidAsk),
            _ => Err(MarketDataError::validation(format!(
                "unrecognized what_to_show '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for WhatToShow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
