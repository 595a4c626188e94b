//! Target date of a batch run.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The business date a run processes, handed to every worker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetDate(NaiveDate);

impl TargetDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date on the local wall clock
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// 8-digit `YYYYMMDD` form used for worker arguments and file names
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for TargetDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

impl FromStr for TargetDate {
    type Err = TargetDateError;

    /// Accepts `YYYYMMDD` or `YYYY-MM-DD`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let format = match s.len() {
            8 if s.bytes().all(|b| b.is_ascii_digit()) => "%Y%m%d",
            10 => "%Y-%m-%d",
            _ => return Err(TargetDateError(s.to_string())),
        };

        NaiveDate::parse_from_str(s, format)
            .map(Self)
            .map_err(|_| TargetDateError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid target date '{0}': expected YYYYMMDD or YYYY-MM-DD")]
pub struct TargetDateError(pub String);
