// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReturnsError {
    #[error("cannot convert {amount} to {currency} as of {date}: no applicable rate")]
    ConversionUnavailable {
        amount: String,
        currency: String,
        date: NaiveDate,
    },

    #[error("insufficient data: need cashflows on at least two distinct dates, found {distinct_dates}")]
    InsufficientCashflows { distinct_dates: usize },

    #[error("no solution found: {0}")]
    NoConvergence(String),

    #[error("malformed ledger input: {0}")]
    MalformedInput(String),

    #[error("invalid account pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T, E = ReturnsError> = std::result::Result<T, E>;
