// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cashflows;
pub mod cli;
pub mod commands;
pub mod dates;
pub mod db;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod prices;
pub mod utils;
pub mod valuation;
pub mod xirr;

pub use cashflows::{Cashflow, Extraction, ReturnsQuery, Warning, extract, get_cashflows};
pub use error::ReturnsError;
pub use matcher::AccountMatcher;
pub use valuation::{LedgerValuation, Valuation};
pub use xirr::{annualized_return, xirr, xnpv};
