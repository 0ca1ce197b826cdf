// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Residual tolerated when checking that a transaction balances.
pub fn balance_tolerance() -> Decimal {
    Decimal::new(5, 3)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub number: Decimal,
    pub currency: String,
}

impl Amount {
    pub fn new(number: Decimal, currency: impl Into<String>) -> Self {
        Self {
            number,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

/// Per-unit acquisition cost of a lot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cost {
    pub number: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub account: String,
    pub units: Amount,
    pub cost: Option<Cost>,
    pub price: Option<Amount>,
}

impl Posting {
    pub fn new(account: impl Into<String>, units: Amount) -> Self {
        Self {
            account: account.into(),
            units,
            cost: None,
            price: None,
        }
    }

    pub fn with_cost(mut self, number: Decimal, currency: impl Into<String>) -> Self {
        self.cost = Some(Cost {
            number,
            currency: currency.into(),
        });
        self
    }

    pub fn with_price(mut self, number: Decimal, currency: impl Into<String>) -> Self {
        self.price = Some(Amount::new(number, currency));
        self
    }

    /// The amount this posting contributes to its transaction's balance.
    ///
    /// Lots are measured at their booked cost, priced conversions at the
    /// annotated price, everything else at face value.
    pub fn weight(&self) -> Amount {
        if let Some(cost) = &self.cost {
            return Amount::new(self.units.number * cost.number, cost.currency.clone());
        }
        if let Some(price) = &self.price {
            return Amount::new(self.units.number * price.number, price.currency.clone());
        }
        self.units.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub narration: String,
    pub postings: Vec<Posting>,
}

impl Transaction {
    /// Per-currency sums of posting weights that fall outside the tolerance.
    pub fn residuals(&self) -> Vec<Amount> {
        let weights: Vec<Amount> = self.postings.iter().map(Posting::weight).collect();
        let mut sums: BTreeMap<&str, Decimal> = BTreeMap::new();
        for w in &weights {
            *sums.entry(w.currency.as_str()).or_default() += w.number;
        }
        let tolerance = balance_tolerance();
        sums.into_iter()
            .filter(|(_, n)| n.abs() > tolerance)
            .map(|(c, n)| Amount::new(n, c))
            .collect()
    }

    pub fn is_balanced(&self) -> bool {
        self.residuals().is_empty()
    }
}

/// A quoted rate: one unit of `base` is worth `rate` units of `quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub date: NaiveDate,
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub transactions: Vec<Transaction>,
    pub prices: Vec<Price>,
}

impl Ledger {
    /// Transactions are kept in date order; same-day entries keep their input order.
    pub fn new(mut transactions: Vec<Transaction>, prices: Vec<Price>) -> Self {
        transactions.sort_by_key(|t| t.date);
        Self {
            transactions,
            prices,
        }
    }
}
