// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Point-in-time valuation of ledger holdings.

use crate::inventory::{Inventory, MarketValue};
use crate::matcher::AccountMatcher;
use crate::models::{Amount, Transaction};
use crate::prices::PriceMap;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// What the cashflow extractor needs from the ledger besides the transactions
/// themselves: currency conversion at a date, and the market value of the
/// selected accounts at the end of a date.
pub trait Valuation {
    /// `amount` expressed in `currency` as of `date`, or `None` when no rate applies.
    fn convert(&self, amount: &Amount, currency: &str, date: NaiveDate) -> Option<Decimal>;

    /// Market value in `currency` of everything held in `accounts` at end of day `date`.
    fn value_as_of(&self, date: NaiveDate, accounts: &AccountMatcher, currency: &str)
    -> MarketValue;
}

/// Replays ledger postings into an inventory and prices it from a [`PriceMap`].
pub struct LedgerValuation<'a> {
    transactions: &'a [Transaction],
    prices: PriceMap,
}

impl<'a> LedgerValuation<'a> {
    pub fn new(transactions: &'a [Transaction], prices: PriceMap) -> Self {
        Self {
            transactions,
            prices,
        }
    }

    pub fn inventory_as_of(&self, date: NaiveDate, accounts: &AccountMatcher) -> Inventory {
        let mut inventory = Inventory::default();
        for txn in self.transactions.iter().filter(|t| t.date <= date) {
            for posting in txn.postings.iter().filter(|p| accounts.matches(&p.account)) {
                inventory.add_posting(posting);
            }
        }
        inventory
    }
}

impl Valuation for LedgerValuation<'_> {
    fn convert(&self, amount: &Amount, currency: &str, date: NaiveDate) -> Option<Decimal> {
        self.prices.convert(amount, currency, date)
    }

    fn value_as_of(
        &self,
        date: NaiveDate,
        accounts: &AccountMatcher,
        currency: &str,
    ) -> MarketValue {
        self.inventory_as_of(date, accounts)
            .market_value(currency, &self.prices, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Posting, Price};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn buy(id: i64, on: NaiveDate, units: &str, cost: &str) -> Transaction {
        let spent = d(units) * d(cost);
        Transaction {
            id,
            date: on,
            narration: "Buy".into(),
            postings: vec![
                Posting::new("Assets:Brokerage", Amount::new(d(units), "ABC"))
                    .with_cost(d(cost), "USD"),
                Posting::new("Assets:Cash", Amount::new(-spent, "USD")),
            ],
        }
    }

    #[test]
    fn replays_only_selected_accounts_up_to_date() {
        let txns = vec![
            buy(1, date(2015, 12, 1), "1000", "1.00"),
            buy(2, date(2016, 12, 1), "1000", "2.00"),
        ];
        let prices = PriceMap::build(&[
            Price {
                date: date(2015, 12, 1),
                base: "ABC".into(),
                quote: "USD".into(),
                rate: d("1.00"),
            },
            Price {
                date: date(2016, 12, 1),
                base: "ABC".into(),
                quote: "USD".into(),
                rate: d("2.00"),
            },
        ]);
        let valuation = LedgerValuation::new(&txns, prices);
        let brokerage = AccountMatcher::regex(["Assets:Brokerage"]).unwrap();

        let before = valuation.value_as_of(date(2015, 11, 30), &brokerage, "USD");
        assert_eq!(before.amount, Decimal::ZERO);

        let mid = valuation.value_as_of(date(2016, 11, 30), &brokerage, "USD");
        assert_eq!(mid.amount, d("1000"));

        let end = valuation.value_as_of(date(2016, 12, 1), &brokerage, "USD");
        assert_eq!(end.amount, d("4000"));
    }

    #[test]
    fn empty_selection_is_worth_nothing() {
        let txns = vec![buy(1, date(2015, 12, 1), "10", "1")];
        let valuation = LedgerValuation::new(&txns, PriceMap::default());
        let none = AccountMatcher::default();
        let mv = valuation.value_as_of(date(2020, 1, 1), &none, "USD");
        assert_eq!(mv, MarketValue::default());
    }
}
