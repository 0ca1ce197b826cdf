// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Turn a stream of double-entry transactions into the external cashflows of
//! a chosen set of accounts.
//!
//! Every posting of a relevant transaction is either *tracked* (it belongs to
//! an interesting or an internal account) or *external*. Tracked postings are
//! summed into the transaction's net cashflow; external postings are not.
//!
//! Because a transaction balances to zero, leaving the external postings out
//! makes the net equal to minus their total. A positive net therefore means
//! money entered the tracked accounts from outside, and a negative net means
//! money left them. A dividend booked from `Income:Dividends` (internal) into
//! `Assets:Brokerage` (interesting) nets to zero and produces no cashflow.
//!
//! External accounts are recorded from their own side of the posting: a
//! positive external posting received money, so the account is an outflow
//! destination; a negative one supplied money, so it is an inflow source.

use crate::matcher::AccountMatcher;
use crate::models::{Amount, Ledger, Transaction};
use crate::prices::PriceMap;
use crate::valuation::{LedgerValuation, Valuation};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// Decimal places a net cashflow is rounded to before deciding it is zero.
pub const MINOR_UNIT_DP: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cashflow {
    pub date: NaiveDate,
    /// Positive when money flows into the tracked accounts.
    pub amount: Decimal,
    pub inflow_accounts: BTreeSet<String>,
    pub outflow_accounts: BTreeSet<String>,
    /// Originating transaction; `None` for synthesized boundary valuations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<i64>,
}

impl Cashflow {
    pub fn synthetic(date: NaiveDate, amount: Decimal) -> Self {
        Self {
            date,
            amount,
            inflow_accounts: BTreeSet::new(),
            outflow_accounts: BTreeSet::new(),
            transaction: None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.transaction.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ReturnsQuery {
    pub interesting: AccountMatcher,
    pub internal: AccountMatcher,
    pub from: Option<NaiveDate>,
    pub to: NaiveDate,
    pub currency: String,
}

impl ReturnsQuery {
    pub fn new(interesting: AccountMatcher, to: NaiveDate, currency: impl Into<String>) -> Self {
        Self {
            interesting,
            internal: AccountMatcher::default(),
            from: None,
            to,
            currency: currency.into(),
        }
    }

    pub fn with_internal(mut self, internal: AccountMatcher) -> Self {
        self.internal = internal;
        self
    }

    pub fn since(mut self, from: Option<NaiveDate>) -> Self {
        self.from = from;
        self
    }

    fn in_window(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| from <= date) && date <= self.to
    }

    fn is_tracked(&self, account: &str) -> bool {
        self.interesting.matches(account) || self.internal.matches(account)
    }
}

/// Something that degrades the accuracy of a result without preventing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A posting was left out of its transaction's net cashflow.
    ConversionUnavailable {
        date: NaiveDate,
        transaction: i64,
        account: String,
        amount: Amount,
        currency: String,
    },
    /// A holding was left out of a boundary valuation.
    UnpricedHolding {
        date: NaiveDate,
        amount: Amount,
        currency: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ConversionUnavailable {
                date,
                transaction,
                account,
                amount,
                currency,
            } => write!(
                f,
                "could not convert {} posted to {} on {} (transaction {}) to {}; return will be wrong",
                amount, account, date, transaction, currency
            ),
            Warning::UnpricedHolding {
                date,
                amount,
                currency,
            } => write!(
                f,
                "no {} price for holding of {} on {}; excluded from valuation",
                currency, amount, date
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub cashflows: Vec<Cashflow>,
    pub warnings: Vec<Warning>,
}

impl Extraction {
    /// External accounts that supplied money, across all cashflows.
    pub fn inflow_accounts(&self) -> BTreeSet<String> {
        self.cashflows
            .iter()
            .flat_map(|c| c.inflow_accounts.iter().cloned())
            .collect()
    }

    /// External accounts that received money, across all cashflows.
    pub fn outflow_accounts(&self) -> BTreeSet<String> {
        self.cashflows
            .iter()
            .flat_map(|c| c.outflow_accounts.iter().cloned())
            .collect()
    }
}

pub fn is_interesting_transaction(txn: &Transaction, interesting: &AccountMatcher) -> bool {
    txn.postings.iter().any(|p| interesting.matches(&p.account))
}

/// Record an external posting from its own point of view.
///
/// `value` is the external posting's converted amount: positive means the
/// external account received money (outflow destination), otherwise it
/// supplied money (inflow source).
fn record_external(
    account: &str,
    value: Decimal,
    inflow_accounts: &mut BTreeSet<String>,
    outflow_accounts: &mut BTreeSet<String>,
) {
    if value > Decimal::ZERO {
        outflow_accounts.insert(account.to_string());
    } else {
        inflow_accounts.insert(account.to_string());
    }
}

/// Net cashflow of one transaction, or `None` when it rounds to zero.
fn transaction_cashflow<V: Valuation>(
    txn: &Transaction,
    valuation: &V,
    query: &ReturnsQuery,
    warnings: &mut Vec<Warning>,
) -> Option<Cashflow> {
    let mut net = Decimal::ZERO;
    let mut inflow_accounts = BTreeSet::new();
    let mut outflow_accounts = BTreeSet::new();

    for posting in &txn.postings {
        let weight = posting.weight();
        let Some(value) = valuation.convert(&weight, &query.currency, txn.date) else {
            let w = Warning::ConversionUnavailable {
                date: txn.date,
                transaction: txn.id,
                account: posting.account.clone(),
                amount: weight,
                currency: query.currency.clone(),
            };
            warn!("{}", w);
            warnings.push(w);
            continue;
        };

        if query.is_tracked(&posting.account) {
            net += value;
        } else {
            record_external(
                &posting.account,
                value,
                &mut inflow_accounts,
                &mut outflow_accounts,
            );
        }
    }

    debug!(transaction = txn.id, date = %txn.date, %net, "classified transaction");
    if net.round_dp(MINOR_UNIT_DP).is_zero() {
        return None;
    }
    Some(Cashflow {
        date: txn.date,
        amount: net,
        inflow_accounts,
        outflow_accounts,
        transaction: Some(txn.id),
    })
}

/// Extract the cashflows of `query.interesting` between `query.from` and
/// `query.to`, both inclusive, denominated in `query.currency`.
///
/// `transactions` must be in date order. When the interesting accounts
/// already hold something at the end of the day before `from`, the series
/// opens with that market value as an inflow on `from`; whatever is still
/// held at the end of `to` closes the series as an outflow on `to`.
pub fn extract<V: Valuation>(
    transactions: &[Transaction],
    valuation: &V,
    query: &ReturnsQuery,
) -> Extraction {
    let interesting: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| is_interesting_transaction(t, &query.interesting))
        .collect();

    let mut warnings = Vec::new();
    let mut cashflows: Vec<Cashflow> = interesting
        .iter()
        .filter(|t| query.in_window(t.date))
        .filter_map(|t| transaction_cashflow(t, valuation, query, &mut warnings))
        .collect();

    let boundary_value = |date: NaiveDate, warnings: &mut Vec<Warning>| {
        let mv = valuation.value_as_of(date, &query.interesting, &query.currency);
        for amount in mv.unpriced {
            let w = Warning::UnpricedHolding {
                date,
                amount,
                currency: query.currency.clone(),
            };
            warn!("{}", w);
            warnings.push(w);
        }
        mv.amount
    };

    if let Some(from) = query.from {
        if let Some(day_before) = from.pred_opt() {
            let start_value = boundary_value(day_before, &mut warnings);
            if !start_value.is_zero() {
                cashflows.insert(0, Cashflow::synthetic(from, start_value));
            }
        }
    }

    let end_value = boundary_value(query.to, &mut warnings);
    if !end_value.is_zero() {
        cashflows.push(Cashflow::synthetic(query.to, -end_value));
    }

    Extraction {
        cashflows,
        warnings,
    }
}

/// Build the price index once and extract against the whole ledger.
pub fn get_cashflows(ledger: &Ledger, query: &ReturnsQuery) -> Extraction {
    let valuation = LedgerValuation::new(&ledger.transactions, PriceMap::build(&ledger.prices));
    extract(&ledger.transactions, &valuation, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::MarketValue;
    use crate::models::{Posting, Price};
    use std::cell::RefCell;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn usd(account: &str, n: &str) -> Posting {
        Posting::new(account, Amount::new(d(n), "USD"))
    }

    fn txn(id: i64, on: NaiveDate, postings: Vec<Posting>) -> Transaction {
        Transaction {
            id,
            date: on,
            narration: String::new(),
            postings,
        }
    }

    /// Move `n` USD between the bank and the brokerage account.
    fn transfer(id: i64, on: NaiveDate, n: &str) -> Transaction {
        txn(
            id,
            on,
            vec![
                usd("Assets:Brokerage", n),
                Posting::new("Assets:Bank", Amount::new(-d(n), "USD")),
            ],
        )
    }

    fn set(accounts: &[&str]) -> BTreeSet<String> {
        accounts.iter().map(|a| a.to_string()).collect()
    }

    /// Converts only USD and reports fixed holdings values per date.
    #[derive(Default)]
    struct StubValuation {
        values: Vec<(NaiveDate, Decimal)>,
        asked: RefCell<Vec<NaiveDate>>,
    }

    impl Valuation for StubValuation {
        fn convert(&self, amount: &Amount, currency: &str, _: NaiveDate) -> Option<Decimal> {
            (amount.currency == currency).then_some(amount.number)
        }

        fn value_as_of(&self, date: NaiveDate, _: &AccountMatcher, _: &str) -> MarketValue {
            self.asked.borrow_mut().push(date);
            let amount = self
                .values
                .iter()
                .find(|(d, _)| *d == date)
                .map(|(_, v)| *v)
                .unwrap_or_default();
            MarketValue {
                amount,
                unpriced: vec![],
            }
        }
    }

    fn brokerage_query(from: Option<NaiveDate>, to: NaiveDate) -> ReturnsQuery {
        ReturnsQuery::new(
            AccountMatcher::regex(["Assets:Brokerage"]).unwrap(),
            to,
            "USD",
        )
        .with_internal(AccountMatcher::regex(["Income:"]).unwrap())
        .since(from)
    }

    fn extract_to_year_end(txns: &[Transaction]) -> Extraction {
        extract(txns, &StubValuation::default(), &brokerage_query(None, date(2020, 12, 31)))
    }

    #[test]
    fn fully_tracked_transaction_emits_nothing() {
        let txns = vec![txn(
            1,
            date(2020, 3, 1),
            vec![
                usd("Assets:Brokerage:Cash", "25.00"),
                usd("Income:Dividends", "-25.00"),
            ],
        )];
        let out = extract_to_year_end(&txns);
        assert!(out.cashflows.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn deposit_is_positive_and_source_is_inflow() {
        let txns = vec![txn(
            1,
            date(2020, 3, 1),
            vec![usd("Assets:Brokerage", "500"), usd("Assets:Bank", "-500")],
        )];
        let out = extract_to_year_end(&txns);
        assert_eq!(out.cashflows.len(), 1);
        let cf = &out.cashflows[0];
        assert_eq!(cf.amount, d("500"));
        assert_eq!(cf.inflow_accounts, set(&["Assets:Bank"]));
        assert!(cf.outflow_accounts.is_empty());
        assert_eq!(cf.transaction, Some(1));
    }

    #[test]
    fn withdrawal_is_negative_and_destination_is_outflow() {
        let txns = vec![txn(
            1,
            date(2020, 3, 1),
            vec![usd("Assets:Brokerage", "-300"), usd("Assets:Bank", "300")],
        )];
        let out = extract_to_year_end(&txns);
        assert_eq!(out.cashflows[0].amount, d("-300"));
        assert_eq!(out.cashflows[0].outflow_accounts, set(&["Assets:Bank"]));
    }

    #[test]
    fn dividend_paid_out_to_bank_is_an_outflow() {
        // Income is internal, so only the leak to the bank account counts.
        let txns = vec![txn(
            1,
            date(2020, 6, 1),
            vec![usd("Income:Dividends", "-40"), usd("Assets:Bank", "40")],
        )];
        let query = brokerage_query(None, date(2020, 12, 31));
        let out = extract(&txns, &StubValuation::default(), &query);
        // Not interesting: no Brokerage posting.
        assert!(out.cashflows.is_empty());

        let txns = vec![txn(
            2,
            date(2020, 6, 1),
            vec![
                usd("Income:Dividends", "-40"),
                usd("Assets:Brokerage", "10"),
                usd("Assets:Bank", "30"),
            ],
        )];
        let out = extract(&txns, &StubValuation::default(), &query);
        assert_eq!(out.cashflows[0].amount, d("-30"));
        assert_eq!(out.cashflows[0].outflow_accounts, set(&["Assets:Bank"]));
    }

    #[test]
    fn sub_cent_residue_is_suppressed() {
        let txns = vec![txn(
            1,
            date(2020, 3, 1),
            vec![
                usd("Assets:Brokerage", "100.004"),
                usd("Income:Interest", "-100"),
                usd("Equity:Rounding", "-0.004"),
            ],
        )];
        let out = extract_to_year_end(&txns);
        assert!(out.cashflows.is_empty());
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let txns = vec![
            transfer(1, date(2019, 12, 31), "1"),
            transfer(2, date(2020, 1, 1), "2"),
            transfer(3, date(2020, 12, 31), "3"),
            transfer(4, date(2021, 1, 1), "4"),
        ];
        let query = brokerage_query(Some(date(2020, 1, 1)), date(2020, 12, 31));
        let out = extract(&txns, &StubValuation::default(), &query);
        let ids: Vec<Option<i64>> = out.cashflows.iter().map(|c| c.transaction).collect();
        assert_eq!(ids, vec![Some(2), Some(3)]);
    }

    #[test]
    fn boundaries_are_synthesized_from_valuation() {
        let txns = vec![txn(
            1,
            date(2020, 6, 1),
            vec![usd("Assets:Brokerage", "100"), usd("Assets:Bank", "-100")],
        )];
        let valuation = StubValuation {
            values: vec![(date(2019, 12, 31), d("1000")), (date(2020, 12, 31), d("1250"))],
            ..Default::default()
        };
        let query = brokerage_query(Some(date(2020, 1, 1)), date(2020, 12, 31));
        let out = extract(&txns, &valuation, &query);

        assert_eq!(
            *valuation.asked.borrow(),
            vec![date(2019, 12, 31), date(2020, 12, 31)]
        );
        assert_eq!(out.cashflows.len(), 3);
        assert_eq!(out.cashflows[0], Cashflow::synthetic(date(2020, 1, 1), d("1000")));
        assert!(out.cashflows[0].is_synthetic());
        assert_eq!(out.cashflows[2], Cashflow::synthetic(date(2020, 12, 31), d("-1250")));
    }

    #[test]
    fn unconvertible_posting_is_skipped_with_warning() {
        let txns = vec![txn(
            9,
            date(2020, 3, 1),
            vec![
                usd("Assets:Brokerage", "100"),
                Posting::new("Assets:Brokerage", Amount::new(d("5"), "XYZ")),
                usd("Assets:Bank", "-100"),
            ],
        )];
        let out = extract_to_year_end(&txns);
        assert_eq!(out.cashflows.len(), 1);
        assert_eq!(out.cashflows[0].amount, d("100"));
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(
            &out.warnings[0],
            Warning::ConversionUnavailable { transaction: 9, account, .. }
                if account == "Assets:Brokerage"
        ));
        assert!(out.warnings[0].to_string().contains("return will be wrong"));
    }

    #[test]
    fn extraction_is_repeatable() {
        let txns = vec![
            transfer(1, date(2020, 1, 2), "10"),
            transfer(2, date(2020, 5, 2), "-4"),
        ];
        let valuation = StubValuation {
            values: vec![(date(2020, 12, 31), d("7"))],
            ..Default::default()
        };
        let query = brokerage_query(None, date(2020, 12, 31));
        assert_eq!(extract(&txns, &valuation, &query), extract(&txns, &valuation, &query));
    }

    fn scenario_ledger() -> Ledger {
        let abc = |n: &str, cost: &str| {
            Posting::new("Assets:Brokerage", Amount::new(d(n), "ABC")).with_cost(d(cost), "USD")
        };
        let price = |on, rate: &str| Price {
            date: on,
            base: "ABC".into(),
            quote: "USD".into(),
            rate: d(rate),
        };
        Ledger::new(
            vec![
                txn(1, date(2015, 12, 1), vec![
                    usd("Assets:Cash", "3000"),
                    usd("Equity:Opening-Balances", "-3000"),
                ]),
                txn(2, date(2015, 12, 1), vec![abc("1000", "1.00"), usd("Assets:Cash", "-1000")]),
                txn(3, date(2016, 12, 1), vec![abc("1000", "2.00"), usd("Assets:Cash", "-2000")]),
                txn(4, date(2017, 12, 1), vec![
                    abc("-1000", "1.00"),
                    abc("-1000", "2.00"),
                    usd("Assets:Cash", "2500"),
                    usd("Income:CapitalGains", "500"),
                ]),
            ],
            vec![
                price(date(2015, 12, 1), "1.00"),
                price(date(2016, 12, 1), "2.00"),
                price(date(2017, 12, 1), "1.50"),
            ],
        )
    }

    #[test]
    fn buy_buy_sell_scenario() {
        let ledger = scenario_ledger();
        let query = ReturnsQuery::new(
            AccountMatcher::regex(["Assets:Brokerage"]).unwrap(),
            date(2017, 12, 1),
            "USD",
        )
        .with_internal(AccountMatcher::regex(["Income:CapitalGains"]).unwrap())
        .since(Some(date(2015, 12, 1)));

        let out = get_cashflows(&ledger, &query);
        let simplified: Vec<(NaiveDate, Decimal)> =
            out.cashflows.iter().map(|c| (c.date, c.amount)).collect();
        assert_eq!(
            simplified,
            vec![
                (date(2015, 12, 1), d("1000")),
                (date(2016, 12, 1), d("2000")),
                (date(2017, 12, 1), d("-2500")),
            ]
        );
        assert_eq!(out.cashflows[0].inflow_accounts, set(&["Assets:Cash"]));
        assert_eq!(out.cashflows[2].outflow_accounts, set(&["Assets:Cash"]));
        assert!(out.warnings.is_empty());
        assert_eq!(out.inflow_accounts(), set(&["Assets:Cash"]));
        assert_eq!(out.outflow_accounts(), set(&["Assets:Cash"]));
    }

    #[test]
    fn open_start_matches_earliest_date() {
        let ledger = scenario_ledger();
        let base = ReturnsQuery::new(
            AccountMatcher::regex(["Assets:Brokerage"]).unwrap(),
            date(2017, 6, 1),
            "USD",
        )
        .with_internal(AccountMatcher::regex(["Income:CapitalGains"]).unwrap());

        let open = get_cashflows(&ledger, &base);
        let bounded = get_cashflows(&ledger, &base.clone().since(Some(date(2015, 12, 1))));
        assert_eq!(open, bounded);

        // Still holding 2,000 ABC at 2.00 on the horizon.
        let last = open.cashflows.last().unwrap();
        assert!(last.is_synthetic());
        assert_eq!(last.amount, d("-4000"));
    }

    #[test]
    fn opening_position_becomes_first_inflow() {
        let ledger = scenario_ledger();
        let query = ReturnsQuery::new(
            AccountMatcher::regex(["Assets:Brokerage"]).unwrap(),
            date(2016, 12, 31),
            "USD",
        )
        .since(Some(date(2016, 1, 1)));
        let out = get_cashflows(&ledger, &query);
        let simplified: Vec<(NaiveDate, Decimal)> =
            out.cashflows.iter().map(|c| (c.date, c.amount)).collect();
        assert_eq!(
            simplified,
            vec![
                (date(2016, 1, 1), d("1000")),
                (date(2016, 12, 1), d("2000")),
                (date(2016, 12, 31), d("-4000")),
            ]
        );
    }

    #[test]
    fn nothing_held_and_nothing_moved_is_empty() {
        let ledger = scenario_ledger();
        let query = ReturnsQuery::new(
            AccountMatcher::regex(["Assets:Brokerage"]).unwrap(),
            date(2015, 6, 1),
            "USD",
        );
        let out = get_cashflows(&ledger, &query);
        assert_eq!(out, Extraction::default());
    }
}
