// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cashflows::{Cashflow, ReturnsQuery, Warning, get_cashflows};
use crate::dates::{Shortcut, TRAILING_WINDOWS, resolve_window};
use crate::db::load_ledger;
use crate::error::ReturnsError;
use crate::matcher::AccountMatcher;
use crate::utils::{
    fmt_money, fmt_pct, get_base_currency, normalize_currency, parse_date, pretty_table,
};
use crate::xirr::annualized_return;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;

/// How the rate calculation ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Rate { rate: f64 },
    NoCashflows,
    InsufficientCashflows { message: String },
    NoSolution { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnsReport {
    pub from: Option<NaiveDate>,
    pub to: NaiveDate,
    pub currency: String,
    pub outcome: Outcome,
    pub cashflows: Vec<Cashflow>,
    pub inflow_accounts: BTreeSet<String>,
    pub outflow_accounts: BTreeSet<String>,
    pub warnings: Vec<Warning>,
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let today = Utc::now().date_naive();
    let report = build_report(conn, m, today)?;

    if m.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for w in &report.warnings {
        eprintln!("warning: {}", w);
    }
    match &report.outcome {
        Outcome::Rate { rate } => println!("{}", fmt_pct(*rate)),
        Outcome::NoCashflows => println!(
            "No cashflows found during the time period {} -> {}",
            report
                .from
                .map(|d| d.to_string())
                .unwrap_or_else(|| "beginning".to_string()),
            report.to
        ),
        Outcome::InsufficientCashflows { message } => {
            println!("Cannot compute a return: {}", message)
        }
        Outcome::NoSolution { message } => println!("Cannot compute a return: {}", message),
    }

    if m.get_flag("debug-cashflows") {
        let rows = report
            .cashflows
            .iter()
            .map(|c| {
                vec![
                    c.date.to_string(),
                    fmt_money(&c.amount, &report.currency),
                    join(&c.inflow_accounts),
                    join(&c.outflow_accounts),
                    c.transaction
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "valuation".to_string()),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Amount", "From", "To", "Source"], rows)
        );
    }
    if m.get_flag("debug-inflows") {
        println!(">> [inflows]");
        for a in &report.inflow_accounts {
            println!("{}", a);
        }
    }
    if m.get_flag("debug-outflows") {
        println!("<< [outflows]");
        for a in &report.outflow_accounts {
            println!("{}", a);
        }
    }
    Ok(())
}

fn join(accounts: &BTreeSet<String>) -> String {
    accounts.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn matcher(m: &clap::ArgMatches, id: &str, literal: bool) -> Result<AccountMatcher> {
    let patterns: Vec<&String> = m
        .get_many::<String>(id)
        .map(|v| v.collect())
        .unwrap_or_default();
    if literal {
        Ok(AccountMatcher::prefixes(patterns))
    } else {
        Ok(AccountMatcher::regex(patterns)?)
    }
}

fn shortcut(m: &clap::ArgMatches) -> Option<Shortcut> {
    if let Some(y) = m.get_one::<i32>("year") {
        return Some(Shortcut::Year(*y));
    }
    if m.get_flag("ytd") {
        return Some(Shortcut::YearToDate);
    }
    TRAILING_WINDOWS
        .iter()
        .find(|(flag, _)| m.get_flag(flag))
        .map(|(_, years)| Shortcut::TrailingYears(*years))
}

pub fn query_from_args(
    conn: &Connection,
    m: &clap::ArgMatches,
    today: NaiveDate,
) -> Result<ReturnsQuery> {
    let literal = m.get_flag("prefix");
    let interesting = matcher(m, "account", literal)?;
    let internal = matcher(m, "internal", literal)?;

    let from = m.get_one::<String>("from").map(|s| parse_date(s)).transpose()?;
    let to = m.get_one::<String>("to").map(|s| parse_date(s)).transpose()?;
    let (from, to) = resolve_window(from, to, shortcut(m), today)?;

    let currency = match m.get_one::<String>("currency") {
        Some(c) => normalize_currency(c),
        None => get_base_currency(conn)?,
    };

    Ok(ReturnsQuery::new(interesting, to, currency)
        .with_internal(internal)
        .since(from))
}

pub fn build_report(
    conn: &Connection,
    m: &clap::ArgMatches,
    today: NaiveDate,
) -> Result<ReturnsReport> {
    let query = query_from_args(conn, m, today)?;
    let ledger = load_ledger(conn)?;
    let extraction = get_cashflows(&ledger, &query);

    let outcome = if extraction.cashflows.is_empty() {
        Outcome::NoCashflows
    } else {
        match annualized_return(&extraction.cashflows) {
            Ok(rate) => Outcome::Rate { rate },
            Err(e @ ReturnsError::InsufficientCashflows { .. }) => {
                Outcome::InsufficientCashflows {
                    message: e.to_string(),
                }
            }
            Err(e @ ReturnsError::NoConvergence(_)) => Outcome::NoSolution {
                message: e.to_string(),
            },
            Err(e) => return Err(e.into()),
        }
    };

    Ok(ReturnsReport {
        from: query.from,
        to: query.to,
        currency: query.currency,
        inflow_accounts: extraction.inflow_accounts(),
        outflow_accounts: extraction.outflow_accounts(),
        outcome,
        cashflows: extraction.cashflows,
        warnings: extraction.warnings,
    })
}
