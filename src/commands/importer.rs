// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{insert_transaction, upsert_price};
use crate::models::{Amount, Posting, Price, Transaction};
use crate::utils::{normalize_currency, parse_date, parse_decimal};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::info;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => {
            let path = sub.get_one::<String>("path").unwrap().trim();
            let n = import_transactions(conn, path)?;
            println!("Imported {} transactions from {}", n, path);
            Ok(())
        }
        Some(("prices", sub)) => {
            let path = sub.get_one::<String>("path").unwrap().trim();
            let n = import_prices(conn, path)?;
            println!("Imported {} prices from {}", n, path);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn field(rec: &StringRecord, idx: usize) -> Option<&str> {
    rec.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// A posting row as read; `units` is `None` when the amount is left for
/// the importer to infer.
struct PendingPosting {
    account: String,
    units: Option<Amount>,
    cost: Option<(Decimal, String)>,
    price: Option<(Decimal, String)>,
}

struct PendingTransaction {
    key: String,
    line: u64,
    date: NaiveDate,
    narration: String,
    postings: Vec<PendingPosting>,
}

fn optional_pair(
    rec: &StringRecord,
    number_idx: usize,
    currency_idx: usize,
    what: &str,
    line: u64,
) -> Result<Option<(Decimal, String)>> {
    match (field(rec, number_idx), field(rec, currency_idx)) {
        (None, None) => Ok(None),
        (Some(n), Some(c)) => {
            let number =
                parse_decimal(n).with_context(|| format!("Invalid {} on line {}", what, line))?;
            Ok(Some((number, normalize_currency(c))))
        }
        _ => Err(anyhow!(
            "Line {}: {} needs both a number and a currency",
            line,
            what
        )),
    }
}

fn parse_posting(rec: &StringRecord, line: u64) -> Result<PendingPosting> {
    let account = field(rec, 3)
        .with_context(|| format!("Line {}: account missing", line))?
        .to_string();
    let units = match (field(rec, 4), field(rec, 5)) {
        (None, None) => None,
        (Some(n), Some(c)) => {
            let number =
                parse_decimal(n).with_context(|| format!("Invalid units on line {}", line))?;
            Some(Amount::new(number, normalize_currency(c)))
        }
        _ => return Err(anyhow!("Line {}: units need both a number and a currency", line)),
    };
    let cost = optional_pair(rec, 6, 7, "cost", line)?;
    let price = optional_pair(rec, 8, 9, "price", line)?;
    if units.is_none() && (cost.is_some() || price.is_some()) {
        return Err(anyhow!("Line {}: cost or price given without units", line));
    }
    Ok(PendingPosting {
        account,
        units,
        cost,
        price,
    })
}

/// Complete a transaction: fill in at most one elided amount and require
/// the result to balance.
fn finish(pending: PendingTransaction) -> Result<Transaction> {
    let elided = pending.postings.iter().filter(|p| p.units.is_none()).count();
    if elided > 1 {
        return Err(anyhow!(
            "Transaction '{}' (line {}) leaves more than one amount blank",
            pending.key,
            pending.line
        ));
    }

    let mut txn = Transaction {
        id: 0,
        date: pending.date,
        narration: pending.narration,
        postings: Vec::with_capacity(pending.postings.len()),
    };
    let mut blank_account = None;
    for p in pending.postings {
        let Some(units) = p.units else {
            blank_account = Some(p.account);
            continue;
        };
        let mut posting = Posting::new(p.account, units);
        if let Some((n, c)) = p.cost {
            posting = posting.with_cost(n, c);
        }
        if let Some((n, c)) = p.price {
            posting = posting.with_price(n, c);
        }
        txn.postings.push(posting);
    }

    if let Some(account) = blank_account {
        let residuals = txn.residuals();
        let [residual] = residuals.as_slice() else {
            return Err(anyhow!(
                "Transaction '{}' (line {}): cannot infer blank amount for {} from {} currencies",
                pending.key,
                pending.line,
                account,
                residuals.len()
            ));
        };
        let fill = Amount::new(-residual.number, residual.currency.clone());
        txn.postings.push(Posting::new(account, fill));
    }

    let residuals = txn.residuals();
    if !residuals.is_empty() {
        let detail: Vec<String> = residuals.iter().map(ToString::to_string).collect();
        return Err(anyhow!(
            "Transaction '{}' (line {}) does not balance: {}",
            pending.key,
            pending.line,
            detail.join(", ")
        ));
    }
    Ok(txn)
}

/// Read grouped posting rows; consecutive rows sharing a `txn` key form one transaction.
pub fn read_transactions(path: &str) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;

    let mut out = Vec::new();
    let mut current: Option<PendingTransaction> = None;
    for result in rdr.records() {
        let rec = result?;
        let line = rec.position().map(|p| p.line()).unwrap_or_default();
        let key = field(&rec, 0)
            .with_context(|| format!("Line {}: txn key missing", line))?
            .to_string();
        let posting = parse_posting(&rec, line)?;

        if let Some(open) = current.as_mut().filter(|t| t.key == key) {
            if let Some(raw) = field(&rec, 1) {
                let date = parse_date(raw)?;
                if date != open.date {
                    return Err(anyhow!(
                        "Line {}: transaction '{}' changes date from {} to {}",
                        line,
                        key,
                        open.date,
                        date
                    ));
                }
            }
            open.postings.push(posting);
            continue;
        }

        if let Some(done) = current.take() {
            out.push(finish(done)?);
        }
        let date_raw = field(&rec, 1).with_context(|| format!("Line {}: date missing", line))?;
        let date = parse_date(date_raw)
            .with_context(|| format!("Invalid transaction date on line {}", line))?;
        current = Some(PendingTransaction {
            key,
            line,
            date,
            narration: field(&rec, 2).unwrap_or_default().to_string(),
            postings: vec![posting],
        });
    }
    if let Some(done) = current.take() {
        out.push(finish(done)?);
    }
    Ok(out)
}

pub fn import_transactions(conn: &mut Connection, path: &str) -> Result<usize> {
    let txns = read_transactions(path)?;
    let tx = conn.transaction()?;
    for txn in &txns {
        insert_transaction(&tx, txn)?;
    }
    tx.commit()?;
    info!(count = txns.len(), path, "imported transactions");
    Ok(txns.len())
}

pub fn import_prices(conn: &mut Connection, path: &str) -> Result<usize> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;

    let tx = conn.transaction()?;
    let mut count = 0;
    for result in rdr.records() {
        let rec = result?;
        let line = rec.position().map(|p| p.line()).unwrap_or_default();
        let date_raw = field(&rec, 0).with_context(|| format!("Line {}: date missing", line))?;
        let base = field(&rec, 1).with_context(|| format!("Line {}: base missing", line))?;
        let quote = field(&rec, 2).with_context(|| format!("Line {}: quote missing", line))?;
        let rate_raw = field(&rec, 3).with_context(|| format!("Line {}: rate missing", line))?;
        let price = Price {
            date: parse_date(date_raw)?,
            base: normalize_currency(base),
            quote: normalize_currency(quote),
            rate: parse_decimal(rate_raw)
                .with_context(|| format!("Invalid rate on line {}", line))?,
        };
        if price.rate <= Decimal::ZERO {
            return Err(anyhow!("Line {}: rate must be positive", line));
        }
        upsert_price(&tx, &price)?;
        count += 1;
    }
    tx.commit()?;
    info!(count, path, "imported prices");
    Ok(count)
}
