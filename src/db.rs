// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::ReturnsError;
use crate::models::{Amount, Cost, Ledger, Posting, Price, Transaction};
use crate::utils::parse_date;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Returnclip", "returnclip"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("returnclip.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    open_at(&db_path()?)
}

pub fn open_at(path: &Path) -> Result<Connection> {
    let mut conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        narration TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

    -- One row per leg. cost is per unit; price annotates a conversion.
    CREATE TABLE IF NOT EXISTS postings(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        txn_id INTEGER NOT NULL,
        account TEXT NOT NULL,
        units TEXT NOT NULL,
        currency TEXT NOT NULL,
        cost TEXT,
        cost_currency TEXT,
        price TEXT,
        price_currency TEXT,
        FOREIGN KEY(txn_id) REFERENCES transactions(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_postings_txn ON postings(txn_id);
    CREATE INDEX IF NOT EXISTS idx_postings_account ON postings(account);

    -- 1 base = rate quote, as of date
    CREATE TABLE IF NOT EXISTS prices(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        base TEXT NOT NULL,
        quote TEXT NOT NULL,
        rate TEXT NOT NULL,
        UNIQUE(date, base, quote)
    );
    "#,
    )?;
    Ok(())
}

pub fn insert_transaction(conn: &Connection, txn: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(date, narration) VALUES (?1, ?2)",
        params![txn.date.to_string(), txn.narration],
    )?;
    let txn_id = conn.last_insert_rowid();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO postings(txn_id, account, units, currency, cost, cost_currency, price, price_currency)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
    )?;
    for p in &txn.postings {
        stmt.execute(params![
            txn_id,
            p.account,
            p.units.number.to_string(),
            p.units.currency,
            p.cost.as_ref().map(|c| c.number.to_string()),
            p.cost.as_ref().map(|c| c.currency.clone()),
            p.price.as_ref().map(|a| a.number.to_string()),
            p.price.as_ref().map(|a| a.currency.clone()),
        ])?;
    }
    Ok(txn_id)
}

pub fn upsert_price(conn: &Connection, price: &Price) -> Result<()> {
    conn.execute(
        "INSERT INTO prices(date, base, quote, rate) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(date, base, quote) DO UPDATE SET rate=excluded.rate",
        params![
            price.date.to_string(),
            price.base,
            price.quote,
            price.rate.to_string()
        ],
    )?;
    Ok(())
}

fn stored_decimal(raw: &str, what: &str, txn: i64) -> Result<Decimal> {
    Decimal::from_str_exact(raw)
        .with_context(|| format!("Invalid stored {} '{}' in transaction {}", what, raw, txn))
}

/// Pair an optional number with its currency; one without the other is a broken row.
fn paired(
    number: Option<String>,
    currency: Option<String>,
    what: &str,
    posting_id: i64,
    txn: i64,
) -> Result<Option<(Decimal, String)>> {
    match (number, currency) {
        (None, None) => Ok(None),
        (Some(n), Some(c)) => Ok(Some((stored_decimal(&n, what, txn)?, c))),
        _ => Err(ReturnsError::MalformedInput(format!(
            "posting {} has a {} without both number and currency",
            posting_id, what
        ))
        .into()),
    }
}

/// All transactions in date order, each with its postings in entry order.
///
/// A posting that does not belong to a stored transaction is a broken
/// invariant of the store and aborts the load.
pub fn load_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.txn_id, t.id, t.date, t.narration, p.account, p.units, p.currency,
                p.cost, p.cost_currency, p.price, p.price_currency
         FROM postings p LEFT JOIN transactions t ON p.txn_id = t.id
         ORDER BY t.date, t.id, p.id",
    )?;
    let mut rows = stmt.query([])?;

    let mut out: Vec<Transaction> = Vec::new();
    while let Some(r) = rows.next()? {
        let posting_id: i64 = r.get(0)?;
        let txn_ref: i64 = r.get(1)?;
        let txn_id: Option<i64> = r.get(2)?;
        let Some(txn_id) = txn_id else {
            return Err(ReturnsError::MalformedInput(format!(
                "posting {} references missing transaction {}",
                posting_id, txn_ref
            ))
            .into());
        };

        if out.last().is_none_or(|t| t.id != txn_id) {
            let date_s: String = r.get(3)?;
            let date = parse_date(&date_s)
                .with_context(|| format!("Invalid date in transaction {}", txn_id))?;
            out.push(Transaction {
                id: txn_id,
                date,
                narration: r.get(4)?,
                postings: Vec::new(),
            });
        }

        let units_s: String = r.get(6)?;
        let units = Amount::new(stored_decimal(&units_s, "units", txn_id)?, r.get::<_, String>(7)?);
        let cost = paired(r.get(8)?, r.get(9)?, "cost", posting_id, txn_id)?
            .map(|(number, currency)| Cost { number, currency });
        let price = paired(r.get(10)?, r.get(11)?, "price", posting_id, txn_id)?
            .map(|(number, currency)| Amount::new(number, currency));

        if let Some(txn) = out.last_mut() {
            txn.postings.push(Posting {
                account: r.get(5)?,
                units,
                cost,
                price,
            });
        }
    }
    Ok(out)
}

pub fn load_prices(conn: &Connection) -> Result<Vec<Price>> {
    let mut stmt = conn.prepare("SELECT date, base, quote, rate FROM prices ORDER BY date, id")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut prices = Vec::new();
    for row in rows {
        let (date_s, base, quote, rate_s) = row?;
        let date = parse_date(&date_s)?;
        let rate = Decimal::from_str_exact(&rate_s)
            .with_context(|| format!("Invalid stored rate '{}' for {}/{}", rate_s, base, quote))?;
        prices.push(Price {
            date,
            base,
            quote,
            rate,
        });
    }
    Ok(prices)
}

pub fn load_ledger(conn: &Connection) -> Result<Ledger> {
    Ok(Ledger::new(load_transactions(conn)?, load_prices(conn)?))
}
