// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::load_transactions;
use crate::matcher::AccountMatcher;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("list", sub)) = m.subcommand() {
        list(conn, sub)?;
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    r.txn.to_string(),
                    r.narration.clone(),
                    r.account.clone(),
                    r.units.clone(),
                    r.cost.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Txn", "Narration", "Account", "Units", "Cost"], rows)
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct PostingRow {
    pub date: String,
    pub txn: i64,
    pub narration: String,
    pub account: String,
    pub units: String,
    pub cost: String,
}

/// Postings newest first, optionally restricted to transactions touching an account prefix.
pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<PostingRow>> {
    let filter = sub
        .get_one::<String>("account")
        .map(|a| AccountMatcher::prefixes([a]));
    let limit = sub.get_one::<usize>("limit").copied();

    let mut txns = load_transactions(conn)?;
    txns.reverse();
    let mut data = Vec::new();
    for txn in txns
        .iter()
        .filter(|t| {
            filter
                .as_ref()
                .is_none_or(|f| t.postings.iter().any(|p| f.matches(&p.account)))
        })
        .take(limit.unwrap_or(usize::MAX))
    {
        for p in &txn.postings {
            data.push(PostingRow {
                date: txn.date.to_string(),
                txn: txn.id,
                narration: txn.narration.clone(),
                account: p.account.clone(),
                units: p.units.to_string(),
                cost: p
                    .cost
                    .as_ref()
                    .map(|c| format!("{} {}", c.number, c.currency))
                    .unwrap_or_default(),
            });
        }
    }
    Ok(data)
}
