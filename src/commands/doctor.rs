// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::load_ledger;
use crate::prices::PriceMap;
use crate::utils::{get_base_currency, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use std::collections::BTreeSet;

pub fn handle(conn: &Connection) -> Result<()> {
    let rows = find_issues(conn)?;
    if rows.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

pub fn find_issues(conn: &Connection) -> Result<Vec<Vec<String>>> {
    let ledger = load_ledger(conn)?;
    let base = get_base_currency(conn)?;
    let prices = PriceMap::build(&ledger.prices);
    let mut rows = Vec::new();

    // 1) Transactions whose weights do not sum to zero
    for txn in &ledger.transactions {
        for residual in txn.residuals() {
            rows.push(vec![
                "unbalanced".into(),
                format!("{} txn {} off by {}", txn.date, txn.id, residual),
            ]);
        }
    }

    // 2) Weights with no rate into the base currency on their date
    let mut seen = BTreeSet::new();
    for txn in &ledger.transactions {
        for p in &txn.postings {
            let weight = p.weight();
            if prices.convert(&weight, &base, txn.date).is_none()
                && seen.insert((txn.date, weight.currency.clone()))
            {
                rows.push(vec![
                    "missing_price".into(),
                    format!("{} {} -> {}", txn.date, weight.currency, base),
                ]);
            }
        }
    }
    Ok(rows)
}
