// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{get_base_currency, normalize_currency, pretty_table, set_base_currency};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-currency", sub)) => {
            let ccy = normalize_currency(sub.get_one::<String>("currency").unwrap());
            if ccy.is_empty() {
                return Err(anyhow!("Currency must not be empty"));
            }
            set_base_currency(conn, &ccy)?;
            println!("Base currency set to {}", ccy);
        }
        Some(("show", _)) => {
            let base = get_base_currency(conn)?;
            println!(
                "{}",
                pretty_table(&["Setting", "Value"], vec![vec!["base_currency".into(), base]])
            );
        }
        _ => {}
    }
    Ok(())
}
