// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{load_prices, upsert_price};
use crate::error::ReturnsError;
use crate::models::{Amount, Price};
use crate::prices::PriceMap;
use crate::utils::{maybe_print_json, normalize_currency, parse_date, parse_decimal, pretty_table};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("convert", sub)) => {
            let date = parse_date(sub.get_one::<String>("date").unwrap())?;
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let from = normalize_currency(sub.get_one::<String>("from").unwrap());
            let to = normalize_currency(sub.get_one::<String>("to").unwrap());
            let res = convert(conn, date, &Amount::new(amount, from.clone()), &to)?;
            println!("{} {} -> {:.4} {}", amount, from, res, to);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let price = Price {
        date: parse_date(sub.get_one::<String>("date").unwrap())?,
        base: normalize_currency(sub.get_one::<String>("base").unwrap()),
        quote: normalize_currency(sub.get_one::<String>("quote").unwrap()),
        rate: parse_decimal(sub.get_one::<String>("rate").unwrap())?,
    };
    if price.rate <= Decimal::ZERO {
        return Err(anyhow!("Rate must be positive, got {}", price.rate));
    }
    upsert_price(conn, &price)?;
    println!(
        "Recorded {} 1 {} = {} {}",
        price.date, price.base, price.rate, price.quote
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let base = sub.get_one::<String>("base").map(|s| normalize_currency(s));
    let mut prices = load_prices(conn)?;
    if let Some(b) = &base {
        prices.retain(|p| &p.base == b);
    }
    prices.reverse();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &prices)? {
        let rows = prices
            .into_iter()
            .map(|p| vec![p.date.to_string(), p.base, p.quote, p.rate.to_string()])
            .collect();
        println!("{}", pretty_table(&["Date", "Base", "Quote", "Rate"], rows));
    }
    Ok(())
}

/// Convert with the stored price history; a missing rate is an error here.
pub fn convert(conn: &Connection, date: NaiveDate, amount: &Amount, to: &str) -> Result<Decimal> {
    let map = PriceMap::build(&load_prices(conn)?);
    map.convert(amount, to, date).ok_or_else(|| {
        ReturnsError::ConversionUnavailable {
            amount: amount.to_string(),
            currency: to.to_string(),
            date,
        }
        .into()
    })
}
