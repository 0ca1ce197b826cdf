// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{Amount, Price};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Historical rates indexed by `(base, quote)`.
#[derive(Debug, Clone, Default)]
pub struct PriceMap {
    rates: HashMap<(String, String), Vec<(NaiveDate, Decimal)>>,
}

impl PriceMap {
    pub fn build(prices: &[Price]) -> Self {
        let mut rates: HashMap<(String, String), Vec<(NaiveDate, Decimal)>> = HashMap::new();
        for p in prices {
            rates
                .entry((p.base.clone(), p.quote.clone()))
                .or_default()
                .push((p.date, p.rate));
        }
        for series in rates.values_mut() {
            // Stable sort, so for duplicate dates the last one loaded wins.
            series.sort_by_key(|(date, _)| *date);
            let mut deduped: Vec<(NaiveDate, Decimal)> = Vec::with_capacity(series.len());
            for (date, rate) in series.drain(..) {
                match deduped.last_mut() {
                    Some(last) if last.0 == date => last.1 = rate,
                    _ => deduped.push((date, rate)),
                }
            }
            *series = deduped;
        }
        Self { rates }
    }

    fn latest(&self, base: &str, quote: &str, date: NaiveDate) -> Option<Decimal> {
        let series = self.rates.get(&(base.to_string(), quote.to_string()))?;
        let idx = series.partition_point(|(d, _)| *d <= date);
        if idx == 0 {
            return None;
        }
        Some(series[idx - 1].1)
    }

    /// Closest on-or-before rate for `base` in `quote`, falling back to the
    /// reciprocal of the inverse pair.
    pub fn get_price(&self, base: &str, quote: &str, date: NaiveDate) -> Option<Decimal> {
        if base == quote {
            return Some(Decimal::ONE);
        }
        if let Some(r) = self.latest(base, quote, date) {
            return Some(r);
        }
        match self.latest(quote, base, date) {
            Some(r) if !r.is_zero() => Some(Decimal::ONE / r),
            _ => None,
        }
    }

    pub fn convert(&self, amount: &Amount, currency: &str, date: NaiveDate) -> Option<Decimal> {
        self.get_price(&amount.currency, currency, date)
            .map(|rate| amount.number * rate)
    }
}
