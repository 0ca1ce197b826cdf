// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{Amount, Cost, Posting};
use crate::prices::PriceMap;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Holdings grouped into lots by commodity and acquisition cost.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    lots: BTreeMap<(String, Option<Cost>), Decimal>,
}

/// Market value of a set of holdings in one currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketValue {
    pub amount: Decimal,
    /// Holdings left out of `amount` because no rate reaches the target currency.
    pub unpriced: Vec<Amount>,
}

impl Inventory {
    pub fn add_posting(&mut self, posting: &Posting) {
        let key = (posting.units.currency.clone(), posting.cost.clone());
        let units = self.lots.entry(key.clone()).or_default();
        *units += posting.units.number;
        if units.is_zero() {
            self.lots.remove(&key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Value every lot at market as of `date`.
    ///
    /// A lot is priced directly in `currency` when possible, otherwise through
    /// its cost currency. Lots reachable by neither route end up in `unpriced`.
    pub fn market_value(&self, currency: &str, prices: &PriceMap, date: NaiveDate) -> MarketValue {
        let mut out = MarketValue::default();
        for ((commodity, cost), units) in &self.lots {
            let held = Amount::new(*units, commodity.clone());
            let direct = prices.convert(&held, currency, date);
            let via_cost = || {
                let cost = cost.as_ref()?;
                let in_cost_ccy = prices.get_price(commodity, &cost.currency, date)?;
                let to_target = prices.get_price(&cost.currency, currency, date)?;
                Some(*units * in_cost_ccy * to_target)
            };
            match direct.or_else(via_cost) {
                Some(value) => out.amount += value,
                None => out.unpriced.push(held),
            }
        }
        out
    }
}
