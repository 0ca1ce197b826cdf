// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Money-weighted annualized return of an irregular cashflow series.
//!
//! Time is measured as actual days / 365 from the earliest cashflow, which
//! is what spreadsheet `XNPV`/`XIRR` use.

use crate::cashflows::Cashflow;
use crate::error::{Result, ReturnsError};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeSet;

pub const DEFAULT_GUESS: f64 = 0.1;
const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-10;
const FALLBACK_GUESSES: [f64; 5] = [-0.5, 0.0, 0.5, 1.0, 2.0];
const MIN_RATE: f64 = -0.9999;
const MAX_RATE: f64 = 100.0;
const MAX_BISECTIONS: usize = 200;
const BRACKETS: [f64; 11] = [
    MIN_RATE, -0.99, -0.9, -0.5, 0.0, 0.5, 1.0, 2.0, 5.0, 10.0, MAX_RATE,
];

fn years_between(t0: NaiveDate, t: NaiveDate) -> f64 {
    (t - t0).num_days() as f64 / 365.0
}

/// Net present value at `rate`, discounted to the earliest date in `flows`.
pub fn xnpv(rate: f64, flows: &[(NaiveDate, f64)]) -> f64 {
    let Some(t0) = flows.iter().map(|(d, _)| *d).min() else {
        return 0.0;
    };
    flows
        .iter()
        .map(|(d, amount)| amount / (1.0 + rate).powf(years_between(t0, *d)))
        .sum()
}

fn xnpv_and_derivative(rate: f64, t0: NaiveDate, flows: &[(NaiveDate, f64)]) -> (f64, f64) {
    let mut npv = 0.0;
    let mut dnpv = 0.0;
    for (d, amount) in flows {
        let t = years_between(t0, *d);
        let discount = (1.0 + rate).powf(t);
        npv += amount / discount;
        // d/dr [a * (1+r)^-t] = -t * a * (1+r)^(-t-1)
        dnpv -= t * amount / (discount * (1.0 + rate));
    }
    (npv, dnpv)
}

fn newton(flows: &[(NaiveDate, f64)], t0: NaiveDate, guess: f64) -> Option<f64> {
    let mut rate = guess.clamp(MIN_RATE, MAX_RATE);
    for _ in 0..MAX_ITERATIONS {
        let (npv, dnpv) = xnpv_and_derivative(rate, t0, flows);
        if !npv.is_finite() || !dnpv.is_finite() || dnpv.abs() < f64::EPSILON {
            return None;
        }
        // Steps past -100% would leave the domain; hold them at the edge instead.
        let next = (rate - npv / dnpv).clamp(MIN_RATE, MAX_RATE);
        if (next - rate).abs() < TOLERANCE {
            // Pinned at a bound is not a root.
            return (next > MIN_RATE && next < MAX_RATE).then_some(next);
        }
        rate = next;
    }
    None
}

/// Bisection over the first bracket in [`BRACKETS`] where the NPV changes sign.
fn bisect(flows: &[(NaiveDate, f64)], t0: NaiveDate) -> Option<f64> {
    let npv = |rate: f64| xnpv_and_derivative(rate, t0, flows).0;
    let (mut lo, mut hi) = BRACKETS.windows(2).map(|w| (w[0], w[1])).find(|(a, b)| {
        let (fa, fb) = (npv(*a), npv(*b));
        fa.is_finite() && fb.is_finite() && fa.signum() != fb.signum()
    })?;
    let mut f_lo = npv(lo);
    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        let f_mid = npv(mid);
        if f_mid == 0.0 || hi - lo < TOLERANCE {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Check that `flows` can have an internal rate of return at all.
fn validate(flows: &[(NaiveDate, f64)]) -> Result<()> {
    let distinct_dates = flows.iter().map(|(d, _)| *d).collect::<BTreeSet<_>>().len();
    if distinct_dates < 2 {
        return Err(ReturnsError::InsufficientCashflows { distinct_dates });
    }
    let has_positive = flows.iter().any(|(_, a)| *a > 0.0);
    let has_negative = flows.iter().any(|(_, a)| *a < 0.0);
    if !(has_positive && has_negative) {
        return Err(ReturnsError::NoConvergence(
            "cashflows never change sign".to_string(),
        ));
    }
    Ok(())
}

/// Rate at which the net present value of `flows` is zero, starting the
/// search at `guess`.
pub fn xirr_with_guess(flows: &[(NaiveDate, f64)], guess: f64) -> Result<f64> {
    validate(flows)?;
    let mut sorted = flows.to_vec();
    sorted.sort_by_key(|(d, _)| *d);
    let t0 = sorted[0].0;

    std::iter::once(guess)
        .chain(FALLBACK_GUESSES)
        .find_map(|seed| newton(&sorted, t0, seed))
        .or_else(|| bisect(&sorted, t0))
        .ok_or_else(|| {
            ReturnsError::NoConvergence(format!(
                "no rate between {:.2}% and {:.0}% zeroes the net present value",
                MIN_RATE * 100.0,
                MAX_RATE * 100.0
            ))
        })
}

pub fn xirr(flows: &[(NaiveDate, f64)]) -> Result<f64> {
    xirr_with_guess(flows, DEFAULT_GUESS)
}

/// Annualized money-weighted return of an extracted cashflow series.
///
/// Amounts stay exact decimals up to this point and are only turned into
/// floating point for the solve.
pub fn annualized_return(cashflows: &[Cashflow]) -> Result<f64> {
    // Decimal always has an f64 approximation; its range is far inside f64's.
    let flows: Vec<(NaiveDate, f64)> = cashflows
        .iter()
        .map(|cf| (cf.date, cf.amount.to_f64().unwrap_or_default()))
        .collect();
    xirr(&flows)
}
