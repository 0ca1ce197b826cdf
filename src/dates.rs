// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Months, NaiveDate};

/// Named reporting windows ending at (or within) a reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Year(i32),
    YearToDate,
    TrailingYears(u32),
}

/// Trailing windows offered on the command line, as (flag, years).
pub const TRAILING_WINDOWS: [(&str, u32); 5] =
    [("1year", 1), ("2year", 2), ("3year", 3), ("5year", 5), ("10year", 10)];

impl Shortcut {
    /// Inclusive `(from, to)` window relative to `today`.
    pub fn window(self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        match self {
            Shortcut::Year(y) => {
                let from = NaiveDate::from_ymd_opt(y, 1, 1)
                    .with_context(|| format!("Invalid year {}", y))?;
                let to = NaiveDate::from_ymd_opt(y, 12, 31)
                    .with_context(|| format!("Invalid year {}", y))?;
                Ok((from, to))
            }
            Shortcut::YearToDate => {
                let from = NaiveDate::from_ymd_opt(today.year(), 1, 1)
                    .context("Invalid year start date")?;
                Ok((from, today))
            }
            Shortcut::TrailingYears(n) => {
                // Calendar arithmetic: Feb 29 falls back to Feb 28.
                let from = today
                    .checked_sub_months(Months::new(12 * n))
                    .ok_or_else(|| anyhow!("{} years before {} is out of range", n, today))?;
                Ok((from, today))
            }
        }
    }
}

/// Resolve the reporting window from explicit bounds or a shortcut.
///
/// Shortcuts cannot be combined with explicit bounds. Without either, the
/// window runs from the beginning of the ledger to `today`.
pub fn resolve_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    shortcut: Option<Shortcut>,
    today: NaiveDate,
) -> Result<(Option<NaiveDate>, NaiveDate)> {
    match shortcut {
        Some(_) if from.is_some() || to.is_some() => Err(anyhow!(
            "Date shortcut options are mutually exclusive with --from/--to"
        )),
        Some(s) => {
            let (from, to) = s.window(today)?;
            Ok((Some(from), to))
        }
        None => {
            let to = to.unwrap_or(today);
            if let Some(from) = from {
                if from > to {
                    return Err(anyhow!("--from {} is after --to {}", from, to));
                }
            }
            Ok((from, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_year() {
        let w = Shortcut::Year(2016).window(date(2025, 5, 5)).unwrap();
        assert_eq!(w, (date(2016, 1, 1), date(2016, 12, 31)));
    }

    #[test]
    fn year_to_date() {
        let w = Shortcut::YearToDate.window(date(2025, 5, 5)).unwrap();
        assert_eq!(w, (date(2025, 1, 1), date(2025, 5, 5)));
    }

    #[test]
    fn trailing_years_clamp_leap_day() {
        let w = Shortcut::TrailingYears(1).window(date(2024, 2, 29)).unwrap();
        assert_eq!(w, (date(2023, 2, 28), date(2024, 2, 29)));
        let w = Shortcut::TrailingYears(10).window(date(2025, 6, 30)).unwrap();
        assert_eq!(w.0, date(2015, 6, 30));
    }

    #[test]
    fn shortcut_excludes_explicit_bounds() {
        let err = resolve_window(
            Some(date(2020, 1, 1)),
            None,
            Some(Shortcut::YearToDate),
            date(2025, 1, 1),
        )
        .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn defaults_to_open_start_and_today() {
        let today = date(2025, 3, 14);
        assert_eq!(resolve_window(None, None, None, today).unwrap(), (None, today));
    }

    #[test]
    fn rejects_inverted_window() {
        let err = resolve_window(
            Some(date(2021, 1, 1)),
            Some(date(2020, 1, 1)),
            None,
            date(2025, 1, 1),
        )
        .unwrap_err();
        assert!(err.to_string().contains("is after"));
    }
}
