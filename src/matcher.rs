// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Account selection by pattern.
//!
//! Patterns always match from the start of the account path, so
//! `Assets:Brokerage` selects `Assets:Brokerage:Vanguard` but not
//! `Liabilities:Assets:Brokerage`.

use crate::error::{Result, ReturnsError};
use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct AccountMatcher {
    patterns: Vec<Regex>,
}

impl AccountMatcher {
    /// Compile regular expressions anchored at the start of the account path.
    pub fn regex<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for p in patterns {
            let pattern = p.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let re = Regex::new(&format!("^(?:{})", pattern)).map_err(|source| {
                ReturnsError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                }
            })?;
            compiled.push(re);
        }
        Ok(Self { patterns: compiled })
    }

    /// Literal account-path prefixes.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .filter_map(|p| Regex::new(&format!("^{}", regex::escape(&p))).ok())
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, account: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(account))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
