//! Automatic method selection.
//!
//! The selector profiles an image and walks an ordered rule list; the first
//! rule whose criterion holds names the method. Rules are plain data, so
//! callers can inspect, reorder or replace them.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::Method;
use crate::image::Image;
use crate::metrics::DistributionStats;

// ============================================================================
// Rules
// ============================================================================

/// A statistic compared against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "statistic", content = "below", rename_all = "snake_case")]
pub enum Criterion {
    /// Fewer distinct values than the threshold.
    UniqueValuesBelow(usize),
    /// Shannon entropy (bits per symbol) below the threshold.
    EntropyBelow(f64),
    /// Population standard deviation below the threshold.
    StdDevBelow(f64),
}

impl Criterion {
    pub fn matches(&self, profile: &DistributionStats) -> bool {
        match *self {
            Criterion::UniqueValuesBelow(n) => profile.unique_values < n,
            Criterion::EntropyBelow(h) => profile.entropy < h,
            Criterion::StdDevBelow(s) => profile.std_dev < s,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::UniqueValuesBelow(n) => write!(f, "unique values < {n}"),
            Criterion::EntropyBelow(h) => write!(f, "entropy < {h}"),
            Criterion::StdDevBelow(s) => write!(f, "std dev < {s}"),
        }
    }
}

/// One `criterion ⇒ method` entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionRule {
    pub criterion: Criterion,
    pub method: Method,
}

/// Ordered rule table plus the method used when nothing matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionRules {
    pub rules: Vec<SelectionRule>,
    pub fallback: Method,
}

impl Default for SelectionRules {
    fn default() -> Self {
        Self {
            rules: vec![
                SelectionRule {
                    criterion: Criterion::UniqueValuesBelow(32),
                    method: Method::Rle,
                },
                SelectionRule {
                    criterion: Criterion::EntropyBelow(3.0),
                    method: Method::Differential,
                },
                SelectionRule {
                    criterion: Criterion::StdDevBelow(30.0),
                    method: Method::Differential,
                },
            ],
            fallback: Method::Huffman,
        }
    }
}

impl SelectionRules {
    /// Reject thresholds that can never be meaningfully compared.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            match rule.criterion {
                Criterion::UniqueValuesBelow(_) => {}
                Criterion::EntropyBelow(v) | Criterion::StdDevBelow(v) => {
                    if !v.is_finite() || v < 0.0 {
                        return Err(Error::invalid_parameter(
                            "selection threshold",
                            format!("'{}' needs a finite non-negative threshold", rule.criterion),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Selector
// ============================================================================

/// Outcome of a selection, with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub method: Method,
    pub profile: DistributionStats,
    /// Index of the rule that fired; `None` when the fallback was used.
    pub rule: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct AutoSelector {
    rules: SelectionRules,
}

impl AutoSelector {
    pub fn new(rules: SelectionRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &SelectionRules {
        &self.rules
    }

    /// Profile `image` over all its elements.
    pub fn profile(image: &Image) -> DistributionStats {
        DistributionStats::of(image.pixels())
    }

    pub fn select(&self, image: &Image) -> Selection {
        let profile = Self::profile(image);
        let hit = self
            .rules
            .rules
            .iter()
            .position(|r| r.criterion.matches(&profile));
        let method = hit.map_or(self.rules.fallback, |i| self.rules.rules[i].method);
        debug!(
            %method,
            rule = ?hit,
            unique = profile.unique_values,
            entropy = profile.entropy,
            std_dev = profile.std_dev,
            "method selected"
        );
        Selection {
            method,
            profile,
            rule: hit,
        }
    }
}
