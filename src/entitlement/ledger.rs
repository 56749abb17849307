//! Per-period usage counters with lazy rollover.
//!
//! Daily records are keyed by calendar date, weekly records by the Monday of
//! the ISO week. A record whose key no longer matches the current period is
//! replaced with an all-zero record before any read or increment; the reset
//! is lossy and is the only mutation path for stale records.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::catalog::Feature;

/// The Monday on or before `date`. A Sunday maps to the Monday six days
/// prior, not the next one.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DailyUsage {
    pub date: NaiveDate,
    #[serde(default)]
    counts: HashMap<Feature, u32>,
}

impl DailyUsage {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            counts: HashMap::new(),
        }
    }

    pub fn reset_if_stale(&mut self, today: NaiveDate) {
        if self.date != today {
            self.date = today;
            self.counts.clear();
        }
    }

    pub fn count(&self, feature: Feature) -> u32 {
        self.counts.get(&feature).copied().unwrap_or(0)
    }

    /// Rollover-aware read that leaves the record untouched: a stale record
    /// reads as zero.
    pub fn current_count(&self, feature: Feature, today: NaiveDate) -> u32 {
        if self.date != today {
            0
        } else {
            self.count(feature)
        }
    }

    pub fn record(&mut self, feature: Feature, amount: u32) {
        let count = self.counts.entry(feature).or_insert(0);
        *count = count.saturating_add(amount);
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeeklyUsage {
    pub week_start: NaiveDate,
    #[serde(default)]
    counts: HashMap<Feature, u32>,
}

impl WeeklyUsage {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            week_start: week_start_of(today),
            counts: HashMap::new(),
        }
    }

    pub fn reset_if_stale(&mut self, today: NaiveDate) {
        let current = week_start_of(today);
        if self.week_start != current {
            self.week_start = current;
            self.counts.clear();
        }
    }

    pub fn count(&self, feature: Feature) -> u32 {
        self.counts.get(&feature).copied().unwrap_or(0)
    }

    pub fn current_count(&self, feature: Feature, today: NaiveDate) -> u32 {
        if self.week_start != week_start_of(today) {
            0
        } else {
            self.count(feature)
        }
    }

    pub fn record(&mut self, feature: Feature, amount: u32) {
        let count = self.counts.entry(feature).or_insert(0);
        *count = count.saturating_add(amount);
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
