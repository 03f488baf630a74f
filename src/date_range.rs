//! Inclusive calendar-date intervals and the interval arithmetic shared by
//! every overlap query in the crate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An inclusive `[start, end]` calendar-date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Intersection of a set of ranges: the latest start and the earliest end.
    ///
    /// Returns `None` for empty input or when the computed start falls after
    /// the computed end (no common overlap). The result does not depend on
    /// input order.
    pub fn intersect_all<I>(ranges: I) -> Option<DateRange>
    where
        I: IntoIterator<Item = DateRange>,
    {
        let mut result: Option<DateRange> = None;
        for range in ranges {
            result = Some(match result {
                None => range,
                Some(acc) => DateRange {
                    start: acc.start.max(range.start),
                    end: acc.end.min(range.end),
                },
            });
        }
        result.filter(|r| r.start <= r.end)
    }

    /// Union bounds of a set of ranges: the earliest start and the latest end.
    ///
    /// Returns `None` for empty input.
    pub fn union_all<I>(ranges: I) -> Option<DateRange>
    where
        I: IntoIterator<Item = DateRange>,
    {
        let mut result: Option<DateRange> = None;
        for range in ranges {
            result = Some(match result {
                None => range,
                Some(acc) => DateRange {
                    start: acc.start.min(range.start),
                    end: acc.end.max(range.end),
                },
            });
        }
        result
    }
}
