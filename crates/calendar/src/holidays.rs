//! Holiday table and the built-in US market holiday rules.

use crate::exchange::{hm, ExchangeGroup};
use barsmith_core::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A market holiday or early-close day for one exchange group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub exchange_group: ExchangeGroup,
    pub name: String,
    /// Market fully closed. When false this is an early-close day.
    pub is_closed: bool,
    /// Regular close on an early-close day; group default when `None`.
    pub early_close_time: Option<NaiveTime>,
}

impl Holiday {
    /// A full-day closure.
    pub fn closed(date: NaiveDate, exchange_group: ExchangeGroup, name: impl Into<String>) -> Self {
        Self {
            date,
            exchange_group,
            name: name.into(),
            is_closed: true,
            early_close_time: None,
        }
    }

    /// An early-close day.
    pub fn early_close(
        date: NaiveDate,
        exchange_group: ExchangeGroup,
        name: impl Into<String>,
        close: Option<NaiveTime>,
    ) -> Self {
        Self {
            date,
            exchange_group,
            name: name.into(),
            is_closed: false,
            early_close_time: close,
        }
    }
}

/// Holidays keyed by (date, exchange group). At most one row per key.
#[derive(Debug, Clone, Default)]
pub struct HolidayTable {
    rows: BTreeMap<(NaiveDate, ExchangeGroup), Holiday>,
}

impl HolidayTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the rule-based US holidays for both US groups.
    pub fn us_builtin(first_year: i32, last_year: i32) -> Self {
        let mut table = Self::new();
        for year in first_year..=last_year {
            for group in [ExchangeGroup::UsEquity, ExchangeGroup::UsOptions] {
                for holiday in us_market_holidays(year, group) {
                    // Rule dates never collide within a year.
                    table
                        .rows
                        .entry((holiday.date, holiday.exchange_group))
                        .or_insert(holiday);
                }
            }
        }
        table
    }

    /// Insert a holiday, rejecting a second row for the same (date, group).
    pub fn insert(&mut self, holiday: Holiday) -> Result<()> {
        let key = (holiday.date, holiday.exchange_group);
        if self.rows.contains_key(&key) {
            return Err(Error::DuplicateHoliday {
                date: holiday.date,
                group: holiday.exchange_group.as_str(),
            });
        }
        self.rows.insert(key, holiday);
        Ok(())
    }

    /// Remove and return the row for (date, group).
    pub fn remove(&mut self, date: NaiveDate, group: ExchangeGroup) -> Option<Holiday> {
        self.rows.remove(&(date, group))
    }

    /// Look up the row for (date, group).
    pub fn get(&self, date: NaiveDate, group: ExchangeGroup) -> Option<&Holiday> {
        self.rows.get(&(date, group))
    }

    /// Rows for one group within `[start, end]`, in date order.
    pub fn between(&self, start: NaiveDate, end: NaiveDate, group: ExchangeGroup) -> Vec<&Holiday> {
        if start > end {
            return Vec::new();
        }
        self.rows
            .range((start, group)..=(end, group))
            .filter(|((_, g), _)| *g == group)
            .map(|(_, holiday)| holiday)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// NYSE-style holidays and early closes for one year.
pub fn us_market_holidays(year: i32, group: ExchangeGroup) -> Vec<Holiday> {
    let mut out = Vec::with_capacity(14);
    let mut closed = |date: Option<NaiveDate>, name: &str| {
        if let Some(date) = date {
            out.push(Holiday::closed(date, group, name));
        }
    };

    // New Year's Day: Sunday moves to Monday; Saturday is not observed.
    if let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) {
        match jan1.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => closed(jan1.succ_opt(), "New Year's Day"),
            _ => closed(Some(jan1), "New Year's Day"),
        }
    }
    if year >= 1998 {
        closed(nth_weekday(year, 1, Weekday::Mon, 3), "Martin Luther King Jr. Day");
    }
    closed(nth_weekday(year, 2, Weekday::Mon, 3), "Presidents' Day");
    closed(
        easter_sunday(year).map(|easter| easter - Duration::days(2)),
        "Good Friday",
    );
    closed(last_weekday(year, 5, Weekday::Mon), "Memorial Day");
    if year >= 2022 {
        closed(observed(year, 6, 19), "Juneteenth National Independence Day");
    }
    let independence = observed(year, 7, 4);
    closed(independence, "Independence Day");
    closed(nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day");
    let thanksgiving = nth_weekday(year, 11, Weekday::Thu, 4);
    closed(thanksgiving, "Thanksgiving Day");
    closed(observed(year, 12, 25), "Christmas Day");

    let early = |date: NaiveDate, name: &str| {
        Holiday::early_close(date, group, name, Some(hm(13, 0)))
    };

    if let Some(jul3) = NaiveDate::from_ymd_opt(year, 7, 3) {
        if is_weekday(jul3) && Some(jul3) != independence && jul3.weekday() != Weekday::Fri {
            out.push(early(jul3, "Independence Day Eve"));
        }
    }
    if let Some(friday) = thanksgiving.and_then(|t| t.succ_opt()) {
        out.push(early(friday, "Day after Thanksgiving"));
    }
    if let Some(dec24) = NaiveDate::from_ymd_opt(year, 12, 24) {
        if is_weekday(dec24) && dec24.weekday() != Weekday::Fri {
            out.push(early(dec24, "Christmas Eve"));
        }
    }

    out.sort_by_key(|h| h.date);
    out
}

/// Gregorian Easter Sunday (anonymous computus).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut day = first_of_next.pred_opt()?;
    while day.weekday() != weekday {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Fixed-date holiday moved off the weekend (Saturday -> Friday, Sunday -> Monday).
fn observed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    }
}

#[inline]
pub(crate) fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
