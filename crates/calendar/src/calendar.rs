//! Trading calendar: session lookup, holiday management and navigation.

use crate::exchange::{AssetClass, ExchangeGroup};
use crate::holidays::{Holiday, HolidayTable};
use crate::session::TradingSession;
use barsmith_core::{CalendarConfig, Error, Result};
use chrono::{Duration, NaiveDate};
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Cache key for resolved sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SessionKey {
    date: NaiveDate,
    group: ExchangeGroup,
    asset_class: AssetClass,
}

/// Session cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Trading calendar owning the holiday table and a session cache.
///
/// Lookups are safe from many threads: cached sessions are served without
/// taking the holiday lock, and counters are atomic. Holiday edits evict
/// the affected entries while holding the write lock, and misses insert
/// while holding the read lock.
pub struct TradingCalendar {
    holidays: RwLock<HolidayTable>,
    sessions: Cache<SessionKey, Arc<TradingSession>>,
    hits: AtomicU64,
    misses: AtomicU64,
    default_group: ExchangeGroup,
    search_limit_days: u32,
}

impl TradingCalendar {
    /// Default session cache capacity.
    pub const DEFAULT_CACHE_CAPACITY: u64 = 4096;
    /// Default bound for next/previous trading day searches.
    pub const DEFAULT_SEARCH_LIMIT_DAYS: u32 = 60;

    /// Create a calendar over a holiday table.
    pub fn new(holidays: HolidayTable, default_group: ExchangeGroup) -> Self {
        Self::with_limits(
            holidays,
            default_group,
            Self::DEFAULT_SEARCH_LIMIT_DAYS,
            Self::DEFAULT_CACHE_CAPACITY,
        )
    }

    /// Create a calendar with explicit search bound and cache capacity.
    pub fn with_limits(
        holidays: HolidayTable,
        default_group: ExchangeGroup,
        search_limit_days: u32,
        cache_capacity: u64,
    ) -> Self {
        Self {
            holidays: RwLock::new(holidays),
            sessions: Cache::new(cache_capacity),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            default_group,
            search_limit_days: search_limit_days.max(1),
        }
    }

    /// US calendar with the built-in holiday rules for the given years.
    pub fn us_equity(first_year: i32, last_year: i32) -> Self {
        Self::new(
            HolidayTable::us_builtin(first_year, last_year),
            ExchangeGroup::UsEquity,
        )
    }

    /// Build from configuration, loading the built-in US holidays.
    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        let group: ExchangeGroup = config.default_exchange_group.parse()?;
        if config.search_limit_days == 0 {
            return Err(Error::config("calendar.search_limit_days must be > 0"));
        }
        Ok(Self::with_limits(
            HolidayTable::us_builtin(config.builtin_holidays_from, config.builtin_holidays_to),
            group,
            config.search_limit_days,
            config.session_cache_capacity,
        ))
    }

    pub fn default_group(&self) -> ExchangeGroup {
        self.default_group
    }

    pub fn search_limit_days(&self) -> u32 {
        self.search_limit_days
    }

    /// Session for `date` in `group`, using the group's primary asset class.
    pub fn get_trading_session(&self, date: NaiveDate, group: ExchangeGroup) -> Arc<TradingSession> {
        self.session_for(date, group, group.primary_asset_class())
    }

    /// Session for `date` in the default group.
    pub fn session(&self, date: NaiveDate) -> Arc<TradingSession> {
        self.get_trading_session(date, self.default_group)
    }

    /// Session for an explicit (date, group, asset class).
    pub fn session_for(
        &self,
        date: NaiveDate,
        group: ExchangeGroup,
        asset_class: AssetClass,
    ) -> Arc<TradingSession> {
        let key = SessionKey {
            date,
            group,
            asset_class,
        };
        if let Some(session) = self.sessions.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(%date, %group, "session cache hit");
            return session;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%date, %group, "session cache miss");

        // Holiday edits evict under the write lock: insert before the read
        // guard is released.
        let table = self.holidays.read().unwrap_or_else(PoisonError::into_inner);
        let session = Arc::new(TradingSession::resolve(
            date,
            group,
            asset_class,
            group.market_hours(asset_class),
            table.get(date, group),
        ));
        self.sessions.insert(key, Arc::clone(&session));
        drop(table);
        session
    }

    /// False on weekends and full holidays of the default group.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.is_trading_day_in(date, self.default_group)
    }

    pub fn is_trading_day_in(&self, date: NaiveDate, group: ExchangeGroup) -> bool {
        self.get_trading_session(date, group).is_trading_day()
    }

    /// The `n`-th trading day after `from` in the default group.
    pub fn get_next_trading_day(&self, from: NaiveDate, n: u32) -> Result<NaiveDate> {
        self.step_trading_days(from, n, self.default_group, Direction::Forward)
    }

    /// The `n`-th trading day before `from` in the default group.
    pub fn get_previous_trading_day(&self, from: NaiveDate, n: u32) -> Result<NaiveDate> {
        self.step_trading_days(from, n, self.default_group, Direction::Backward)
    }

    pub fn next_trading_day_in(
        &self,
        from: NaiveDate,
        n: u32,
        group: ExchangeGroup,
    ) -> Result<NaiveDate> {
        self.step_trading_days(from, n, group, Direction::Forward)
    }

    pub fn previous_trading_day_in(
        &self,
        from: NaiveDate,
        n: u32,
        group: ExchangeGroup,
    ) -> Result<NaiveDate> {
        self.step_trading_days(from, n, group, Direction::Backward)
    }

    /// Trading days in `[start, end]` (inclusive on both ends).
    pub fn count_trading_days(&self, start: NaiveDate, end: NaiveDate) -> usize {
        self.trading_days_in_range(start, end).len()
    }

    /// Trading days in `[start, end]` in ascending order.
    pub fn trading_days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        self.trading_days_in_range_in(start, end, self.default_group)
    }

    pub fn trading_days_in_range_in(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        group: ExchangeGroup,
    ) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| self.is_trading_day_in(*date, group))
            .collect()
    }

    /// Add a holiday row; rejects a second row for the same (date, group).
    pub fn add_holiday(&self, holiday: Holiday) -> Result<()> {
        let (date, group) = (holiday.date, holiday.exchange_group);
        let mut table = self.holidays.write().unwrap_or_else(PoisonError::into_inner);
        table.insert(holiday)?;
        self.evict(date, group);
        Ok(())
    }

    /// Remove the holiday row for (date, group), if any.
    pub fn remove_holiday(&self, date: NaiveDate, group: ExchangeGroup) -> Option<Holiday> {
        let mut table = self.holidays.write().unwrap_or_else(PoisonError::into_inner);
        let removed = table.remove(date, group);
        if removed.is_some() {
            self.evict(date, group);
        }
        removed
    }

    /// Holiday rows for `group` within `[start, end]`.
    pub fn holidays_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        group: ExchangeGroup,
    ) -> Vec<Holiday> {
        let table = self.holidays.read().unwrap_or_else(PoisonError::into_inner);
        table.between(start, end, group).into_iter().cloned().collect()
    }

    /// Drop every cached session.
    pub fn invalidate_cache(&self) {
        self.sessions.invalidate_all();
        tracing::debug!("session cache invalidated");
    }

    fn evict(&self, date: NaiveDate, group: ExchangeGroup) {
        for asset_class in AssetClass::ALL {
            self.sessions.invalidate(&SessionKey {
                date,
                group,
                asset_class,
            });
        }
        tracing::debug!(%date, %group, "session cache entries invalidated");
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.sessions.entry_count(),
        }
    }

    fn step_trading_days(
        &self,
        from: NaiveDate,
        n: u32,
        group: ExchangeGroup,
        direction: Direction,
    ) -> Result<NaiveDate> {
        let step = match direction {
            Direction::Forward => Duration::days(1),
            Direction::Backward => Duration::days(-1),
        };
        let mut current = from;
        for _ in 0..n {
            let mut walked = 0u32;
            loop {
                if walked >= self.search_limit_days {
                    return Err(Error::not_found(format!(
                        "no {} trading day within {} days of {current} for {group}",
                        direction.as_str(),
                        self.search_limit_days
                    )));
                }
                current = current
                    .checked_add_signed(step)
                    .ok_or_else(|| Error::not_found(format!("date overflow walking from {from}")))?;
                walked += 1;
                if self.is_trading_day_in(current, group) {
                    break;
                }
            }
        }
        Ok(current)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "next",
            Direction::Backward => "previous",
        }
    }
}
