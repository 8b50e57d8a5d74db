//! Calendar-resolved trading session for one exchange group on one date.

use crate::exchange::{AssetClass, ExchangeGroup, MarketHours};
use crate::holidays::{is_weekday, Holiday};
use crate::state::SessionState;
use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Trading hours of one group on one date.
///
/// Wall-clock fields are in the session's own timezone. Every conversion to
/// an instant goes through [`TradingSession::timezone`], never the caller's.
/// On early-close days `regular_close` already holds the shortened close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingSession {
    pub date: NaiveDate,
    pub exchange_group: ExchangeGroup,
    pub asset_class: AssetClass,
    pub timezone: Tz,
    pub regular_open: NaiveTime,
    pub regular_close: NaiveTime,
    pub pre_market_open: Option<NaiveTime>,
    pub post_market_close: Option<NaiveTime>,
    pub is_holiday: bool,
    pub is_early_close: bool,
    pub holiday_name: Option<String>,
}

impl TradingSession {
    /// Resolve default hours and an optional holiday row into a session.
    pub fn resolve(
        date: NaiveDate,
        exchange_group: ExchangeGroup,
        asset_class: AssetClass,
        hours: MarketHours,
        holiday: Option<&Holiday>,
    ) -> Self {
        let mut session = Self {
            date,
            exchange_group,
            asset_class,
            timezone: hours.timezone,
            regular_open: hours.regular_open,
            regular_close: hours.regular_close,
            pre_market_open: hours.pre_market_open,
            post_market_close: hours.post_market_close,
            is_holiday: false,
            is_early_close: false,
            holiday_name: None,
        };

        if let Some(holiday) = holiday {
            session.holiday_name = Some(holiday.name.clone());
            if holiday.is_closed {
                session.is_holiday = true;
            } else {
                session.is_early_close = true;
                let close = holiday.early_close_time.unwrap_or(hours.early_close);
                session.regular_close = close.max(session.regular_open);
            }
        }
        session
    }

    /// Open for regular trading: a weekday that is not a full holiday.
    pub fn is_trading_day(&self) -> bool {
        !self.is_holiday && is_weekday(self.date)
    }

    pub fn regular_open_at(&self) -> DateTime<Tz> {
        localize(self.date, self.regular_open, self.timezone)
    }

    /// Regular close, shortened on early-close days.
    pub fn regular_close_at(&self) -> DateTime<Tz> {
        localize(self.date, self.regular_close, self.timezone)
    }

    pub fn pre_market_open_at(&self) -> Option<DateTime<Tz>> {
        self.pre_market_open
            .map(|t| localize(self.date, t, self.timezone))
    }

    pub fn post_market_close_at(&self) -> Option<DateTime<Tz>> {
        self.post_market_close
            .map(|t| localize(self.date, t, self.timezone))
    }

    /// Local midnight of the session date as a UTC instant.
    pub fn day_start_utc(&self) -> DateTime<Utc> {
        localize(self.date, NaiveTime::MIN, self.timezone).with_timezone(&Utc)
    }

    /// Length of the regular session (zero on non-trading days).
    pub fn regular_duration(&self) -> Duration {
        if !self.is_trading_day() {
            return Duration::zero();
        }
        self.regular_close_at() - self.regular_open_at()
    }

    /// Whether `instant` falls in `[regular_open, regular_close)` on a trading day.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.is_trading_day()
            && instant >= self.regular_open_at().with_timezone(&Utc)
            && instant < self.regular_close_at().with_timezone(&Utc)
    }

    /// Lifecycle phase a session owner should be in at `instant`.
    pub fn phase_at(&self, instant: DateTime<Utc>) -> SessionState {
        if !self.is_trading_day() {
            return SessionState::NotStarted;
        }
        let open = self.regular_open_at().with_timezone(&Utc);
        let close = self.regular_close_at().with_timezone(&Utc);
        let pre = self
            .pre_market_open_at()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(open);
        // Extended hours end with the regular session on early-close days.
        let post = match self.post_market_close_at() {
            Some(t) if !self.is_early_close => t.with_timezone(&Utc),
            _ => close,
        };

        if instant < pre {
            SessionState::NotStarted
        } else if instant < open {
            SessionState::PreMarket
        } else if instant < close {
            SessionState::Active
        } else if instant < post {
            SessionState::PostMarket
        } else {
            SessionState::Ended
        }
    }
}

/// Combine a date and wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap move forward to the first valid wall-clock time.
pub fn localize(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Tz> {
    let naive = date.and_time(time);
    let mut candidate: NaiveDateTime = naive;
    for _ in 0..8 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::minutes(15),
        }
    }
    tz.from_utc_datetime(&naive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::hm;
    use chrono::Timelike;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn us_session(date: NaiveDate, holiday: Option<&Holiday>) -> TradingSession {
        let group = ExchangeGroup::UsEquity;
        TradingSession::resolve(
            date,
            group,
            AssetClass::Equity,
            group.market_hours(AssetClass::Equity),
            holiday,
        )
    }

    #[test]
    fn test_regular_hours_follow_dst() {
        // Winter: 09:30 ET = 14:30 UTC. Summer: 09:30 ET = 13:30 UTC.
        let winter = us_session(d(2024, 1, 10), None);
        assert_eq!(winter.regular_open_at().with_timezone(&Utc).hour(), 14);
        let summer = us_session(d(2024, 7, 10), None);
        assert_eq!(summer.regular_open_at().with_timezone(&Utc).hour(), 13);
        assert_eq!(summer.regular_duration(), Duration::minutes(390));
    }

    #[test]
    fn test_early_close_shortens_session() {
        let date = d(2024, 7, 3);
        let holiday = Holiday::early_close(date, ExchangeGroup::UsEquity, "Eve", None);
        let session = us_session(date, Some(&holiday));
        assert!(session.is_early_close);
        assert!(session.is_trading_day());
        assert_eq!(session.regular_close, hm(13, 0));
        assert_eq!(session.regular_duration(), Duration::minutes(210));
        assert_eq!(session.holiday_name.as_deref(), Some("Eve"));
    }

    #[test]
    fn test_closed_holiday_and_weekend_are_not_trading_days() {
        let date = d(2024, 7, 4);
        let holiday = Holiday::closed(date, ExchangeGroup::UsEquity, "Independence Day");
        assert!(!us_session(date, Some(&holiday)).is_trading_day());
        assert!(!us_session(d(2024, 7, 6), None).is_trading_day());
        assert_eq!(us_session(d(2024, 7, 6), None).regular_duration(), Duration::zero());
    }

    #[test]
    fn test_phase_at() {
        let session = us_session(d(2024, 3, 5), None);
        let at = |h: u32, m: u32| {
            localize(session.date, hm(h, m), session.timezone).with_timezone(&Utc)
        };
        assert_eq!(session.phase_at(at(3, 0)), SessionState::NotStarted);
        assert_eq!(session.phase_at(at(4, 0)), SessionState::PreMarket);
        assert_eq!(session.phase_at(at(9, 30)), SessionState::Active);
        assert_eq!(session.phase_at(at(15, 59)), SessionState::Active);
        assert_eq!(session.phase_at(at(16, 0)), SessionState::PostMarket);
        assert_eq!(session.phase_at(at(20, 0)), SessionState::Ended);
        assert!(session.contains(at(10, 0)));
        assert!(!session.contains(at(16, 0)));
    }

    #[test]
    fn test_localize_dst_gap_moves_forward() {
        // 2024-03-10 02:30 does not exist in New York.
        let dt = localize(d(2024, 3, 10), hm(2, 30), chrono_tz::America::New_York);
        assert_eq!(dt.hour(), 3);
    }

    #[test]
    fn test_day_start_in_session_timezone() {
        let session = us_session(d(2024, 3, 5), None);
        let start = session.day_start_utc();
        assert_eq!(start.hour(), 5);
        let london = TradingSession::resolve(
            d(2024, 7, 1),
            ExchangeGroup::UkEquity,
            AssetClass::Equity,
            ExchangeGroup::UkEquity.market_hours(AssetClass::Equity),
            None,
        );
        assert_eq!(london.day_start_utc().hour(), 23);
        assert_eq!(london.regular_open_at().with_timezone(&Utc).hour(), 7);
    }
}
