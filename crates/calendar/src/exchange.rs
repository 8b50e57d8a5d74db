//! Exchange groups, asset classes and default market hours.
//!
//! An exchange group is a set of exchanges that share one holiday and
//! hours calendar. The member table is static configuration.

use barsmith_core::{Error, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchanges sharing one holiday/hours calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExchangeGroup {
    /// US cash equities.
    #[serde(rename = "US_EQUITY")]
    UsEquity,
    /// US listed options.
    #[serde(rename = "US_OPTIONS")]
    UsOptions,
    /// London Stock Exchange.
    #[serde(rename = "UK_EQUITY")]
    UkEquity,
}

impl ExchangeGroup {
    pub const ALL: [Self; 3] = [Self::UsEquity, Self::UsOptions, Self::UkEquity];

    /// Canonical group name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ExchangeGroup::UsEquity => "US_EQUITY",
            ExchangeGroup::UsOptions => "US_OPTIONS",
            ExchangeGroup::UkEquity => "UK_EQUITY",
        }
    }

    /// Member exchanges of this group.
    pub const fn members(self) -> &'static [&'static str] {
        match self {
            ExchangeGroup::UsEquity => &["NYSE", "NASDAQ", "AMEX", "ARCA"],
            ExchangeGroup::UsOptions => &["CBOE", "ISE", "PHLX", "BOX"],
            ExchangeGroup::UkEquity => &["LSE"],
        }
    }

    /// Resolve an exchange code to its group.
    pub fn for_exchange(exchange: &str) -> Result<Self> {
        let code = exchange.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|group| group.members().contains(&code.as_str()))
            .ok_or_else(|| Error::not_found(format!("exchange group for exchange '{exchange}'")))
    }

    /// Timezone in which the group's wall-clock hours are defined.
    pub fn timezone(self) -> Tz {
        match self {
            ExchangeGroup::UsEquity | ExchangeGroup::UsOptions => chrono_tz::America::New_York,
            ExchangeGroup::UkEquity => chrono_tz::Europe::London,
        }
    }

    /// Asset class assumed when a caller does not name one.
    pub const fn primary_asset_class(self) -> AssetClass {
        match self {
            ExchangeGroup::UsEquity | ExchangeGroup::UkEquity => AssetClass::Equity,
            ExchangeGroup::UsOptions => AssetClass::Option,
        }
    }

    /// Default market hours for an asset class traded in this group.
    pub fn market_hours(self, asset_class: AssetClass) -> MarketHours {
        let tz = self.timezone();
        match (self, asset_class) {
            (ExchangeGroup::UsEquity, AssetClass::Equity | AssetClass::Etf) => MarketHours {
                timezone: tz,
                regular_open: hm(9, 30),
                regular_close: hm(16, 0),
                pre_market_open: Some(hm(4, 0)),
                post_market_close: Some(hm(20, 0)),
                early_close: hm(13, 0),
            },
            (ExchangeGroup::UsEquity | ExchangeGroup::UsOptions, _) => MarketHours {
                timezone: tz,
                regular_open: hm(9, 30),
                regular_close: hm(16, 0),
                pre_market_open: None,
                post_market_close: None,
                early_close: hm(13, 0),
            },
            (ExchangeGroup::UkEquity, _) => MarketHours {
                timezone: tz,
                regular_open: hm(8, 0),
                regular_close: hm(16, 30),
                pre_market_open: None,
                post_market_close: None,
                early_close: hm(12, 30),
            },
        }
    }
}

impl fmt::Display for ExchangeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == name)
            .ok_or_else(|| Error::config(format!("unknown exchange group '{s}'")))
    }
}

/// Class of tradable instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetClass {
    Equity,
    Etf,
    Option,
}

impl AssetClass {
    pub const ALL: [Self; 3] = [Self::Equity, Self::Etf, Self::Option];
}

/// Wall-clock trading hours of one group/asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub timezone: Tz,
    pub regular_open: NaiveTime,
    pub regular_close: NaiveTime,
    pub pre_market_open: Option<NaiveTime>,
    pub post_market_close: Option<NaiveTime>,
    /// Regular close on early-close days when the holiday row gives no time.
    pub early_close: NaiveTime,
}

pub(crate) fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_resolution() {
        assert_eq!(ExchangeGroup::for_exchange("NYSE").unwrap(), ExchangeGroup::UsEquity);
        assert_eq!(ExchangeGroup::for_exchange("nasdaq").unwrap(), ExchangeGroup::UsEquity);
        assert_eq!(ExchangeGroup::for_exchange("CBOE").unwrap(), ExchangeGroup::UsOptions);
        assert!(matches!(
            ExchangeGroup::for_exchange("XETRA"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_name_round_trip() {
        for group in ExchangeGroup::ALL {
            assert_eq!(group.as_str().parse::<ExchangeGroup>().unwrap(), group);
        }
        let json = serde_json::to_string(&ExchangeGroup::UsEquity).unwrap();
        assert_eq!(json, "\"US_EQUITY\"");
    }

    #[test]
    fn test_us_equity_hours() {
        let hours = ExchangeGroup::UsEquity.market_hours(AssetClass::Equity);
        assert_eq!(hours.regular_open, hm(9, 30));
        assert_eq!(hours.regular_close, hm(16, 0));
        assert_eq!(hours.pre_market_open, Some(hm(4, 0)));
        assert_eq!(hours.timezone, chrono_tz::America::New_York);
    }

    #[test]
    fn test_options_have_no_extended_hours() {
        let hours = ExchangeGroup::UsOptions.market_hours(AssetClass::Option);
        assert_eq!(hours.pre_market_open, None);
        assert_eq!(hours.post_market_close, None);
    }
}
