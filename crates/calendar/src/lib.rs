//! Market calendar for the barsmith engine.
//!
//! This crate handles:
//! - Exchange groups, asset classes and default market hours
//! - Holiday tables and the built-in US market holiday rules
//! - Per-date trading sessions resolved in the exchange timezone
//! - Trading-day navigation with a bounded search
//! - The session lifecycle state machine

pub mod calendar;
pub mod exchange;
pub mod holidays;
pub mod session;
pub mod state;

pub use calendar::{CacheStats, TradingCalendar};
pub use exchange::{AssetClass, ExchangeGroup, MarketHours};
pub use holidays::{easter_sunday, us_market_holidays, Holiday, HolidayTable};
pub use session::{localize, TradingSession};
pub use state::{SessionLifecycle, SessionState, StateTransition};
