//! Session lifecycle state machine.
//!
//! Transitions are table-driven. The owner of a session requests moves;
//! the machine never advances itself.

use barsmith_core::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    NotStarted,
    PreMarket,
    Active,
    PostMarket,
    Ended,
    Timeout,
    Error,
}

impl SessionState {
    pub const ALL: [Self; 7] = [
        Self::NotStarted,
        Self::PreMarket,
        Self::Active,
        Self::PostMarket,
        Self::Ended,
        Self::Timeout,
        Self::Error,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SessionState::NotStarted => "NOT_STARTED",
            SessionState::PreMarket => "PRE_MARKET",
            SessionState::Active => "ACTIVE",
            SessionState::PostMarket => "POST_MARKET",
            SessionState::Ended => "ENDED",
            SessionState::Timeout => "TIMEOUT",
            SessionState::Error => "ERROR",
        }
    }

    /// Legal next states.
    pub const fn allowed_transitions(self) -> &'static [SessionState] {
        use SessionState as S;
        match self {
            S::NotStarted => &[S::PreMarket, S::Active, S::Error],
            S::PreMarket => &[S::Active, S::Timeout, S::Error, S::Ended],
            S::Active => &[S::PostMarket, S::Timeout, S::Error, S::Ended],
            S::PostMarket => &[S::Ended, S::Timeout, S::Error],
            S::Ended => &[S::NotStarted, S::PreMarket],
            S::Timeout => &[S::Active, S::Error, S::Ended],
            S::Error => &[S::NotStarted, S::Active, S::Ended],
        }
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Pre-market, regular or post-market.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::PreMarket | SessionState::Active | SessionState::PostMarket
        )
    }

    pub fn can_receive_data(self) -> bool {
        self.is_active()
    }

    pub fn requires_attention(self) -> bool {
        matches!(self, SessionState::Timeout | SessionState::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub at: DateTime<Utc>,
}

/// Current state of one session plus the transitions applied to it.
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    state: SessionState,
    history: Vec<StateTransition>,
}

impl SessionLifecycle {
    /// New lifecycle in `NotStarted`.
    pub fn new() -> Self {
        Self {
            state: SessionState::NotStarted,
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Applied transitions, oldest first.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn can_transition(&self, next: SessionState) -> bool {
        self.state.can_transition_to(next)
    }

    /// Move to `next`, or fail with `IllegalTransition` leaving the state untouched.
    pub fn transition(&mut self, next: SessionState, at: DateTime<Utc>) -> Result<StateTransition> {
        if !self.state.can_transition_to(next) {
            return Err(Error::IllegalTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        let applied = StateTransition {
            from: self.state,
            to: next,
            at,
        };
        tracing::debug!(from = %applied.from, to = %applied.to, "session transition");
        self.state = next;
        self.history.push(applied);
        Ok(applied)
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_active_to_post_market_then_illegal_pre_market() {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.transition(SessionState::Active, now()).unwrap();

        let applied = lifecycle.transition(SessionState::PostMarket, now()).unwrap();
        assert_eq!(applied.from, SessionState::Active);
        assert_eq!(applied.to, SessionState::PostMarket);

        let err = lifecycle
            .transition(SessionState::PreMarket, now())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalTransition {
                from: "POST_MARKET",
                to: "PRE_MARKET"
            }
        ));
        assert_eq!(lifecycle.state(), SessionState::PostMarket);
        assert_eq!(lifecycle.history().len(), 2);
    }

    #[test]
    fn test_transition_table() {
        use SessionState as S;
        let legal = [
            (S::NotStarted, S::PreMarket),
            (S::NotStarted, S::Active),
            (S::NotStarted, S::Error),
            (S::PreMarket, S::Active),
            (S::PreMarket, S::Timeout),
            (S::PreMarket, S::Error),
            (S::PreMarket, S::Ended),
            (S::Active, S::PostMarket),
            (S::Active, S::Timeout),
            (S::Active, S::Error),
            (S::Active, S::Ended),
            (S::PostMarket, S::Ended),
            (S::PostMarket, S::Timeout),
            (S::PostMarket, S::Error),
            (S::Ended, S::NotStarted),
            (S::Ended, S::PreMarket),
            (S::Timeout, S::Active),
            (S::Timeout, S::Error),
            (S::Timeout, S::Ended),
            (S::Error, S::NotStarted),
            (S::Error, S::Active),
            (S::Error, S::Ended),
        ];
        for from in SessionState::ALL {
            for to in SessionState::ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_self_transition_rejected() {
        let mut lifecycle = SessionLifecycle::new();
        assert!(lifecycle.transition(SessionState::NotStarted, now()).is_err());
    }

    #[test]
    fn test_predicates() {
        use SessionState as S;
        for state in S::ALL {
            let active = matches!(state, S::PreMarket | S::Active | S::PostMarket);
            assert_eq!(state.is_active(), active);
            assert_eq!(state.can_receive_data(), active);
            assert_eq!(state.requires_attention(), matches!(state, S::Timeout | S::Error));
        }
    }

    #[test]
    fn test_new_trading_day_and_error_recovery() {
        let mut lifecycle = SessionLifecycle::new();
        for next in [
            SessionState::PreMarket,
            SessionState::Active,
            SessionState::Ended,
            SessionState::PreMarket,
            SessionState::Error,
            SessionState::NotStarted,
        ] {
            lifecycle.transition(next, now()).unwrap();
        }
        assert_eq!(lifecycle.state(), SessionState::NotStarted);
    }
}
