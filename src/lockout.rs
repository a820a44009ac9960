//! Escalating lockout state machine
//!
//! Tracks failed-attempt counts per user and imposes progressively longer
//! timed lockouts. The tracker is the authoritative brute-force defense:
//! its state is persisted across restarts and resets only on a successful
//! authentication or an explicit administrative reset.
//!
//! Transitions (all with an explicit `now` input):
//! - Failure while active: decrement the allowance; at zero, escalate to the
//!   next period and lock until `now + period duration`
//! - Attempt while locked: rejected, nothing decremented
//! - Lock expiry: back to active at the *same* period index, so a later
//!   escalation jumps to the next period rather than starting over
//! - Success: full reset to period zero

use crate::config::LockoutConfig;
use crate::types::LockoutState;
use chrono::{DateTime, Duration, Utc};

/// Whether an authentication attempt may proceed
#[derive(Debug, Clone, PartialEq)]
pub enum LockoutAvailability {
    Available { remaining_attempts: u32 },
    Locked { until: DateTime<Utc>, reason: String },
}

/// Escalation produced by a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub struct LockoutEscalation {
    pub period_index: u32,
    pub until: DateTime<Utc>,
}

/// State machine over per-user [`LockoutState`] records.
///
/// The tracker holds policy only; the state it mutates lives in the caller's
/// persistence layer. All read-check-write sequences must be serialized by
/// the caller (the engine holds a mutex across each decision).
pub struct LockoutTracker {
    config: LockoutConfig,
    allowance: u32,
}

impl LockoutTracker {
    pub fn new(config: LockoutConfig, allowance: u32) -> Self {
        Self {
            config,
            allowance: allowance.max(1),
        }
    }

    /// Fresh state carrying this tracker's full attempt allowance
    pub fn fresh_state(&self) -> LockoutState {
        LockoutState::new(self.allowance)
    }

    /// Check availability without mutating state.
    ///
    /// A lock whose end time has passed reports as available; the expiry
    /// transition itself is applied lazily by [`record_failure`] or
    /// [`record_success`] so that short-circuited attempts write nothing.
    ///
    /// [`record_failure`]: LockoutTracker::record_failure
    /// [`record_success`]: LockoutTracker::record_success
    pub fn availability(&self, state: &LockoutState, now: DateTime<Utc>) -> LockoutAvailability {
        if state.is_locked_out {
            if let Some(until) = state.lockout_end_time {
                if now < until {
                    return LockoutAvailability::Locked {
                        until,
                        reason: state
                            .lockout_reason
                            .clone()
                            .unwrap_or_else(|| "too many failed authentication attempts".to_string()),
                    };
                }
            }
            // Lock has been served; the next cycle gets the full allowance
            return LockoutAvailability::Available {
                remaining_attempts: self.allowance,
            };
        }
        LockoutAvailability::Available {
            remaining_attempts: state.remaining_attempts,
        }
    }

    /// Record a completed comparison that was rejected.
    ///
    /// Returns the escalation if this failure exhausted the allowance.
    pub fn record_failure(
        &self,
        state: &mut LockoutState,
        now: DateTime<Utc>,
    ) -> Option<LockoutEscalation> {
        self.apply_expiry(state, now);

        if state.is_locked_out {
            // Defensive: callers short-circuit on availability before
            // recording, so a live lock never consumes an attempt
            return None;
        }

        state.attempts_in_current_period += 1;
        state.remaining_attempts = self.allowance.saturating_sub(state.attempts_in_current_period);

        if state.remaining_attempts > 0 {
            return None;
        }

        // Allowance exhausted: advance the escalation and lock
        state.current_period_index += 1;
        let until = now + self.duration_for_index(state.current_period_index);
        state.is_locked_out = true;
        state.lockout_end_time = Some(until);
        state.lockout_reason = Some(format!(
            "{} consecutive failed attempts (escalation period {})",
            state.attempts_in_current_period, state.current_period_index
        ));
        state.attempts_in_current_period = 0;
        state.remaining_attempts = self.allowance;

        log::warn!(
            "lockout escalation: period {} until {}",
            state.current_period_index,
            until
        );

        Some(LockoutEscalation {
            period_index: state.current_period_index,
            until,
        })
    }

    /// Record a successful authentication: full reset to period zero
    pub fn record_success(&self, state: &mut LockoutState) {
        *state = self.fresh_state();
    }

    /// Lockout duration for a 1-based escalation step.
    ///
    /// Steps beyond the explicit table extend the last entry by a fixed
    /// increment per additional step.
    pub fn duration_for_index(&self, index: u32) -> Duration {
        let table = &self.config.escalation_minutes;
        let index = index.max(1) as usize;
        let minutes = if index <= table.len() {
            table[index - 1]
        } else {
            let last = *table.last().unwrap_or(&self.config.extension_minutes);
            last + self.config.extension_minutes * (index - table.len()) as i64
        };
        Duration::minutes(minutes)
    }

    /// Transition a served lock back to active, keeping the period index
    fn apply_expiry(&self, state: &mut LockoutState, now: DateTime<Utc>) {
        if !state.is_locked_out {
            return;
        }
        let served = state.lockout_end_time.map(|until| now >= until).unwrap_or(true);
        if served {
            state.is_locked_out = false;
            state.lockout_end_time = None;
            state.lockout_reason = None;
            state.attempts_in_current_period = 0;
            state.remaining_attempts = self.allowance;
        }
    }
}
