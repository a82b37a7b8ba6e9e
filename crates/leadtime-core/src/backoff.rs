// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Per-adapter exponential backoff counted in polling cycles
//!
//! A rate-limited adapter is skipped for `initial_cycles * 2^(strikes - 1)`
//! cycles (capped at `max_cycles`). The first successful fetch clears it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Backoff tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Cycles skipped after the first rate limit
    pub initial_cycles: u64,
    /// Upper bound on cycles skipped
    pub max_cycles: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_cycles: 1,
            max_cycles: 32,
        }
    }
}

impl BackoffPolicy {
    /// Cycles to skip after the given number of consecutive strikes
    pub fn skip_cycles(&self, strikes: u32) -> u64 {
        let exponent = strikes.saturating_sub(1);
        let factor = 2u64.saturating_pow(exponent);
        self.initial_cycles
            .max(1)
            .saturating_mul(factor)
            .min(self.max_cycles.max(1))
    }
}

#[derive(Debug, Clone, Copy)]
struct AdapterBackoff {
    strikes: u32,
    resume_at_cycle: u64,
}

/// Backoff state for every adapter of one exporter
#[derive(Debug, Default)]
pub struct BackoffTracker {
    policy: BackoffPolicy,
    adapters: HashMap<String, AdapterBackoff>,
}

impl BackoffTracker {
    /// Create a tracker
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            adapters: HashMap::new(),
        }
    }

    /// Register a rate limit seen during `cycle`.
    ///
    /// `min_cycles` carries an upstream retry hint already converted to
    /// cycles. Returns the number of cycles the adapter will sit out.
    pub fn record_rate_limited(&mut self, adapter: &str, cycle: u64, min_cycles: u64) -> u64 {
        let entry = self
            .adapters
            .entry(adapter.to_string())
            .or_insert(AdapterBackoff {
                strikes: 0,
                resume_at_cycle: 0,
            });
        entry.strikes = entry.strikes.saturating_add(1);

        let skip = self
            .policy
            .skip_cycles(entry.strikes)
            .max(min_cycles)
            .min(self.policy.max_cycles.max(1));
        entry.resume_at_cycle = cycle.saturating_add(skip).saturating_add(1);
        skip
    }

    /// Clear any backoff held by `adapter`
    pub fn record_success(&mut self, adapter: &str) {
        self.adapters.remove(adapter);
    }

    /// Whether `adapter` must not be called during `cycle`
    pub fn is_suspended(&self, adapter: &str, cycle: u64) -> bool {
        self.adapters
            .get(adapter)
            .is_some_and(|state| cycle < state.resume_at_cycle)
    }

    /// All adapters suspended during `cycle`
    pub fn suspended(&self, cycle: u64) -> HashSet<String> {
        self.adapters
            .iter()
            .filter(|(_, state)| cycle < state.resume_at_cycle)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Consecutive rate limits seen for `adapter`
    pub fn strikes(&self, adapter: &str) -> u32 {
        self.adapters.get(adapter).map_or(0, |state| state.strikes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_cycles_grow_and_cap() {
        let policy = BackoffPolicy {
            initial_cycles: 1,
            max_cycles: 8,
        };
        assert_eq!(policy.skip_cycles(1), 1);
        assert_eq!(policy.skip_cycles(2), 2);
        assert_eq!(policy.skip_cycles(3), 4);
        assert_eq!(policy.skip_cycles(4), 8);
        assert_eq!(policy.skip_cycles(10), 8);
        assert_eq!(policy.skip_cycles(200), 8);
    }

    #[test]
    fn test_suspension_window() {
        let mut tracker = BackoffTracker::new(BackoffPolicy::default());
        let skip = tracker.record_rate_limited("github", 1, 0);
        assert_eq!(skip, 1);

        assert!(tracker.is_suspended("github", 2));
        assert!(!tracker.is_suspended("github", 3));
        assert!(!tracker.is_suspended("gitlab", 2));
    }

    #[test]
    fn test_retry_hint_extends_skip() {
        let mut tracker = BackoffTracker::new(BackoffPolicy::default());
        let skip = tracker.record_rate_limited("github", 1, 5);
        assert_eq!(skip, 5);
        assert!(tracker.is_suspended("github", 6));
        assert!(!tracker.is_suspended("github", 7));
    }

    #[test]
    fn test_success_resets() {
        let mut tracker = BackoffTracker::new(BackoffPolicy::default());
        tracker.record_rate_limited("github", 1, 0);
        tracker.record_rate_limited("github", 3, 0);
        assert_eq!(tracker.strikes("github"), 2);

        tracker.record_success("github");
        assert_eq!(tracker.strikes("github"), 0);
        assert!(tracker.suspended(4).is_empty());
    }

    #[test]
    fn test_suspended_snapshot() {
        let mut tracker = BackoffTracker::new(BackoffPolicy::default());
        tracker.record_rate_limited("github", 1, 0);
        tracker.record_rate_limited("gitea", 1, 3);

        let at_two = tracker.suspended(2);
        assert!(at_two.contains("github"));
        assert!(at_two.contains("gitea"));

        let at_three = tracker.suspended(3);
        assert!(!at_three.contains("github"));
        assert!(at_three.contains("gitea"));
    }
}
