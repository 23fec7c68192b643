// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Idle-unload policy (spec §4.7, scenario S6). Grounded on the teacher's
//! relay/discovery poll-and-reconnect loop in `sven-p2p::node`
//! (`RELAY_POLL_SECS` re-poll idiom), generalized from "poll for relay
//! reachability" to "poll the roster for panel presence".
use std::time::{Duration, Instant};

/// Tracks the two independent timers spec §5 names: how long since a
/// `panel`-type participant was last seen in the roster, and how long
/// since this worker last did processing work. Both must elapse before
/// unload is due — a quiet-but-watched worker never unloads, and a
/// panel-less worker mid-turn never unloads either.
#[derive(Debug)]
pub struct IdleTracker {
    last_activity: Instant,
    panel_absent_since: Option<Instant>,
}

impl IdleTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            last_activity: now,
            panel_absent_since: None,
        }
    }

    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Called on every roster poll. A panel rejoining cancels any pending
    /// unload by clearing the absence timer (spec S6: "if the panel
    /// reconnects within 10s, the unload is cancelled").
    pub fn observe_roster(&mut self, panel_present: bool, now: Instant) {
        if panel_present {
            self.panel_absent_since = None;
        } else if self.panel_absent_since.is_none() {
            self.panel_absent_since = Some(now);
        }
    }

    pub fn should_unload(&self, now: Instant, idle_grace: Duration, activity_grace: Duration) -> bool {
        let panel_gone_long_enough = self
            .panel_absent_since
            .is_some_and(|since| now.duration_since(since) >= idle_grace);
        let quiet_long_enough = now.duration_since(self.last_activity) >= activity_grace;
        panel_gone_long_enough && quiet_long_enough
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_present_never_unloads() {
        let t0 = Instant::now();
        let mut tracker = IdleTracker::new(t0);
        tracker.observe_roster(true, t0);
        let later = t0 + Duration::from_secs(1000);
        assert!(!tracker.should_unload(later, Duration::from_secs(10), Duration::from_secs(120)));
    }

    #[test]
    fn panel_absent_but_recent_activity_does_not_unload() {
        let t0 = Instant::now();
        let mut tracker = IdleTracker::new(t0);
        tracker.observe_roster(false, t0);
        let later = t0 + Duration::from_secs(30);
        tracker.record_activity(later);
        assert!(!tracker.should_unload(later, Duration::from_secs(10), Duration::from_secs(120)));
    }

    #[test]
    fn both_windows_elapsed_unloads() {
        let t0 = Instant::now();
        let mut tracker = IdleTracker::new(t0);
        tracker.observe_roster(false, t0);
        let later = t0 + Duration::from_secs(200);
        assert!(tracker.should_unload(later, Duration::from_secs(10), Duration::from_secs(120)));
    }

    #[test]
    fn panel_reconnect_resets_the_absence_window() {
        let t0 = Instant::now();
        let mut tracker = IdleTracker::new(t0);
        tracker.observe_roster(false, t0);
        let reconnect_at = t0 + Duration::from_secs(5);
        tracker.observe_roster(true, reconnect_at);
        let later = reconnect_at + Duration::from_secs(200);
        // Panel is present again at `later`'s poll, so absence never re-crossed.
        tracker.observe_roster(true, later);
        assert!(!tracker.should_unload(later, Duration::from_secs(10), Duration::from_secs(120)));
    }
}
