//! Idle-timeout countdown that drops the machine into standby.
//!
//! The countdown restarts whenever the supervisor enters an activity state
//! (brew, flush, steam, hot water, backflush) and is re-evaluated once a
//! second.  Ten minutes after standby the display may be blanked.

use log::info;

use crate::config::StandbySettings;

pub const UPDATE_INTERVAL_MS: u64 = 1_000;
pub const DISPLAY_OFF_DELAY_MS: u64 = 10 * 60 * 1_000;

#[derive(Debug, Clone, Default)]
pub struct StandbyTimer {
    started_ms: u64,
    last_update_ms: u64,
    timeout_ms: u64,
    remaining_ms: u64,
    display_off_remaining_ms: u64,
    armed: bool,
}

fn timeout_ms(settings: &StandbySettings) -> u64 {
    if settings.minutes <= 0.0 {
        0
    } else {
        (settings.minutes * 60_000.0) as u64
    }
}

impl StandbyTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the countdown from the configured duration.
    pub fn reset(&mut self, now_ms: u64, settings: &StandbySettings) {
        self.started_ms = now_ms;
        self.last_update_ms = now_ms;
        self.timeout_ms = timeout_ms(settings);
        self.remaining_ms = self.timeout_ms;
        self.display_off_remaining_ms = DISPLAY_OFF_DELAY_MS;
        self.armed = true;
        if settings.enabled {
            info!("standby: timer reset to {:.0} min", settings.minutes);
        }
    }

    pub fn update(&mut self, now_ms: u64, settings: &StandbySettings) {
        if !settings.enabled {
            self.armed = false;
            return;
        }
        if !self.armed {
            self.reset(now_ms, settings);
            return;
        }
        if now_ms.saturating_sub(self.last_update_ms) < UPDATE_INTERVAL_MS {
            return;
        }
        self.last_update_ms = now_ms;

        let elapsed = now_ms.saturating_sub(self.started_ms);
        if self.remaining_ms != 0 {
            self.remaining_ms = self.timeout_ms.saturating_sub(elapsed);
            if self.remaining_ms == 0 {
                info!("standby: timeout reached");
            }
        } else if self.display_off_remaining_ms != 0 {
            self.display_off_remaining_ms = (self.timeout_ms + DISPLAY_OFF_DELAY_MS).saturating_sub(elapsed);
            if self.display_off_remaining_ms == 0 {
                info!("standby: display off");
            }
        }
    }

    /// Countdown ran out while standby is enabled.
    pub fn expired(&self) -> bool {
        self.armed && self.remaining_ms == 0
    }

    pub fn display_off(&self) -> bool {
        self.expired() && self.display_off_remaining_ms == 0
    }

    pub fn remaining_ms(&self) -> u64 {
        if self.armed { self.remaining_ms } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(minutes: f32) -> StandbySettings {
        StandbySettings { enabled: true, minutes }
    }

    #[test]
    fn counts_down_to_expiry() {
        let s = enabled(1.0);
        let mut t = StandbyTimer::new();
        t.update(0, &s);
        assert_eq!(t.remaining_ms(), 60_000);
        t.update(30_000, &s);
        assert_eq!(t.remaining_ms(), 30_000);
        assert!(!t.expired());
        t.update(60_000, &s);
        assert!(t.expired());
    }

    #[test]
    fn only_updates_once_per_second() {
        let s = enabled(1.0);
        let mut t = StandbyTimer::new();
        t.update(0, &s);
        t.update(1_000, &s);
        t.update(1_500, &s);
        assert_eq!(t.remaining_ms(), 59_000);
    }

    #[test]
    fn reset_restarts_countdown() {
        let s = enabled(1.0);
        let mut t = StandbyTimer::new();
        t.update(0, &s);
        t.update(60_000, &s);
        assert!(t.expired());
        t.reset(61_000, &s);
        assert!(!t.expired());
        assert_eq!(t.remaining_ms(), 60_000);
    }

    #[test]
    fn display_off_follows_ten_minutes_later() {
        let s = enabled(1.0);
        let mut t = StandbyTimer::new();
        t.update(0, &s);
        t.update(60_000, &s);
        t.update(60_000 + DISPLAY_OFF_DELAY_MS - 1_000, &s);
        assert!(!t.display_off());
        t.update(60_000 + DISPLAY_OFF_DELAY_MS, &s);
        assert!(t.display_off());
    }

    #[test]
    fn disabled_never_expires() {
        let s = StandbySettings { enabled: false, minutes: 0.0 };
        let mut t = StandbyTimer::new();
        t.update(0, &s);
        t.update(10_000_000, &s);
        assert!(!t.expired());
    }
}
