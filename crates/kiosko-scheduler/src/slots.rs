//! Slot allocation.
//!
//! Publication slots are civil local times at configured hours of the
//! day. The planner enumerates candidates over a rolling horizon and
//! picks the first one without a pending occupant; occupancy itself is
//! a store concern, injected as a closure so this module stays pure.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use tracing::warn;

use kiosko_core::clock::whole_second;
use kiosko_core::error::Result;

/// Days past today covered by the candidate horizon.
pub const HORIZON_DAYS: u64 = 7;

/// Minutes past a configured hour during which a dispatch trigger still
/// counts as that hour's publication window.
pub const PUBLICATION_WINDOW_MIN: u32 = 5;

/// Plans publication slots over a fixed set of hours of the day.
/// Cheap to build from a settings snapshot on every use, so a settings
/// change takes effect on the next allocation.
#[derive(Debug, Clone)]
pub struct SlotPlanner {
    hours: Vec<u32>,
}

impl SlotPlanner {
    /// `hours` must be sorted ascending and non-empty, as produced by
    /// the settings layer.
    pub fn new(hours: &[u32]) -> Self {
        Self { hours: hours.to_vec() }
    }

    /// All candidate slots from `now` forward: today's hours strictly
    /// after the current hour, then every configured hour of the next
    /// [`HORIZON_DAYS`] days. Never empty.
    pub fn candidate_slots(&self, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut slots = Vec::with_capacity(self.hours.len() * (HORIZON_DAYS as usize + 1));
        let today = now.date();
        for &hour in &self.hours {
            if hour > now.hour() {
                slots.push(slot_at(today, hour));
            }
        }
        for offset in 1..=HORIZON_DAYS {
            let date = today
                .checked_add_days(Days::new(offset))
                .unwrap_or(NaiveDate::MAX);
            for &hour in &self.hours {
                slots.push(slot_at(date, hour));
            }
        }
        slots
    }

    /// First candidate slot the occupancy probe reports free. When the
    /// whole horizon is occupied the last candidate is returned, so an
    /// overflowing backlog piles up at the horizon edge instead of
    /// being dropped. When the probe itself fails the first candidate
    /// is returned and the error is logged, not propagated.
    pub fn next_available_slot<F>(&self, now: NaiveDateTime, mut occupied: F) -> NaiveDateTime
    where
        F: FnMut(NaiveDateTime) -> Result<i64>,
    {
        let candidates = self.candidate_slots(now);
        for &slot in &candidates {
            match occupied(slot) {
                Ok(0) => return slot,
                Ok(_) => continue,
                Err(e) => {
                    warn!("occupancy check failed, using earliest slot: {e}");
                    return candidates[0];
                }
            }
        }
        candidates[candidates.len() - 1]
    }

    /// Urgent articles skip the slot grid and publish immediately.
    pub fn urgent_slot(&self, now: NaiveDateTime) -> NaiveDateTime {
        whole_second(now)
    }

    /// Slot at the `index`-th configured hour of `date`, for operator
    /// commands that address slots by position.
    pub fn specific_slot(&self, date: NaiveDate, index: usize) -> Option<NaiveDateTime> {
        self.hours.get(index).map(|&h| slot_at(date, h))
    }

    pub fn all_slots_for_date(&self, date: NaiveDate) -> Vec<NaiveDateTime> {
        self.hours.iter().map(|&h| slot_at(date, h)).collect()
    }

    /// Earliest configured slot instant strictly after `now`. This is
    /// what the dispatcher loop sleeps until.
    pub fn next_publication_instant(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        for &hour in &self.hours {
            let slot = slot_at(today, hour);
            if slot > now {
                return slot;
            }
        }
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        slot_at(tomorrow, self.hours[0])
    }

    /// Whether `now` falls inside the dispatch window of a configured
    /// hour (the first [`PUBLICATION_WINDOW_MIN`] minutes).
    pub fn is_publication_time(&self, now: NaiveDateTime) -> bool {
        self.hours.contains(&now.hour()) && now.minute() < PUBLICATION_WINDOW_MIN
    }

    /// Human-readable hour list, e.g. `08:00, 12:00, 16:00, 20:00`.
    pub fn format_schedule(&self) -> String {
        self.hours
            .iter()
            .map(|h| format!("{h:02}:00"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn slot_at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 0, 0)
        .unwrap_or_else(|| date.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosko_core::error::KioskoError;

    fn planner() -> SlotPlanner {
        SlotPlanner::new(&[8, 12, 16, 20])
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn candidates_start_after_current_hour() {
        let slots = planner().candidate_slots(at(1, 9, 0));
        assert_eq!(slots[0], at(1, 12, 0));
        assert_eq!(slots[1], at(1, 16, 0));
        assert_eq!(slots[2], at(1, 20, 0));
        assert_eq!(slots[3], at(2, 8, 0));
        // 3 today + 4 per day over the 7-day horizon
        assert_eq!(slots.len(), 3 + 4 * 7);
    }

    #[test]
    fn exact_hour_is_not_a_candidate() {
        // 08:00 sharp: hour 8 is not strictly greater than 8.
        let slots = planner().candidate_slots(at(1, 8, 0));
        assert_eq!(slots[0], at(1, 12, 0));
    }

    #[test]
    fn after_last_hour_all_candidates_are_tomorrow() {
        let slots = planner().candidate_slots(at(1, 21, 0));
        assert_eq!(slots[0], at(2, 8, 0));
        assert_eq!(slots.len(), 4 * 7);
    }

    #[test]
    fn first_free_slot_is_chosen() {
        let slot = planner().next_available_slot(at(1, 9, 0), |s| {
            Ok(if s == at(1, 12, 0) { 1 } else { 0 })
        });
        assert_eq!(slot, at(1, 16, 0));
    }

    #[test]
    fn exhausted_horizon_yields_last_candidate() {
        let slot = planner().next_available_slot(at(1, 9, 0), |_| Ok(1));
        assert_eq!(slot, at(8, 20, 0));
    }

    #[test]
    fn probe_failure_yields_first_candidate() {
        let slot = planner().next_available_slot(at(1, 9, 0), |_| {
            Err(KioskoError::Store("down".into()))
        });
        assert_eq!(slot, at(1, 12, 0));
    }

    #[test]
    fn next_instant_rolls_over_to_tomorrow() {
        let p = planner();
        assert_eq!(p.next_publication_instant(at(1, 9, 0)), at(1, 12, 0));
        assert_eq!(p.next_publication_instant(at(1, 8, 0)), at(1, 12, 0));
        assert_eq!(p.next_publication_instant(at(1, 7, 59)), at(1, 8, 0));
        assert_eq!(p.next_publication_instant(at(1, 20, 30)), at(2, 8, 0));
    }

    #[test]
    fn publication_window_is_five_minutes() {
        let p = planner();
        assert!(p.is_publication_time(at(1, 12, 0)));
        assert!(p.is_publication_time(at(1, 12, 4)));
        assert!(!p.is_publication_time(at(1, 12, 5)));
        assert!(!p.is_publication_time(at(1, 13, 0)));
    }

    #[test]
    fn slot_addressing_and_formatting() {
        let p = planner();
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(p.specific_slot(date, 1), Some(at(5, 12, 0)));
        assert_eq!(p.specific_slot(date, 9), None);
        assert_eq!(p.all_slots_for_date(date).len(), 4);
        assert_eq!(p.format_schedule(), "08:00, 12:00, 16:00, 20:00");
    }
}
