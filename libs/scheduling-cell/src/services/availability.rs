// libs/scheduling-cell/src/services/availability.rs
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::{Appointment, SlotTemplate};

use crate::models::AvailableSlot;
use crate::services::time::{do_overlap, minutes_to_time, time_to_minutes};

/// Derives free slots from weekly templates and existing bookings.
///
/// Pure: the same templates and appointments always give the same ordered output.
pub struct AvailabilityCalculator;

impl AvailabilityCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Free slots for `team_member_id` on `date`, ascending by start time.
    pub fn compute_available_slots(
        &self,
        templates: &[SlotTemplate],
        appointments: &[Appointment],
        team_member_id: Uuid,
        date: NaiveDate,
    ) -> Vec<AvailableSlot> {
        let weekday = day_of_week(date);

        let booked = self.booked_intervals(appointments, team_member_id, date);

        let mut candidates: Vec<(u32, u32)> = templates
            .iter()
            .filter(|t| t.team_member_id == team_member_id && t.available && t.day_of_week == weekday)
            .flat_map(|template| self.slots_for_template(template))
            .filter(|&(start, end)| {
                !booked.iter().any(|&(b_start, b_end)| do_overlap(start, end, b_start, b_end))
            })
            .collect();

        candidates.sort_unstable();
        candidates.dedup();

        debug!("Found {} available slots for team member {} on {}",
               candidates.len(), team_member_id, date);

        candidates
            .into_iter()
            .map(|(start, end)| AvailableSlot {
                date,
                start_time: minutes_to_time(start),
                end_time: minutes_to_time(end),
                team_member_id,
            })
            .collect()
    }

    /// Like [`Self::compute_available_slots`], but drops what `now` has already passed.
    pub fn bookable_slots(
        &self,
        templates: &[SlotTemplate],
        appointments: &[Appointment],
        team_member_id: Uuid,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Vec<AvailableSlot> {
        let today = now.date();
        if date < today {
            return vec![];
        }

        let slots = self.compute_available_slots(templates, appointments, team_member_id, date);
        if date > today {
            return slots;
        }

        let now_minutes = now.hour() * 60 + now.minute();
        slots
            .into_iter()
            .filter(|slot| time_to_minutes(&slot.start_time).map_or(false, |start| start > now_minutes))
            .collect()
    }

    /// Dates in `[today, today + lookahead_days)` with at least one bookable slot.
    pub fn compute_available_dates(
        &self,
        templates: &[SlotTemplate],
        appointments: &[Appointment],
        team_member_id: Uuid,
        lookahead_days: u32,
        now: NaiveDateTime,
    ) -> Vec<NaiveDate> {
        let today = now.date();

        let dates: Vec<NaiveDate> = (0..lookahead_days as i64)
            .map(|offset| today + Duration::days(offset))
            .filter(|&date| {
                !self
                    .bookable_slots(templates, appointments, team_member_id, date, now)
                    .is_empty()
            })
            .collect();

        debug!("Team member {} has {} available dates in the next {} days",
               team_member_id, dates.len(), lookahead_days);
        dates
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn slots_for_template(&self, template: &SlotTemplate) -> Vec<(u32, u32)> {
        let (start, end) = match (time_to_minutes(&template.start_time), time_to_minutes(&template.end_time)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Skipping slot template {}: {}", template.id, e);
                return vec![];
            }
        };

        let duration = template.appointment_duration_minutes;
        if duration == 0 {
            warn!("Skipping slot template {}: zero appointment duration", template.id);
            return vec![];
        }

        let lunch = self.lunch_break(template);

        let mut slots = Vec::new();
        let mut current = start;

        // A trailing window shorter than `duration` is dropped.
        while current + duration <= end {
            let slot_end = current + duration;

            let in_lunch = lunch.map_or(false, |(lunch_start, lunch_end)| {
                do_overlap(current, slot_end, lunch_start, lunch_end)
            });

            if !in_lunch {
                slots.push((current, slot_end));
            }

            current = slot_end;
        }

        slots
    }

    fn lunch_break(&self, template: &SlotTemplate) -> Option<(u32, u32)> {
        let (start, end) = match (&template.lunch_break_start, &template.lunch_break_end) {
            (Some(start), Some(end)) => (start, end),
            _ => return None,
        };

        match (time_to_minutes(start), time_to_minutes(end)) {
            (Ok(start), Ok(end)) if start < end => Some((start, end)),
            _ => {
                warn!("Ignoring invalid lunch break on slot template {}", template.id);
                None
            }
        }
    }

    fn booked_intervals(
        &self,
        appointments: &[Appointment],
        team_member_id: Uuid,
        date: NaiveDate,
    ) -> Vec<(u32, u32)> {
        appointments
            .iter()
            .filter(|apt| {
                apt.status.blocks_slot()
                    && apt.date == date
                    && apt.team_member_id == Some(team_member_id)
            })
            .filter_map(|apt| match (time_to_minutes(&apt.start_time), time_to_minutes(&apt.end_time)) {
                (Ok(start), Ok(end)) => Some((start, end)),
                _ => {
                    warn!("Ignoring appointment {} with unparsable times", apt.id);
                    None
                }
            })
            .collect()
    }
}

impl Default for AvailabilityCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// 0 = Sunday ... 6 = Saturday, matching `SlotTemplate::day_of_week`.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}
