use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable interval derived from slot templates minus existing bookings.
///
/// Never persisted; recomputed whenever templates, appointments or the selection change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailableSlot {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub team_member_id: Uuid,
}
