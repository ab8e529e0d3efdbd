pub mod availability;
pub mod time;

pub use availability::{day_of_week, AvailabilityCalculator};
pub use time::{do_overlap, minutes_to_time, time_to_minutes};
