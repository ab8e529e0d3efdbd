// libs/scheduling-cell/src/services/time.rs
use crate::error::TimeParseError;

/// Parses `"HH:MM"` (or `"HH:MM:SS"`, seconds ignored) into minutes since midnight.
///
/// Hours are not capped at 23 (`"25:00"` parses to `1500`); minutes and seconds must be below 60.
pub fn time_to_minutes(time: &str) -> Result<u32, TimeParseError> {
    let mut parts = time.trim().split(':');

    let (hours, minutes) = match (parts.next(), parts.next()) {
        (Some(h), Some(m)) if !h.is_empty() && !m.is_empty() => (h, m),
        _ => return Err(TimeParseError::Format(time.to_string())),
    };

    let seconds = parts.next();
    if parts.next().is_some() {
        return Err(TimeParseError::Format(time.to_string()));
    }

    let hours = parse_component(time, hours, "hour")?;
    let minutes = parse_component(time, minutes, "minute")?;
    if minutes >= 60 {
        return Err(TimeParseError::Format(time.to_string()));
    }

    if let Some(seconds) = seconds {
        if parse_component(time, seconds, "second")? >= 60 {
            return Err(TimeParseError::Format(time.to_string()));
        }
    }

    hours
        .checked_mul(60)
        .and_then(|total| total.checked_add(minutes))
        .ok_or_else(|| TimeParseError::Format(time.to_string()))
}

fn parse_component(time: &str, raw: &str, component: &'static str) -> Result<u32, TimeParseError> {
    raw.parse().map_err(|_| TimeParseError::NotNumeric {
        value: time.to_string(),
        component,
    })
}

/// Formats minutes since midnight as zero-padded `"HH:MM"`. Values past 23:59 are not wrapped.
pub fn minutes_to_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-open overlap of `[start_a, end_a)` and `[start_b, end_b)`; touching ends do not overlap.
pub fn do_overlap<T: PartialOrd>(start_a: T, end_a: T, start_b: T, end_b: T) -> bool {
    start_a < end_b && end_a > start_b
}
