use chrono::{NaiveTime, Timelike};

use crate::models::AvailabilityWindow;

/// Minutes since midnight. Interval comparisons run on these integers, never
/// on formatted strings.
pub fn minutes_of_day(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

/// Returns the first window whose [start, end) interval intersects the
/// candidate, or `None`. Half-open semantics: a window ending exactly where
/// another starts does not conflict.
pub fn find_conflict<'a>(
    start: NaiveTime,
    end: NaiveTime,
    existing: &'a [AvailabilityWindow],
) -> Option<&'a AvailabilityWindow> {
    let s1 = minutes_of_day(start);
    let e1 = minutes_of_day(end);

    existing.iter().find(|window| {
        let s2 = minutes_of_day(window.start_time);
        let e2 = minutes_of_day(window.end_time);
        s1 < e2 && s2 < e1
    })
}
