use chrono::NaiveTime;

use crate::models::AvailabilityWindow;
use crate::overlap::minutes_of_day;

/// Expand a window into its ordered slot start times: walk from the window
/// start in fixed `slot_duration_minutes` steps, emitting a slot only while
/// the full duration still fits before the window end. A trailing partial
/// period yields no slot. Pure and deterministic; recomputed on every query.
pub fn generate(window: &AvailabilityWindow) -> Vec<NaiveTime> {
    let duration = window.slot_duration_minutes;
    let mut slots = Vec::new();

    if duration <= 0 {
        return slots;
    }

    let end = minutes_of_day(window.end_time);
    let mut current = minutes_of_day(window.start_time);

    while current + duration <= end {
        if let Some(time) = NaiveTime::from_hms_opt((current / 60) as u32, (current % 60) as u32, 0)
        {
            slots.push(time);
        }
        current += duration;
    }

    slots
}

/// Whether `time` is exactly one of the slot starts this window generates.
/// Used at booking time to re-verify the requested slot against the window
/// without materializing the whole sequence.
pub fn is_slot_start(window: &AvailabilityWindow, time: NaiveTime) -> bool {
    let duration = window.slot_duration_minutes;
    if duration <= 0 {
        return false;
    }

    let start = minutes_of_day(window.start_time);
    let end = minutes_of_day(window.end_time);
    let candidate = minutes_of_day(time);

    candidate >= start && candidate + duration <= end && (candidate - start) % duration == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn window(start: &str, end: &str, duration: i32) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            doctor_name: "Dr. Leila Hart".to_string(),
            day_of_week: 1,
            start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
            slot_duration_minutes: duration,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn time(value: &str) -> NaiveTime {
        NaiveTime::parse_from_str(value, "%H:%M").unwrap()
    }

    #[test]
    fn full_day_window_yields_sixteen_half_hour_slots() {
        let slots = generate(&window("09:00", "17:00", 30));

        assert_eq!(slots.len(), 16);
        assert_eq!(slots.first(), Some(&time("09:00")));
        assert_eq!(slots.last(), Some(&time("16:30")));
        assert!(!slots.contains(&time("16:45")));
        assert!(!slots.contains(&time("17:00")));
    }

    #[test]
    fn trailing_partial_period_is_dropped() {
        let slots = generate(&window("09:00", "09:50", 30));

        assert_eq!(slots, vec![time("09:00")]);
    }

    #[test]
    fn window_shorter_than_one_slot_yields_nothing() {
        assert!(generate(&window("09:00", "09:20", 30)).is_empty());
    }

    #[test]
    fn uneven_division_keeps_only_whole_slots() {
        // 100 minutes / 45-minute slots: 09:00 and 09:45 fit, 10:30 does not
        let slots = generate(&window("09:00", "10:40", 45));

        assert_eq!(slots, vec![time("09:00"), time("09:45")]);
    }

    #[test]
    fn generation_is_deterministic() {
        let w = window("08:15", "12:00", 20);

        assert_eq!(generate(&w), generate(&w));
    }

    #[test]
    fn slot_start_membership_matches_generation() {
        let w = window("09:00", "17:00", 30);

        for slot in generate(&w) {
            assert!(is_slot_start(&w, slot));
        }
        assert!(is_slot_start(&w, time("16:30")));
        assert!(!is_slot_start(&w, time("16:45")));
        assert!(!is_slot_start(&w, time("17:00")));
        assert!(!is_slot_start(&w, time("09:10")));
        assert!(!is_slot_start(&w, time("08:30")));
    }
}
