use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

static HHMM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-1][0-9]|2[0-3]):[0-5][0-9]$").expect("valid HH:MM pattern"));

/// Local wall-clock time of day, stored as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Wraps modulo 24h.
    pub fn from_minutes(minutes: u32) -> Self {
        Self((minutes % MINUTES_PER_DAY as u32) as u16)
    }

    /// Strict `HH:MM` (24-hour, two-digit hour).
    pub fn parse(s: &str) -> Option<Self> {
        to_minutes(s).map(Self)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Parse `HH:MM` into `hour * 60 + minute`. `None` for anything that does not
/// match the 24-hour pattern.
pub fn to_minutes(hhmm: &str) -> Option<u16> {
    if !HHMM.is_match(hhmm) {
        return None;
    }
    let (h, m) = hhmm.split_once(':')?;
    Some(h.parse::<u16>().ok()? * 60 + m.parse::<u16>().ok()?)
}

/// Walk length in whole minutes, `round(hours * 60)`.
pub fn duration_minutes(duration_hours: f64) -> u32 {
    (duration_hours * 60.0).round().max(0.0) as u32
}

/// End of a walk as a wall-clock time. Wraps past midnight without any
/// notion of the next day; use [`Window`] for conflict arithmetic.
pub fn add_duration(start: ClockTime, duration_hours: f64) -> ClockTime {
    ClockTime::from_minutes(start.minutes() as u32 + duration_minutes(duration_hours))
}

/// Half-open overlap: `[start_a, end_a)` and `[start_b, end_b)` share an instant.
pub fn overlaps<T: PartialOrd>(start_a: T, end_a: T, start_b: T, end_b: T) -> bool {
    start_a < end_b && end_a > start_b
}

/// Half-open `[start, end)` minute window of a walk on its own date.
/// `end` is not wrapped, so it exceeds [`MINUTES_PER_DAY`] for walks that
/// would run past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u32,
    pub end: u32,
}

impl Window {
    pub fn new(start: ClockTime, duration_hours: f64) -> Self {
        let start = start.minutes() as u32;
        Self {
            start,
            end: start + duration_minutes(duration_hours),
        }
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// Ending exactly at midnight stays on the same date.
    pub fn crosses_midnight(&self) -> bool {
        self.end > MINUTES_PER_DAY as u32
    }

    pub fn start_time(&self) -> ClockTime {
        ClockTime::from_minutes(self.start)
    }

    pub fn end_time(&self) -> ClockTime {
        ClockTime::from_minutes(self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> ClockTime {
        ClockTime::parse(s).unwrap()
    }

    #[test]
    fn to_minutes_basics() {
        assert_eq!(to_minutes("00:00"), Some(0));
        assert_eq!(to_minutes("09:30"), Some(570));
        assert_eq!(to_minutes("23:59"), Some(1439));
    }

    #[test]
    fn to_minutes_rejects_malformed() {
        for bad in ["9:30", "24:00", "12:60", "12-30", "", "ab:cd", " 09:30", "09:30 ", "123:00"] {
            assert_eq!(to_minutes(bad), None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_zero_pads() {
        assert_eq!(ClockTime::from_minutes(65).to_string(), "01:05");
        assert_eq!(ClockTime::from_minutes(0).to_string(), "00:00");
    }

    #[test]
    fn add_duration_simple() {
        assert_eq!(add_duration(t("09:00"), 1.0).to_string(), "10:00");
        assert_eq!(add_duration(t("09:15"), 0.5).to_string(), "09:45");
        assert_eq!(add_duration(t("10:10"), 2.25).to_string(), "12:25");
    }

    #[test]
    fn add_duration_rounds_to_nearest_minute() {
        // 0.51h = 30.6 min
        assert_eq!(add_duration(t("09:00"), 0.51).to_string(), "09:31");
    }

    #[test]
    fn add_duration_wraps_past_midnight() {
        assert_eq!(add_duration(t("20:00"), 6.0).to_string(), "02:00");
        assert_eq!(add_duration(t("16:00"), 8.0).to_string(), "00:00");
    }

    #[test]
    fn add_duration_congruent_modulo_day() {
        let durations = [0.5, 0.75, 1.0, 1.3, 2.5, 3.9, 5.0, 7.75, 8.0];
        for start in (0..MINUTES_PER_DAY).step_by(7) {
            for &d in &durations {
                let end = add_duration(ClockTime::from_minutes(start as u32), d);
                let expected = (start as u32 + (d * 60.0f64).round() as u32) % MINUTES_PER_DAY as u32;
                assert_eq!(end.minutes() as u32, expected, "start={start} d={d}");
                assert_eq!(to_minutes(&end.to_string()), Some(end.minutes()));
            }
        }
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(overlaps(540, 600, 570, 630));
        assert!(!overlaps(540, 600, 600, 660)); // touching
        assert!(!overlaps(600, 660, 540, 600));
        assert!(overlaps(540, 660, 570, 600)); // containment
    }

    #[test]
    fn overlap_reflexive_and_symmetric() {
        let windows = [(0u32, 30u32), (30, 90), (45, 60), (60, 600), (599, 1440), (1000, 1001)];
        for &(s1, e1) in &windows {
            assert!(overlaps(s1, e1, s1, e1));
            for &(s2, e2) in &windows {
                assert_eq!(overlaps(s1, e1, s2, e2), overlaps(s2, e2, s1, e1));
            }
        }
    }

    #[test]
    fn window_midnight_edges() {
        assert!(!Window::new(t("16:00"), 8.0).crosses_midnight());
        assert!(Window::new(t("16:01"), 8.0).crosses_midnight());
        assert!(Window::new(t("20:00"), 6.0).crosses_midnight());
        assert_eq!(Window::new(t("16:00"), 8.0).end, 1440);
    }

    #[test]
    fn window_overlap_uses_unwrapped_end() {
        let late = Window::new(t("22:00"), 2.0);
        let early = Window::new(t("00:00"), 1.0);
        assert!(!late.overlaps(&early));
        assert_eq!(late.end_time().to_string(), "00:00");
    }
}
