use regex::Regex;
use std::sync::LazyLock;

/// Interval used when the schedule text matches no known pattern.
pub const DEFAULT_INTERVAL_MINUTES: i32 = 1440;

const MINUTES_PER_HOUR: i32 = 60;
const MINUTES_PER_DAY: i32 = 1440;
const MINUTES_PER_WEEK: i32 = 10080;

enum Pattern {
    /// capture group 1 holds N, result is N * multiplier
    Count(i32),
    Fixed(i32),
}

// evaluated in order, first match wins
static PATTERNS: LazyLock<Vec<(Regex, Pattern)>> = LazyLock::new(|| {
    [
        (r"(?i)\bevery\s+(\d+)\s+minutes?\b", Pattern::Count(1)),
        (r"(?i)\bevery\s+minute\b", Pattern::Fixed(1)),
        (r"(?i)\bevery\s+(\d+)\s+hours?\b", Pattern::Count(MINUTES_PER_HOUR)),
        (r"(?i)\bevery\s+hour\b", Pattern::Fixed(MINUTES_PER_HOUR)),
        (r"(?i)\bevery\s+day\b|\bdaily\b", Pattern::Fixed(MINUTES_PER_DAY)),
        (r"(?i)\bevery\s+week\b|\bweekly\b", Pattern::Fixed(MINUTES_PER_WEEK)),
    ]
    .into_iter()
    .map(|(re, p)| (Regex::new(re).expect("schedule pattern compiles"), p))
    .collect()
});

/// Interval in minutes for a recognised schedule, `None` otherwise.
///
/// A zero or overflowing count is treated as unrecognised.
pub fn try_parse_schedule(text: &str) -> Option<i32> {
    for (re, pattern) in PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };

        return match pattern {
            Pattern::Fixed(minutes) => Some(*minutes),
            Pattern::Count(multiplier) => caps
                .get(1)
                .and_then(|n| n.as_str().parse::<i32>().ok())
                .filter(|n| *n > 0)
                .and_then(|n| n.checked_mul(*multiplier)),
        };
    }
    None
}

/// Turns a cadence description into an interval in minutes.
///
/// Never fails: unrecognised text behaves as a daily schedule.
pub fn parse_schedule(text: &str) -> i32 {
    try_parse_schedule(text).unwrap_or(DEFAULT_INTERVAL_MINUTES)
}
