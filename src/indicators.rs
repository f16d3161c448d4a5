/// Text-pattern scraping of the mining page's visible state.
///
/// Looks for:
/// - countdown values like `01:23:45` or `23:45`
/// - challenge rows marked as still being solved
use regex::Regex;
use std::sync::LazyLock;

/// Label on the control that stops an active session.
pub const STOP_LABEL: &str = "Stop";
/// Label on the control that starts a session.
pub const START_LABEL: &str = "Start";
/// Text next to the time-remaining-until-next-cycle countdown.
pub const NEXT_CYCLE_LABEL: &str = "Next challenge";
/// Text marking a challenge row that is still being solved.
pub const SOLVING_LABEL: &str = "Solving";

/// First `HH:MM:SS` or `MM:SS` group in a piece of text.
static COUNTDOWN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:(\d{1,2}):)?(\d{1,2}):(\d{2})").unwrap());

/// A parsed countdown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Countdown {
    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    /// Total remaining seconds, for log lines.
    pub fn total_secs(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Parse the first countdown found in `text`.
///
/// Accepts `HH:MM:SS` and `MM:SS`. Returns `None` when no countdown
/// appears in the text.
pub fn parse_countdown(text: &str) -> Option<Countdown> {
    let caps = COUNTDOWN_PATTERN.captures(text)?;
    let field = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().parse::<u32>().unwrap_or(0))
            .unwrap_or(0)
    };
    Some(Countdown {
        hours: field(1),
        minutes: field(2),
        seconds: field(3),
    })
}

/// Whether a challenge is currently being solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvingIndicator {
    /// No row matched the solving pattern.
    Absent,
    /// A row matched. `remaining` is `None` when the row carried no
    /// parseable countdown; such rows still count as solving.
    Present { remaining: Option<Countdown> },
}

/// Scan scraped row texts for a solving-in-progress indicator.
///
/// A matching row whose countdown parses as all-zero is treated as
/// finished and skipped. Any other matching row reports `Present`,
/// including rows with no parseable countdown at all.
pub fn solving_indicator(rows: &[String]) -> SolvingIndicator {
    for row in rows {
        if !row.contains(SOLVING_LABEL) {
            continue;
        }
        match parse_countdown(row) {
            Some(countdown) if countdown.is_zero() => continue,
            remaining => return SolvingIndicator::Present { remaining },
        }
    }
    SolvingIndicator::Absent
}
