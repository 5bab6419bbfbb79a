//! Query windows and the date-window chunker
//!
//! A [`QueryWindow`] is an inclusive range of whole calendar days evaluated in a
//! fixed reference offset: it starts at `00:00:00.000` of its first day and ends
//! at `23:59:59.999` of its last day. Bounds are rendered for the wire as UTC
//! instants (`2024-03-31T18:30:00.000Z` for an IST midnight).
//!
//! Some portal resources cap the span a single query may cover. For those,
//! [`chunk_window`] splits a window into contiguous, non-overlapping chunks of at
//! most `max_span_days` days each.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// Window construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    /// Start date falls after end date
    #[error("window start {start} is after window end {end}")]
    StartAfterEnd {
        /// First day requested
        start: NaiveDate,
        /// Last day requested
        end: NaiveDate,
    },

    /// Chunk span of zero days
    #[error("maximum chunk span must be at least one day")]
    ZeroSpan,

    /// Date string could not be parsed
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Offset string could not be parsed
    #[error("invalid UTC offset '{0}': expected +HH:MM or -HH:MM")]
    InvalidOffset(String),

    /// Day boundary has no representable UTC instant
    #[error("date {0} is out of range for the reference offset")]
    OutOfRange(NaiveDate),
}

/// Inclusive, day-granular query window in a fixed reference offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    first_day: NaiveDate,
    last_day: NaiveDate,
    offset: FixedOffset,
}

impl QueryWindow {
    /// Build a window covering `first_day..=last_day` in `offset`.
    pub fn new(
        first_day: NaiveDate,
        last_day: NaiveDate,
        offset: FixedOffset,
    ) -> Result<Self, WindowError> {
        if first_day > last_day {
            return Err(WindowError::StartAfterEnd {
                start: first_day,
                end: last_day,
            });
        }
        let window = Self {
            first_day,
            last_day,
            offset,
        };
        window
            .checked_at(first_day, NaiveTime::MIN)
            .ok_or(WindowError::OutOfRange(first_day))?;
        window
            .checked_at(last_day, end_of_day())
            .ok_or(WindowError::OutOfRange(last_day))?;
        Ok(window)
    }

    /// Build a UTC window from two `YYYY-MM-DD` strings.
    pub fn parse_utc(first_day: &str, last_day: &str) -> Result<Self, WindowError> {
        Self::new(parse_date(first_day)?, parse_date(last_day)?, utc_offset())
    }

    /// First calendar day (inclusive)
    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// Last calendar day (inclusive)
    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    /// Reference offset the day boundaries are evaluated in
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.last_day - self.first_day).num_days() + 1
    }

    /// Start instant: 00:00:00.000 of the first day
    pub fn start(&self) -> DateTime<FixedOffset> {
        self.at(self.first_day, NaiveTime::MIN)
    }

    /// End instant: 23:59:59.999 of the last day
    pub fn end(&self) -> DateTime<FixedOffset> {
        self.at(self.last_day, end_of_day())
    }

    /// Start bound as sent on the wire
    pub fn start_param(&self) -> String {
        wire_timestamp(self.start())
    }

    /// End bound as sent on the wire
    pub fn end_param(&self) -> String {
        wire_timestamp(self.end())
    }

    // Both bounds are checked in `new`, so the fallback is never taken.
    fn at(&self, day: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
        self.checked_at(day, time)
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC.fixed_offset())
    }

    // A fixed offset has no gaps or folds; only the calendar range can fail.
    fn checked_at(&self, day: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
        let utc = day.and_time(time).checked_sub_signed(self.offset_duration())?;
        Some(DateTime::from_naive_utc_and_offset(utc, self.offset))
    }

    fn offset_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.first_day, self.last_day)
    }
}

impl Serialize for QueryWindow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("QueryWindow", 4)?;
        state.serialize_field("first_day", &self.first_day.to_string())?;
        state.serialize_field("last_day", &self.last_day.to_string())?;
        state.serialize_field("start", &self.start_param())?;
        state.serialize_field("end", &self.end_param())?;
        state.end()
    }
}

/// Split `window` into chunks of at most `max_span_days` days.
///
/// Each chunk ends at `min(start + max_span_days - 1, window end)` and the next
/// chunk starts the following calendar day. The chunks are contiguous, never
/// overlap, never leave the window, and a window no longer than the span comes
/// back as a single chunk.
pub fn chunk_window(
    window: &QueryWindow,
    max_span_days: u32,
) -> Result<Vec<QueryWindow>, WindowError> {
    if max_span_days == 0 {
        return Err(WindowError::ZeroSpan);
    }

    let step = Duration::days(i64::from(max_span_days) - 1);
    let mut chunks = Vec::new();
    let mut chunk_start = window.first_day;

    while chunk_start <= window.last_day {
        let chunk_end = chunk_start
            .checked_add_signed(step)
            .map_or(window.last_day, |day| day.min(window.last_day));
        chunks.push(QueryWindow::new(chunk_start, chunk_end, window.offset)?);

        match chunk_end.succ_opt() {
            Some(next) => chunk_start = next,
            None => break,
        }
    }

    Ok(chunks)
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(input: &str) -> Result<NaiveDate, WindowError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| WindowError::InvalidDate(input.to_string()))
}

/// Parse a `+HH:MM` / `-HH:MM` offset (`Z` is accepted for UTC)
pub fn parse_offset(input: &str) -> Result<FixedOffset, WindowError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("z") {
        return Ok(utc_offset());
    }

    let invalid = || WindowError::InvalidOffset(input.to_string());
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// The UTC offset
pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn wire_timestamp(instant: DateTime<FixedOffset>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
