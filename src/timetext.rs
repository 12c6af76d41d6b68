//! Date-time string parsing, rendering, and completion.
//!
//! Transcript authors write times in a small but heterogeneous set of shapes:
//! CJK dates (`2023年9月30日 21:30`, optionally with a weekday token), dashed
//! and slashed dates (`2023-09-30 21:30`, `2023/9/30`), bare times (`08:23`),
//! and `~`-separated ranges. This module owns the whole catalog:
//!
//! - [`parse_single`] tries the catalog most-specific-first and produces a
//!   structured value.
//! - [`sort_timestamp`] turns any of the above (including ranges, which sort
//!   by their arithmetic midpoint) into a comparable number, with 0 as the
//!   "unparseable/unknown" sentinel.
//! - [`format_to_pattern`] re-renders a datetime in whichever catalog shape a
//!   reference string uses, so completed values blend into the surrounding
//!   text.
//! - [`complete_value`] rewrites an empty or bare `HH:MM` value using a
//!   reference time found elsewhere in the same message.
//!
//! Nothing here touches the wall clock: "today" for bare times is the
//! caller-supplied reference datetime, which keeps the pipeline a pure
//! function of its inputs.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Sort sentinel for values the catalog cannot parse. Downstream ordering
/// treats this as "earliest/unknown" rather than an error.
pub(crate) const UNPARSEABLE: i64 = 0;

/// A parsed date-time value with its precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedTime {
    pub dt: NaiveDateTime,
    /// Year/month/day were written out (not inferred from the reference).
    pub has_date: bool,
    /// Hour/minute were written out.
    pub has_time: bool,
}

/// Textual shapes the renderer can reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimePattern {
    /// `YYYY年MM月DD日 HH:MM`
    CjkDateTime,
    /// `YY年MM月DD日 HH:MM`
    CjkDateTimeShortYear,
    /// `YYYY-MM-DD HH:MM` (also the default)
    DashDateTime,
    /// `YYYY/MM/DD HH:MM`
    SlashDateTime,
}

fn full_year(raw: &str) -> i32 {
    // Transcripts are contemporary logs; 2-digit years complete to 2000+YY.
    let y: i32 = raw.parse().unwrap_or(0);
    if raw.len() == 2 { 2000 + y } else { y }
}

fn date_from(raw_year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(full_year(raw_year), month.parse().ok()?, day.parse().ok()?)
}

fn time_from(hour: &str, minute: &str) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

/// Parse one (non-range) value against the format catalog, most specific
/// first. `reference` supplies the date for bare `HH:MM` values.
pub(crate) fn parse_single(s: &str, reference: NaiveDateTime) -> Option<ParsedTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Date + optional weekday + time, CJK separators.
    if let Some(caps) =
        regex!(r"^(\d{4}|\d{2})年(\d{1,2})月(\d{1,2})日\s*(?:(?:星期|週|周)[一二三四五六日天])?\s*(\d{1,2}):(\d{2})$")
            .captures(s)
    {
        let date = date_from(&caps[1], &caps[2], &caps[3])?;
        let time = time_from(&caps[4], &caps[5])?;
        return Some(ParsedTime { dt: NaiveDateTime::new(date, time), has_date: true, has_time: true });
    }

    // Date + optional weekday + time, dash/slash separators.
    if let Some(caps) = regex!(
        r"^(\d{4}|\d{2})([-/])(\d{1,2})([-/])(\d{1,2})\s*(?:(?:星期|週|周)[一二三四五六日天])?\s+(\d{1,2}):(\d{2})$"
    )
    .captures(s)
    {
        if caps[2] != caps[4] {
            return None;
        }
        let date = date_from(&caps[1], &caps[3], &caps[5])?;
        let time = time_from(&caps[6], &caps[7])?;
        return Some(ParsedTime { dt: NaiveDateTime::new(date, time), has_date: true, has_time: true });
    }

    // Date only, CJK separators.
    if let Some(caps) = regex!(r"^(\d{4}|\d{2})年(\d{1,2})月(\d{1,2})日\s*(?:(?:星期|週|周)[一二三四五六日天])?$").captures(s) {
        let date = date_from(&caps[1], &caps[2], &caps[3])?;
        return Some(ParsedTime { dt: date.and_hms_opt(0, 0, 0)?, has_date: true, has_time: false });
    }

    // Date only, dash/slash separators.
    if let Some(caps) = regex!(r"^(\d{4}|\d{2})([-/])(\d{1,2})([-/])(\d{1,2})$").captures(s) {
        if caps[2] != caps[4] {
            return None;
        }
        let date = date_from(&caps[1], &caps[3], &caps[5])?;
        return Some(ParsedTime { dt: date.and_hms_opt(0, 0, 0)?, has_date: true, has_time: false });
    }

    // Bare time: implicitly the reference's date.
    if let Some(caps) = regex!(r"^(\d{1,2}):(\d{2})$").captures(s) {
        let time = time_from(&caps[1], &caps[2])?;
        return Some(ParsedTime { dt: NaiveDateTime::new(reference.date(), time), has_date: false, has_time: true });
    }

    None
}

/// `true` for a lone `HH:MM` with nothing else around it.
pub(crate) fn is_bare_time(s: &str) -> bool {
    regex!(r"^(\d{1,2}):(\d{2})$").is_match(s.trim())
}

/// `true` when the value spells out a full year/month/day.
pub(crate) fn has_full_date(s: &str, reference: NaiveDateTime) -> bool {
    parse_single(s, reference).is_some_and(|p| p.has_date)
}

/// Comparable timestamp for sorting. Ranges (`a~b`) sort by the midpoint of
/// the two endpoints; a half-parseable range uses the parseable side; a fully
/// unparseable value yields [`UNPARSEABLE`].
pub(crate) fn sort_timestamp(s: &str, reference: NaiveDateTime) -> i64 {
    let s = s.trim();

    if let Some((left, right)) = split_range(s) {
        let a = parse_single(left, reference).map(|p| p.dt.and_utc().timestamp());
        let b = parse_single(right, reference).map(|p| p.dt.and_utc().timestamp());
        return match (a, b) {
            (Some(a), Some(b)) => (a + b) / 2,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => UNPARSEABLE,
        };
    }

    parse_single(s, reference).map(|p| p.dt.and_utc().timestamp()).unwrap_or(UNPARSEABLE)
}

fn split_range(s: &str) -> Option<(&str, &str)> {
    let idx = s.find(['~', '～'])?;
    let sep_len = s[idx..].chars().next().map(char::len_utf8).unwrap_or(1);
    Some((&s[..idx], &s[idx + sep_len..]))
}

/// Detect which catalog shape `reference` uses. Anything unrecognized falls
/// back to the ISO-like dash shape.
pub(crate) fn detect_pattern(reference: &str) -> TimePattern {
    let reference = reference.trim();
    if regex!(r"^\d{4}年").is_match(reference) {
        TimePattern::CjkDateTime
    } else if regex!(r"^\d{2}年").is_match(reference) {
        TimePattern::CjkDateTimeShortYear
    } else if regex!(r"^(\d{4}|\d{2})/").is_match(reference) {
        TimePattern::SlashDateTime
    } else {
        TimePattern::DashDateTime
    }
}

/// Render `dt` in the shape that `reference` uses.
pub(crate) fn format_to_pattern(reference: &str, dt: NaiveDateTime) -> String {
    match detect_pattern(reference) {
        TimePattern::CjkDateTime => format!(
            "{:04}年{:02}月{:02}日 {:02}:{:02}",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute()
        ),
        TimePattern::CjkDateTimeShortYear => format!(
            "{:02}年{:02}月{:02}日 {:02}:{:02}",
            dt.year() % 100,
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute()
        ),
        TimePattern::SlashDateTime => dt.format("%Y/%m/%d %H:%M").to_string(),
        TimePattern::DashDateTime => dt.format("%Y-%m-%d %H:%M").to_string(),
    }
}

/// A reference time found in the same message group, kept in both textual and
/// parsed form so completion can either copy the text verbatim or re-render.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceTime {
    pub text: String,
    pub dt: NaiveDateTime,
}

impl ReferenceTime {
    /// Accept `value` as a reference only when it spells out a full date.
    pub(crate) fn from_value(value: &str, now: NaiveDateTime) -> Option<ReferenceTime> {
        let parsed = parse_single(value, now)?;
        if !parsed.has_date {
            return None;
        }
        Some(ReferenceTime { text: value.trim().to_string(), dt: parsed.dt })
    }
}

/// Complete a partial time value against `reference`:
///
/// - empty value: the full reference string, verbatim
/// - bare `HH:MM`: the reference's year/month/day combined with the written
///   hour/minute, rendered in the reference's textual pattern
/// - anything else: `None` (left unchanged by the caller)
pub(crate) fn complete_value(reference: &ReferenceTime, value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(reference.text.clone());
    }
    if is_bare_time(trimmed) {
        let caps = regex!(r"^(\d{1,2}):(\d{2})$").captures(trimmed)?;
        let time = time_from(&caps[1], &caps[2])?;
        let combined = NaiveDateTime::new(reference.dt.date(), time);
        return Some(format_to_pattern(&reference.text, combined));
    }
    None
}
