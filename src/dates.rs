//! Date resolution for scraped schedule fragments.
//! Venues publish dates in wildly different shapes: ISO, `2025年8月27日（水）`,
//! `Friday 9th January`, bare `8/27` with no year, or `Today`. Everything is
//! parsed against a caller-supplied reference date so year inference stays
//! deterministic and testable.

use chrono::{Datelike, Days, NaiveDate};
use unicode_normalization::UnicodeNormalization;

/// Which date-pattern family to try first when fragments are ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    Jp,
    Uk,
    #[default]
    Generic,
}

/// Year-inference policy for fragments that carry no year.
///
/// A month more than `rollover_months` before the reference month is assumed
/// to belong to the next year; more than `rollover_months` after, to the
/// previous year. Sites disagree on the exact window, so it is a knob here
/// rather than a constant.
#[derive(Debug, Clone, Copy)]
pub struct DatePolicy {
    pub rollover_months: i32,
}

impl Default for DatePolicy {
    fn default() -> Self {
        Self { rollover_months: 6 }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unrecognized date fragment: {0:?}")]
    Unrecognized(String),
    #[error("no such calendar date: {year}-{month}-{day}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

const MONTH_NAMES: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sept", 9),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

const WEEKDAY_NAMES: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "mon", "tue",
    "tues", "wed", "thu", "thur", "thurs", "fri", "sat", "sun",
];

/// Resolve a single date fragment with the default 6-month rollover window.
pub fn resolve_date(
    fragment: &str,
    reference: NaiveDate,
    locale: Locale,
) -> Result<NaiveDate, ResolveError> {
    resolve_date_with(fragment, reference, locale, DatePolicy::default())
}

pub fn resolve_date_with(
    fragment: &str,
    reference: NaiveDate,
    locale: Locale,
    policy: DatePolicy,
) -> Result<NaiveDate, ResolveError> {
    // NFKC folds full-width digits and parentheses so the pattern matchers
    // only ever see ASCII digits.
    let text = normalize_fragment(fragment);
    if text.is_empty() {
        return Err(ResolveError::Unrecognized(fragment.to_string()));
    }

    if let Some(d) = parse_relative(&text, reference) {
        return Ok(d);
    }

    let attempts: [fn(&str, NaiveDate, DatePolicy) -> Option<Result<NaiveDate, ResolveError>>; 3] =
        match locale {
            Locale::Jp => [parse_japanese, parse_numeric, parse_uk],
            Locale::Uk => [parse_uk, parse_numeric, parse_japanese],
            Locale::Generic => [parse_numeric, parse_japanese, parse_uk],
        };
    for attempt in attempts {
        if let Some(result) = attempt(&text, reference, policy) {
            return result;
        }
    }
    Err(ResolveError::Unrecognized(fragment.to_string()))
}

/// Resolve a `start～end` range. The end side may omit its month
/// (`2025/8/27～9/9` but also `8月27日～31日`); it inherits the start's month,
/// rolling into the next month (or year, from December) when it would
/// otherwise precede the start.
pub fn resolve_date_range(
    fragment: &str,
    reference: NaiveDate,
    locale: Locale,
) -> Result<(NaiveDate, NaiveDate), ResolveError> {
    resolve_date_range_with(fragment, reference, locale, DatePolicy::default())
}

pub fn resolve_date_range_with(
    fragment: &str,
    reference: NaiveDate,
    locale: Locale,
    policy: DatePolicy,
) -> Result<(NaiveDate, NaiveDate), ResolveError> {
    let text = normalize_fragment(fragment);
    if let Some((start_text, end_text)) = split_range(&text) {
        return resolve_range_pair(start_text, end_text, reference, locale, policy);
    }

    if let Ok(d) = resolve_date_with(fragment, reference, locale, policy) {
        return Ok((d, d));
    }

    // A hyphen can also separate a range ("8/27-9/9"), but ISO dates carry
    // hyphens of their own — so hyphen splits are only attempted once the
    // whole fragment has failed to parse, and only where both halves parse.
    for (idx, _) in text.match_indices('-') {
        let start_text = text[..idx].trim();
        let end_text = text[idx + 1..].trim();
        if start_text.is_empty() || end_text.is_empty() {
            continue;
        }
        if let Ok(pair) = resolve_range_pair(start_text, end_text, reference, locale, policy) {
            return Ok(pair);
        }
    }
    Err(ResolveError::Unrecognized(fragment.to_string()))
}

fn resolve_range_pair(
    start_text: &str,
    end_text: &str,
    reference: NaiveDate,
    locale: Locale,
    policy: DatePolicy,
) -> Result<(NaiveDate, NaiveDate), ResolveError> {
    let start = resolve_date_with(start_text, reference, locale, policy)?;

    // Resolve the end relative to the start so "27～31" stays in the start's
    // month and year inference cannot disagree between the two sides.
    let end = match resolve_date_with(end_text, start, locale, policy) {
        Ok(d) => d,
        Err(_) => match parse_bare_day(end_text) {
            Some(day) => make_date(start.year(), start.month(), day)?,
            None => return Err(ResolveError::Unrecognized(end_text.to_string())),
        },
    };

    let end = if end < start {
        let (year, month) = if start.month() == 12 {
            (start.year() + 1, 1)
        } else {
            (start.year(), start.month() + 1)
        };
        make_date(year, month, end.day())?
    } else {
        end
    };
    Ok((start, end))
}

fn normalize_fragment(fragment: &str) -> String {
    let folded: String = fragment.nfkc().collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_range(text: &str) -> Option<(&str, &str)> {
    for sep in ['～', '〜', '~'] {
        if let Some(idx) = text.find(sep) {
            let start = text[..idx].trim();
            let end = text[idx + sep.len_utf8()..].trim();
            if !start.is_empty() && !end.is_empty() {
                return Some((start, end));
            }
        }
    }
    None
}

fn parse_relative(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_lowercase();
    match lower.as_str() {
        "today" | "本日" | "今日" => Some(reference),
        "tomorrow" | "明日" => reference.checked_add_days(Days::new(1)),
        _ => None,
    }
}

/// `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD`, `M/D`, `M.D` — with an optional
/// trailing weekday in parentheses.
fn parse_numeric(
    text: &str,
    reference: NaiveDate,
    policy: DatePolicy,
) -> Option<Result<NaiveDate, ResolveError>> {
    let text = strip_paren_weekday(text);
    let nums = leading_number_run(text, &['-', '/', '.'])?;
    match nums.as_slice() {
        [year, month, day] if (1000..=9999).contains(year) => {
            Some(make_date(*year as i32, *month, *day))
        }
        [month, day] => Some(infer_year(*month, *day, reference, policy)),
        _ => None,
    }
}

/// `2025年8月27日（水）` or `8月27日`.
fn parse_japanese(
    text: &str,
    reference: NaiveDate,
    policy: DatePolicy,
) -> Option<Result<NaiveDate, ResolveError>> {
    let text = strip_paren_weekday(text);
    if !text.contains('月') {
        return None;
    }
    let (year, rest) = match text.split_once('年') {
        Some((y, rest)) => (y.trim().parse::<i32>().ok(), rest),
        None => (None, text),
    };
    let (month_str, rest) = rest.split_once('月')?;
    let month = month_str.trim().parse::<u32>().ok()?;
    let day_str = rest.trim().trim_end_matches('日');
    let day = day_str.trim().parse::<u32>().ok()?;
    match year {
        Some(y) => Some(make_date(y, month, day)),
        None => Some(infer_year(month, day, reference, policy)),
    }
}

/// `Friday 9th January`, `9 Jan 2026`, `January 9` — weekday name optional,
/// ordinal suffix optional, year optional.
fn parse_uk(
    text: &str,
    reference: NaiveDate,
    policy: DatePolicy,
) -> Option<Result<NaiveDate, ResolveError>> {
    let lower = text.to_lowercase();
    let mut words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    if let Some(first) = words.first() {
        if WEEKDAY_NAMES.contains(first) {
            words.remove(0);
        }
    }

    let mut day: Option<u32> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;
    for word in words {
        if let Some(m) = month_from_name(word) {
            month = Some(m);
        } else if let Some(n) = parse_ordinal_day(word) {
            if n >= 1000 {
                year = Some(n as i32);
            } else if day.is_none() {
                day = Some(n);
            } else {
                return None;
            }
        } else {
            return None;
        }
    }

    let (day, month) = (day?, month?);
    match year {
        Some(y) => Some(make_date(y, month, day)),
        None => Some(infer_year(month, day, reference, policy)),
    }
}

fn month_from_name(word: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, m)| *m)
}

/// "9", "9th", "21st" → 9 / 9 / 21. Plain 4-digit numbers pass through as-is
/// so the caller can treat them as years.
fn parse_ordinal_day(word: &str) -> Option<u32> {
    let digits: String = word.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let suffix = &word[digits.len()..];
    if !matches!(suffix, "" | "st" | "nd" | "rd" | "th") {
        return None;
    }
    digits.parse().ok()
}

fn parse_bare_day(text: &str) -> Option<u32> {
    let text = strip_paren_weekday(text).trim_end_matches('日');
    let day: u32 = text.trim().parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

/// Drop a trailing parenthesized weekday marker: "8/27(水)" → "8/27".
/// NFKC has already folded （水） to (水).
fn strip_paren_weekday(text: &str) -> &str {
    match text.find('(') {
        Some(idx) if text.trim_end().ends_with(')') => text[..idx].trim(),
        _ => text.trim(),
    }
}

/// Leading run of separator-joined numbers: "8/27 rest" → [8, 27].
fn leading_number_run(text: &str, seps: &[char]) -> Option<Vec<u32>> {
    let mut nums = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if seps.contains(&c) && !current.is_empty() {
            nums.push(current.parse().ok()?);
            current.clear();
        } else {
            break;
        }
    }
    if !current.is_empty() {
        nums.push(current.parse().ok()?);
    }
    if nums.len() >= 2 { Some(nums) } else { None }
}

fn make_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, ResolveError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(ResolveError::InvalidDate { year, month, day })
}

/// Pick the year that places `month/day` nearest the reference date, using
/// the policy's rollover window to decide when a month has wrapped around a
/// year boundary.
fn infer_year(
    month: u32,
    day: u32,
    reference: NaiveDate,
    policy: DatePolicy,
) -> Result<NaiveDate, ResolveError> {
    let diff = reference.month() as i32 - month as i32;
    let year = if diff > policy.rollover_months {
        reference.year() + 1
    } else if diff < -policy.rollover_months {
        reference.year() - 1
    } else {
        reference.year()
    };
    make_date(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn iso_round_trip() {
        let reference = date(2025, 8, 1);
        for iso in ["2025-08-27", "2025-12-31", "2026-02-28"] {
            let resolved = resolve_date(iso, reference, Locale::Generic).unwrap();
            assert_eq!(resolved.format("%Y-%m-%d").to_string(), iso);
        }
    }

    #[test]
    fn slash_and_dot_forms() {
        let reference = date(2025, 8, 1);
        assert_eq!(
            resolve_date("2025/8/27", reference, Locale::Generic).unwrap(),
            date(2025, 8, 27)
        );
        assert_eq!(
            resolve_date("2025.08.27", reference, Locale::Generic).unwrap(),
            date(2025, 8, 27)
        );
    }

    #[test]
    fn month_day_without_year_uses_reference_year() {
        let reference = date(2025, 8, 1);
        assert_eq!(
            resolve_date("8/27", reference, Locale::Generic).unwrap(),
            date(2025, 8, 27)
        );
    }

    #[test]
    fn month_day_rolls_into_next_year() {
        // January seen from November is two months "before" → next year.
        let reference = date(2025, 11, 20);
        assert_eq!(
            resolve_date("1/15", reference, Locale::Generic).unwrap(),
            date(2026, 1, 15)
        );
    }

    #[test]
    fn month_day_rolls_into_previous_year() {
        // December seen from January belongs to the year just ended.
        let reference = date(2026, 1, 5);
        assert_eq!(
            resolve_date("12/28", reference, Locale::Generic).unwrap(),
            date(2025, 12, 28)
        );
    }

    #[test]
    fn rollover_window_is_configurable() {
        let reference = date(2025, 11, 20);
        let tight = DatePolicy { rollover_months: 10 };
        // With a 10-month window January still counts as this year.
        assert_eq!(
            resolve_date_with("1/15", reference, Locale::Generic, tight).unwrap(),
            date(2025, 1, 15)
        );
    }

    #[test]
    fn japanese_full_form_with_weekday() {
        let reference = date(2025, 8, 1);
        assert_eq!(
            resolve_date("2025年8月27日（水）", reference, Locale::Jp).unwrap(),
            date(2025, 8, 27)
        );
    }

    #[test]
    fn japanese_month_day_only() {
        let reference = date(2025, 8, 1);
        assert_eq!(
            resolve_date("8月27日", reference, Locale::Jp).unwrap(),
            date(2025, 8, 27)
        );
    }

    #[test]
    fn full_width_digits_accepted() {
        let reference = date(2025, 8, 1);
        assert_eq!(
            resolve_date("８月２７日", reference, Locale::Jp).unwrap(),
            date(2025, 8, 27)
        );
    }

    #[test]
    fn uk_ordinal_day_without_year() {
        let reference = date(2026, 1, 1);
        assert_eq!(
            resolve_date("Friday 9th January", reference, Locale::Uk).unwrap(),
            date(2026, 1, 9)
        );
    }

    #[test]
    fn uk_day_month_year() {
        let reference = date(2025, 12, 1);
        assert_eq!(
            resolve_date("9 Jan 2026", reference, Locale::Uk).unwrap(),
            date(2026, 1, 9)
        );
        assert_eq!(
            resolve_date("Wednesday 7th January 2026", reference, Locale::Uk).unwrap(),
            date(2026, 1, 7)
        );
    }

    #[test]
    fn relative_tokens() {
        let reference = date(2025, 8, 31);
        assert_eq!(
            resolve_date("Today", reference, Locale::Generic).unwrap(),
            reference
        );
        assert_eq!(
            resolve_date("Tomorrow", reference, Locale::Generic).unwrap(),
            date(2025, 9, 1)
        );
        assert_eq!(
            resolve_date("明日", reference, Locale::Jp).unwrap(),
            date(2025, 9, 1)
        );
    }

    #[test]
    fn range_with_explicit_months() {
        let reference = date(2025, 8, 1);
        let (start, end) =
            resolve_date_range("2025/8/27（水）～9/9（火）", reference, Locale::Jp).unwrap();
        assert_eq!(start, date(2025, 8, 27));
        assert_eq!(end, date(2025, 9, 9));
    }

    #[test]
    fn range_end_inherits_month() {
        let reference = date(2025, 8, 1);
        let (start, end) = resolve_date_range("8月27日～31日", reference, Locale::Jp).unwrap();
        assert_eq!(start, date(2025, 8, 27));
        assert_eq!(end, date(2025, 8, 31));
    }

    #[test]
    fn range_end_before_start_rolls_month() {
        let reference = date(2025, 8, 1);
        let (start, end) = resolve_date_range("8月27日～2日", reference, Locale::Jp).unwrap();
        assert_eq!(start, date(2025, 8, 27));
        assert_eq!(end, date(2025, 9, 2));
    }

    #[test]
    fn range_end_before_start_in_december_rolls_year() {
        let reference = date(2025, 12, 1);
        let (start, end) = resolve_date_range("12月28日～3日", reference, Locale::Jp).unwrap();
        assert_eq!(start, date(2025, 12, 28));
        assert_eq!(end, date(2026, 1, 3));
    }

    #[test]
    fn hyphen_range_splits_when_whole_fragment_fails() {
        let reference = date(2025, 8, 1);
        let (start, end) = resolve_date_range("8/27-9/9", reference, Locale::Jp).unwrap();
        assert_eq!(start, date(2025, 8, 27));
        assert_eq!(end, date(2025, 9, 9));

        let reference = date(2026, 1, 1);
        let (start, end) = resolve_date_range("9 Jan - 12 Jan", reference, Locale::Uk).unwrap();
        assert_eq!(start, date(2026, 1, 9));
        assert_eq!(end, date(2026, 1, 12));
    }

    #[test]
    fn iso_fragment_keeps_its_hyphens() {
        let reference = date(2025, 8, 1);
        let (start, end) = resolve_date_range("2025-08-27", reference, Locale::Generic).unwrap();
        assert_eq!(start, date(2025, 8, 27));
        assert_eq!(end, date(2025, 8, 27));
    }

    #[test]
    fn single_date_treated_as_degenerate_range() {
        let reference = date(2025, 8, 1);
        let (start, end) = resolve_date_range("8/27", reference, Locale::Jp).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn invalid_calendar_date_is_an_error() {
        let reference = date(2025, 8, 1);
        assert_eq!(
            resolve_date("2025-02-30", reference, Locale::Generic),
            Err(ResolveError::InvalidDate {
                year: 2025,
                month: 2,
                day: 30
            })
        );
    }

    #[test]
    fn garbage_is_unrecognized() {
        let reference = date(2025, 8, 1);
        assert!(matches!(
            resolve_date("coming soon", reference, Locale::Generic),
            Err(ResolveError::Unrecognized(_))
        ));
        assert!(matches!(
            resolve_date("", reference, Locale::Generic),
            Err(ResolveError::Unrecognized(_))
        ));
    }
}
