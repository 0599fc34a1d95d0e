//! Showtime resolution. Sites publish `13:30`, `１３：３０`, `8.45pm`,
//! `午後7時`, door/start pairs like `開場18:00/開映18:30`, and ranges like
//! `12:50-14:28`. Only the screening start time is a showtime: door-open
//! times and range ends are discarded.

use chrono::NaiveTime;
use unicode_normalization::UnicodeNormalization;

/// Resolve a time fragment to the screening start time, or `None` when the
/// fragment contains no valid clock time.
pub fn resolve_time(fragment: &str) -> Option<NaiveTime> {
    let text: String = fragment.nfkc().collect::<String>().to_lowercase();
    let compact: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.is_empty() {
        return None;
    }

    let chars: Vec<char> = compact.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let Some((candidate, consumed)) = parse_clock_at(&chars, i) else {
            // Skip the whole digit run so "2026" is not retried as "026".
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            continue;
        };
        let end = i + consumed;
        if candidate.is_none()
            || is_price(&chars[..i])
            || is_doors_open(&chars[..i])
            || is_range_end(&chars[..i])
            || ends_screening(&chars, end)
        {
            i = end;
            continue;
        }
        return candidate;
    }
    None
}

/// Canonical zero-padded `HH:MM` rendering.
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse one clock time starting at `start` (which must be a digit).
/// Returns `Some((time, chars_consumed))` when the shape is a clock time;
/// the inner Option is `None` for out-of-range values, which are rejected
/// rather than clamped.
fn parse_clock_at(chars: &[char], start: usize) -> Option<(Option<NaiveTime>, usize)> {
    let mut i = start;
    let mut hour: u32 = 0;
    let mut hour_digits = 0;
    while i < chars.len() && chars[i].is_ascii_digit() && hour_digits < 2 {
        hour = hour * 10 + chars[i].to_digit(10).unwrap();
        hour_digits += 1;
        i += 1;
    }
    if i < chars.len() && chars[i].is_ascii_digit() {
        return None; // three or more digits is a year or a price, not a time
    }

    let mut minute: u32 = 0;
    let mut has_minutes = false;
    if i < chars.len() && matches!(chars[i], ':' | '.' | '時') {
        let kanji = chars[i] == '時';
        let sep = i;
        i += 1;
        let mut digits = 0;
        while i < chars.len() && chars[i].is_ascii_digit() && digits < 2 {
            minute = minute * 10 + chars[i].to_digit(10).unwrap();
            digits += 1;
            i += 1;
        }
        if digits == 2 && !(i < chars.len() && chars[i].is_ascii_digit()) {
            has_minutes = true;
            if kanji && i < chars.len() && chars[i] == '分' {
                i += 1;
            }
        } else if kanji && digits == 0 {
            // "19時" — on the hour
            has_minutes = true;
            minute = 0;
        } else {
            // "8.5" or "1.300" is not a clock time
            i = sep;
            minute = 0;
        }
    }

    // am/pm suffix (optionally space-separated), or an earlier 午前/午後 prefix
    let mut meridiem = leading_meridiem(&chars[..start]);
    let mut j = i;
    if j < chars.len() && chars[j] == ' ' {
        j += 1;
    }
    if meridiem.is_none() && j + 1 < chars.len() {
        match (chars[j], chars[j + 1]) {
            ('a', 'm') => {
                meridiem = Some(Meridiem::Am);
                i = j + 2;
                has_minutes = true;
            }
            ('p', 'm') => {
                meridiem = Some(Meridiem::Pm);
                i = j + 2;
                has_minutes = true;
            }
            _ => {}
        }
    }
    if !has_minutes {
        return None;
    }

    let hour = match meridiem {
        Some(Meridiem::Am) if hour == 12 => 0,
        Some(Meridiem::Pm) if hour < 12 => hour + 12,
        Some(_) if hour > 12 => return Some((None, i - start)),
        _ => hour,
    };
    Some((NaiveTime::from_hms_opt(hour, minute, 0), i - start))
}

#[derive(Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

/// Japanese meridiem markers directly before the digits: 午前7時 / 午後7時.
fn leading_meridiem(before: &[char]) -> Option<Meridiem> {
    let n = before.len();
    if n >= 2 && before[n - 2] == '午' {
        match before[n - 1] {
            '前' => return Some(Meridiem::Am),
            '後' => return Some(Meridiem::Pm),
            _ => {}
        }
    }
    None
}

/// Currency marker right before the digits means a price, not a time.
fn is_price(before: &[char]) -> bool {
    matches!(before.last(), Some('£' | '$' | '¥' | '€'))
}

/// Doors-open context right before the time: 開場18:00, オープン, "open".
fn is_doors_open(before: &[char]) -> bool {
    let tail: String = before[before.len().saturating_sub(8)..].iter().collect();
    tail.contains("開場") || tail.contains("オープン") || tail.contains("open")
}

/// True when the digits sit on the right side of a range separator, i.e. a
/// previous clock time followed by `-`/`〜` leads directly here.
fn is_range_end(before: &[char]) -> bool {
    let mut idx = before.len();
    while idx > 0 && before[idx - 1] == ' ' {
        idx -= 1;
    }
    if idx == 0 || !matches!(before[idx - 1], '-' | '~' | '～' | '〜') {
        return false;
    }
    idx -= 1;
    while idx > 0 && before[idx - 1] == ' ' {
        idx -= 1;
    }
    idx > 0 && before[idx - 1].is_ascii_digit()
}

/// True when the time is immediately flagged as an end time (終映18:30 style
/// suffixes such as "18:30終").
fn ends_screening(chars: &[char], end: usize) -> bool {
    chars.get(end) == Some(&'終')
}
