//! Title cleaning and match-key derivation.
//!
//! Schedule pages decorate titles with festival brackets, format suffixes and
//! crew credits (`【4K】カサブランカ（字幕版）`, `シャイニング　監督：スタン
//! リー・キューブリック`); detail pages carry the bare title. Display
//! cleaning strips the decoration, and the match key collapses what remains
//! to an NFKC-lowercased, whitespace-free string so the two sides join.

use std::fmt;

use unicode_normalization::UnicodeNormalization;

/// Crew annotations start at one of these keywords; everything from the
/// keyword onward is credit text, not title.
const ROLE_KEYWORDS: &[&str] = &["監督", "撮影", "音楽", "脚本", "出演", "主演", "演出", "原作"];

/// Parenthesized annotations dropped from display titles when their content
/// contains one of these format/version markers.
const FORMAT_MARKERS: &[&str] = &[
    "4k",
    "2k",
    "35mm",
    "70mm",
    "16mm",
    "3d",
    "imax",
    "字幕",
    "吹替",
    "吹き替え",
    "リマスター",
    "レストア",
    "デジタル",
    "remaster",
    "restoration",
    "restored",
    "subtitled",
    "subtitles",
    "dubbed",
    "re-release",
    "rerelease",
];

/// Normalized join key. Derived only; never part of the output record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey(String);

impl MatchKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bracket pairs recognized by both cleaning passes.
const BRACKET_PAIRS: &[(char, char)] = &[
    ('【', '】'),
    ('〈', '〉'),
    ('《', '》'),
    ('(', ')'),
    ('（', '）'),
    ('[', ']'),
    ('［', '］'),
];

/// Clean a raw title for display: drop festival/format decoration and crew
/// credits, fold full-width punctuation, collapse whitespace. The original
/// script is kept as-is.
pub fn clean_display_title(raw: &str) -> String {
    let mut text = cut_at_role_keyword(raw);
    text = strip_annotation_brackets(&text);
    text = unwrap_quotes(&text);
    let folded = fold_punctuation(&text);
    collapse_whitespace(&folded)
}

/// Derive the match key, or `None` when nothing titular survives cleaning —
/// the caller must then fall back to another title source or drop the record.
///
/// Idempotent: feeding a key back through yields the same key.
pub fn normalize_for_matching(raw: &str) -> Option<MatchKey> {
    let display = clean_display_title(raw);
    let stripped = strip_all_brackets(&display);
    let key: String = stripped
        .nfkc()
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '『' | '』' | '「' | '」'))
        .collect();
    if key.is_empty() { None } else { Some(MatchKey(key)) }
}

/// Truncate at the first crew keyword, unless the title itself starts with
/// one (a documentary called 監督… stays intact).
fn cut_at_role_keyword(text: &str) -> String {
    let mut cut = text.len();
    for keyword in ROLE_KEYWORDS {
        if let Some(idx) = text.find(keyword) {
            if idx > 0 && idx < cut {
                cut = idx;
            }
        }
    }
    text[..cut]
        .trim_end_matches(|c: char| {
            c.is_whitespace() || matches!(c, '／' | '/' | '・' | ':' | '：' | '-' | '－' | '|')
        })
        .to_string()
}

/// Drop 【…】/〈…〉/《…》 groups outright, and round/square groups whose
/// content is a format annotation. Meaningful parentheses (alternate titles,
/// years in the title proper) are kept.
fn strip_annotation_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'outer: while !rest.is_empty() {
        for &(open, close) in BRACKET_PAIRS {
            if let Some(stripped) = rest.strip_prefix(open) {
                if let Some(end) = stripped.find(close) {
                    let content = &stripped[..end];
                    let always_drop = matches!(open, '【' | '〈' | '《');
                    if always_drop || is_format_annotation(content) {
                        rest = &stripped[end + close.len_utf8()..];
                    } else {
                        out.push(open);
                        out.push_str(content);
                        out.push(close);
                        rest = &stripped[end + close.len_utf8()..];
                    }
                    continue 'outer;
                }
            }
        }
        let c = rest.chars().next().unwrap();
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn is_format_annotation(content: &str) -> bool {
    let folded: String = content.nfkc().collect::<String>().to_lowercase();
    let folded = folded.trim();
    FORMAT_MARKERS.iter().any(|m| folded.contains(m))
}

/// Remove one enclosing 『…』 or 「…」 pair.
fn unwrap_quotes(text: &str) -> String {
    let trimmed = text.trim();
    for (open, close) in [('『', '』'), ('「', '」')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            // Only unwrap a single balanced pair, not 『A』×『B』.
            if !inner.contains(open) && !inner.contains(close) {
                return inner.to_string();
            }
        }
    }
    trimmed.to_string()
}

/// Full-width punctuation seen in titles, folded to half-width. The ideographic
/// space becomes a plain space; letters and digits are left alone so display
/// titles keep their original script.
fn fold_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '　' => ' ',
            '！' => '!',
            '？' => '?',
            '：' => ':',
            '；' => ';',
            '，' => ',',
            '．' => '.',
            '（' => '(',
            '）' => ')',
            '／' => '/',
            '＆' => '&',
            '－' => '-',
            other => other,
        })
        .collect()
}

/// Remove every bracket pair and its contents. Unbalanced openers drop the
/// tail — scraped fragments are sometimes truncated mid-annotation.
fn strip_all_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        if BRACKET_PAIRS.iter().any(|&(open, _)| c == open) {
            depth += 1;
        } else if BRACKET_PAIRS.iter().any(|&(_, close)| c == close) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            out.push(c);
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_format_brackets() {
        assert_eq!(clean_display_title("【4K】カサブランカ（字幕版）"), "カサブランカ");
        assert_eq!(clean_display_title("市民ケーン【デジタルリマスター】"), "市民ケーン");
        assert_eq!(clean_display_title("The Shining (4K Restoration)"), "The Shining");
    }

    #[test]
    fn keeps_meaningful_parentheses_in_display() {
        assert_eq!(
            clean_display_title("羅生門（ラショーモン）"),
            "羅生門(ラショーモン)"
        );
    }

    #[test]
    fn cuts_crew_credits() {
        assert_eq!(
            clean_display_title("七人の侍 監督：黒澤明"),
            "七人の侍"
        );
        assert_eq!(clean_display_title("東京物語／監督・小津安二郎"), "東京物語");
    }

    #[test]
    fn title_starting_with_role_keyword_survives() {
        assert_eq!(clean_display_title("監督失格"), "監督失格");
    }

    #[test]
    fn unwraps_title_quotes() {
        assert_eq!(clean_display_title("『天国と地獄』"), "天国と地獄");
        assert_eq!(clean_display_title("「生きる」"), "生きる");
    }

    #[test]
    fn folds_full_width_punctuation_and_spaces() {
        assert_eq!(
            clean_display_title("ゴジラ　－１．０！"),
            "ゴジラ -１.０!"
        );
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(clean_display_title("  The   Third  Man "), "The Third Man");
    }

    #[test]
    fn match_key_folds_width_and_case() {
        let a = normalize_for_matching("ＣＡＳＡＢＬＡＮＣＡ").unwrap();
        let b = normalize_for_matching("Casablanca").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "casablanca");
    }

    #[test]
    fn match_key_removes_whitespace_and_bracket_contents() {
        let key = normalize_for_matching("【4K】カサブランカ（字幕版）").unwrap();
        assert_eq!(key.as_str(), "カサブランカ");
        let key = normalize_for_matching("羅生門（ラショーモン）").unwrap();
        assert_eq!(key.as_str(), "羅生門");
        let key = normalize_for_matching("The  Third Man").unwrap();
        assert_eq!(key.as_str(), "thethirdman");
    }

    #[test]
    fn match_key_is_idempotent() {
        for raw in [
            "【4K】カサブランカ（字幕版）",
            "Friday the 13th",
            "七人の侍 監督：黒澤明",
            "ＧＯＤＺＩＬＬＡ　ゴジラ",
        ] {
            let once = normalize_for_matching(raw).unwrap();
            let twice = normalize_for_matching(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn all_decoration_yields_no_key() {
        assert_eq!(normalize_for_matching("【4K】"), None);
        assert_eq!(normalize_for_matching("   "), None);
        assert_eq!(normalize_for_matching(""), None);
    }
}
