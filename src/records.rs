//! The canonical showing record and its assembly.
//!
//! Every venue adapter funnels into one schema: a screening of one film at
//! one venue at one date and time, optionally enriched with detail-page
//! metadata joined by [`MatchKey`]. `None` is the single empty sentinel —
//! empty strings from source markup are normalized away at this boundary.

use std::collections::BTreeSet;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::times::format_hhmm;
use crate::titles::MatchKey;

/// One scheduled screening, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowingRecord {
    pub cinema_name: String,
    pub movie_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_title_en: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub date_text: String,
    /// Zero-padded 24-hour `HH:MM`.
    pub showtime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub format_tags: BTreeSet<String>,
}

impl ShowingRecord {
    /// Composite identity for deduplication. Screen name participates so
    /// simultaneous showings in different auditoriums both survive.
    pub fn identity_key(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.cinema_name,
            &self.movie_title,
            &self.date_text,
            &self.showtime,
            self.screen_name.as_deref().unwrap_or(""),
        )
    }

    /// Count of populated optional fields; the dedup tie-break.
    pub fn richness(&self) -> usize {
        [
            &self.movie_title_en,
            &self.screen_name,
            &self.director,
            &self.year,
            &self.country,
            &self.runtime_min,
            &self.synopsis,
            &self.detail_page_url,
            &self.booking_url,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
            + usize::from(!self.format_tags.is_empty())
    }
}

/// Detail-page metadata bundle, joined to schedule rows by match key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub movie_title_en: Option<String>,
    pub director: Option<String>,
    pub year: Option<String>,
    pub country: Option<String>,
    pub runtime_min: Option<String>,
    pub synopsis: Option<String>,
    pub detail_page_url: Option<String>,
}

/// Fields the schedule side itself may carry into assembly.
#[derive(Debug, Clone, Default)]
pub struct ShowingExtras {
    pub screen_name: Option<String>,
    pub booking_url: Option<String>,
    pub format_tags: BTreeSet<String>,
}

/// Merge a resolved (title, date, time, venue) tuple with optional schedule
/// extras and an optional enrichment bundle. Pure; all validation has already
/// happened in the resolvers.
pub fn assemble(
    title: &str,
    date: NaiveDate,
    time: NaiveTime,
    venue: &str,
    extras: ShowingExtras,
    enrichment: Option<&Enrichment>,
) -> ShowingRecord {
    let e = enrichment.cloned().unwrap_or_default();
    ShowingRecord {
        cinema_name: venue.to_string(),
        movie_title: title.to_string(),
        movie_title_en: non_empty(e.movie_title_en),
        date_text: date.format("%Y-%m-%d").to_string(),
        showtime: format_hhmm(time),
        screen_name: non_empty(extras.screen_name),
        director: non_empty(e.director),
        year: non_empty(e.year),
        country: non_empty(e.country),
        runtime_min: non_empty(e.runtime_min),
        synopsis: non_empty(e.synopsis),
        detail_page_url: non_empty(e.detail_page_url),
        booking_url: non_empty(extras.booking_url),
        format_tags: extras
            .format_tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Enrichment bundles keyed by match key.
///
/// Lookup is exact-match first, then a deterministic fuzzy pass: character
/// bigram overlap coefficient against every stored key, accepted at 0.75 or
/// better. The best score wins; equal scores go to the lexicographically
/// smallest key so repeated runs agree. Keys shorter than four characters
/// never fuzzy-match — short titles produce too many false joins.
#[derive(Debug, Default)]
pub struct EnrichmentTable {
    entries: HashMap<MatchKey, Enrichment>,
}

const FUZZY_THRESHOLD: f64 = 0.75;
const FUZZY_MIN_CHARS: usize = 4;

impl EnrichmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: MatchKey, enrichment: Enrichment) {
        self.entries.insert(key, enrichment);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, key: &MatchKey) -> Option<&Enrichment> {
        if let Some(found) = self.entries.get(key) {
            return Some(found);
        }
        if key.as_str().chars().count() < FUZZY_MIN_CHARS {
            return None;
        }
        let probe = bigrams(key.as_str());
        let mut best: Option<(f64, &MatchKey)> = None;
        for candidate in self.entries.keys() {
            if candidate.as_str().chars().count() < FUZZY_MIN_CHARS {
                continue;
            }
            let score = overlap_coefficient(&probe, &bigrams(candidate.as_str()));
            if score < FUZZY_THRESHOLD {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_key)) => {
                    score > best_score || (score == best_score && candidate < best_key)
                }
            };
            if better {
                best = Some((score, candidate));
            }
        }
        best.and_then(|(_, k)| self.entries.get(k))
    }
}

fn bigrams(s: &str) -> BTreeSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// |A ∩ B| / min(|A|, |B|).
fn overlap_coefficient(a: &BTreeSet<(char, char)>, b: &BTreeSet<(char, char)>) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / smaller as f64
}
