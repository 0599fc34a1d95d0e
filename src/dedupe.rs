//! Final-pass deduplication and ordering.
//!
//! The same screening is often observed twice — once from the schedule grid
//! and once from a detail page, or from two scrape passes. Collapsing is by
//! the composite identity key; when duplicates conflict, the record with the
//! more complete enrichment bundle wins, so already-fetched detail-page data
//! is never silently discarded.

use std::collections::HashMap;

use crate::records::ShowingRecord;

/// Collapse duplicates (richer record wins, first-seen wins ties) and sort
/// ascending by `(date_text, showtime, movie_title)`. The sort is stable, so
/// genuinely equal records keep their input order.
pub fn dedupe_and_sort(records: Vec<ShowingRecord>) -> Vec<ShowingRecord> {
    let mut kept: Vec<ShowingRecord> = Vec::with_capacity(records.len());
    let mut by_key: HashMap<(String, String, String, String, String), usize> =
        HashMap::with_capacity(records.len());

    for record in records {
        let key = owned_key(&record);
        match by_key.get(&key) {
            Some(&idx) => {
                if record.richness() > kept[idx].richness() {
                    kept[idx] = record;
                }
            }
            None => {
                by_key.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    kept.sort_by(|a, b| {
        (&a.date_text, &a.showtime, &a.movie_title)
            .cmp(&(&b.date_text, &b.showtime, &b.movie_title))
    });
    kept
}

fn owned_key(record: &ShowingRecord) -> (String, String, String, String, String) {
    let (cinema, title, date, time, screen) = record.identity_key();
    (
        cinema.to_string(),
        title.to_string(),
        date.to_string(),
        time.to_string(),
        screen.to_string(),
    )
}
