//! Normalization core for cinema showtime scrapers.
//!
//! Venue adapters fetch and parse site-specific markup into [`RawListing`]
//! fragments; the core resolves dates, times and titles, joins detail-page
//! enrichment by match key, and emits a deduplicated, ordered list of
//! [`ShowingRecord`]s. The core is pure — no I/O, no clock reads — so it can
//! run inside any fetch worker without synchronization.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use reqwest::Client;

pub mod dates;
pub mod dedupe;
pub mod records;
pub mod times;
pub mod titles;

mod cine_lumiere;
mod morc_asagaya;

pub use cine_lumiere::CineLumiereAdapter;
pub use dates::{DatePolicy, Locale, ResolveError, resolve_date, resolve_date_range};
pub use dedupe::dedupe_and_sort;
pub use morc_asagaya::MorcAsagayaAdapter;
pub use records::{Enrichment, EnrichmentTable, ShowingExtras, ShowingRecord, assemble};
pub use times::resolve_time;
pub use titles::{MatchKey, clean_display_title, normalize_for_matching};

/// One raw schedule fragment as extracted from a venue page, before any
/// normalization. `raw_date` and `raw_time` keep whatever text the site
/// published.
#[derive(Debug, Clone)]
pub struct RawListing {
    pub raw_title: String,
    pub raw_date: String,
    pub raw_time: String,
    pub venue: String,
    pub screen: Option<String>,
    pub booking_url: Option<String>,
    pub format_tags: BTreeSet<String>,
}

impl RawListing {
    pub fn new(raw_title: &str, raw_date: &str, raw_time: &str, venue: &str) -> Self {
        Self {
            raw_title: raw_title.to_string(),
            raw_date: raw_date.to_string(),
            raw_time: raw_time.to_string(),
            venue: venue.to_string(),
            screen: None,
            booking_url: None,
            format_tags: BTreeSet::new(),
        }
    }
}

/// Trait that all venue adapters implement. Adapters own everything
/// site-specific (URLs, selectors, pagination); the core owns everything
/// after that. `Send + Sync` so adapters work as boxed trait objects from
/// the async runner.
#[async_trait::async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Venue name as it appears in output records.
    fn venue_name(&self) -> &str;

    /// Date-pattern family this venue publishes.
    fn locale(&self) -> Locale;

    /// Optional warm-up request to get cookies/auth (default: no-op).
    async fn warm_up(&self, _client: &Client) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    /// Fetch the schedule and return raw fragments.
    async fn fetch_listings(
        &self,
        client: &Client,
    ) -> Result<Vec<RawListing>, Box<dyn std::error::Error>>;

    /// Fetch detail pages and build the enrichment table (default: none).
    async fn fetch_enrichment(
        &self,
        _client: &Client,
    ) -> Result<EnrichmentTable, Box<dyn std::error::Error>> {
        Ok(EnrichmentTable::new())
    }
}

/// Run the full normalization pipeline over raw fragments.
///
/// Unresolvable fragments are logged and skipped, never fatal: a batch of
/// scraped rows degrades to fewer records, not an aborted venue. The result
/// is deduplicated (richer record wins) and sorted by date, time, title.
pub fn normalize_listings(
    raw: &[RawListing],
    reference_date: NaiveDate,
    locale: Locale,
    enrichment: &EnrichmentTable,
) -> Vec<ShowingRecord> {
    let mut records = Vec::with_capacity(raw.len());
    for listing in raw {
        let date = match dates::resolve_date(&listing.raw_date, reference_date, locale) {
            Ok(d) => d,
            Err(err) => {
                tracing::debug!(venue = %listing.venue, %err, "skipping fragment");
                continue;
            }
        };
        let Some(time) = times::resolve_time(&listing.raw_time) else {
            tracing::debug!(
                venue = %listing.venue,
                raw_time = %listing.raw_time,
                "skipping fragment with unparseable time"
            );
            continue;
        };
        let title = titles::clean_display_title(&listing.raw_title);
        let Some(key) = titles::normalize_for_matching(&listing.raw_title) else {
            tracing::debug!(
                venue = %listing.venue,
                raw_title = %listing.raw_title,
                "skipping fragment with no resolvable title"
            );
            continue;
        };
        let extras = ShowingExtras {
            screen_name: listing.screen.clone(),
            booking_url: listing.booking_url.clone(),
            format_tags: listing.format_tags.clone(),
        };
        records.push(records::assemble(
            &title,
            date,
            time,
            &listing.venue,
            extras,
            enrichment.lookup(&key),
        ));
    }
    dedupe_and_sort(records)
}

/// Serialize records as pretty-printed UTF-8 JSON. Non-ASCII characters are
/// preserved, not escaped, so Japanese and French titles survive downstream.
pub fn records_to_json(records: &[ShowingRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
    }

    #[test]
    fn pipeline_resolves_assembles_and_sorts() {
        let raw = vec![
            RawListing::new("【4K】カサブランカ（字幕版）", "8月27日（水）", "12:50-14:28", "Stranger"),
            RawListing::new("カサブランカ", "8月27日（水）", "開場18:00/開映18:30", "Stranger"),
        ];
        let mut table = EnrichmentTable::new();
        table.insert(
            normalize_for_matching("カサブランカ").unwrap(),
            Enrichment {
                director: Some("Michael Curtiz".to_string()),
                year: Some("1942".to_string()),
                ..Default::default()
            },
        );

        let out = normalize_listings(&raw, reference(), Locale::Jp, &table);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].movie_title, "カサブランカ");
        assert_eq!(out[0].date_text, "2025-08-27");
        assert_eq!(out[0].showtime, "12:50");
        assert_eq!(out[1].showtime, "18:30");
        for record in &out {
            assert_eq!(record.director.as_deref(), Some("Michael Curtiz"));
        }
    }

    #[test]
    fn bad_fragments_are_skipped_not_fatal() {
        let raw = vec![
            RawListing::new("Ikiru", "not a date", "19:00", "ICA"),
            RawListing::new("Ikiru", "2026-01-09", "sold out", "ICA"),
            RawListing::new("【4K】", "2026-01-09", "19:00", "ICA"),
            RawListing::new("Ikiru", "2026-01-09", "19:00", "ICA"),
        ];
        let out = normalize_listings(&raw, reference(), Locale::Uk, &EnrichmentTable::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].movie_title, "Ikiru");
        assert_eq!(out[0].showtime, "19:00");
    }

    #[test]
    fn duplicate_fragments_collapse() {
        let raw = vec![
            RawListing::new("Ran", "2026-01-09", "19:00", "ICA"),
            RawListing::new("Ran", "2026-01-09", "19:00", "ICA"),
        ];
        let out = normalize_listings(&raw, reference(), Locale::Uk, &EnrichmentTable::new());
        assert_eq!(out.len(), 1);
    }

    struct StubAdapter;

    #[async_trait::async_trait]
    impl SiteAdapter for StubAdapter {
        fn venue_name(&self) -> &str {
            "Stub"
        }

        fn locale(&self) -> Locale {
            Locale::Generic
        }

        async fn fetch_listings(
            &self,
            _client: &Client,
        ) -> Result<Vec<RawListing>, Box<dyn std::error::Error>> {
            Ok(vec![RawListing::new("Ran", "2026-01-09", "19:00", "Stub")])
        }
    }

    #[tokio::test]
    async fn adapters_work_as_boxed_trait_objects() {
        let adapters: Vec<Box<dyn SiteAdapter>> = vec![Box::new(StubAdapter)];
        let client = Client::new();
        for adapter in &adapters {
            adapter.warm_up(&client).await.unwrap();
            let table = adapter.fetch_enrichment(&client).await.unwrap();
            assert!(table.is_empty());
            let raw = adapter.fetch_listings(&client).await.unwrap();
            assert_eq!(raw.len(), 1);
            assert_eq!(adapter.venue_name(), "Stub");
        }
    }

    #[test]
    fn json_output_preserves_non_ascii() {
        let raw = vec![RawListing::new("カサブランカ", "2025-08-27", "18:30", "Stranger")];
        let out = normalize_listings(&raw, reference(), Locale::Jp, &EnrichmentTable::new());
        let json = records_to_json(&out).unwrap();
        assert!(json.contains("カサブランカ"));
        assert!(!json.contains("\\u"));
    }
}
