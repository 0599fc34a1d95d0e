//! Adapter for Morc阿佐ヶ谷 (Asagaya, Tokyo).
//! Listing: https://www.morc-asagaya.com/film_date/film_now/
//! Detail pages carry the schedule as text lines ("8月27日（水）～31日（日）
//! 開場18:00／開映18:30") plus a spec blob ("2025年／61分／日本") and crew
//! lines ("■監督：…") that feed the enrichment table.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Days, NaiveDate};
use reqwest::{Client, header};
use scraper::{Html, Selector};

use crate::records::{Enrichment, EnrichmentTable};
use crate::{Locale, RawListing, SiteAdapter, dates, titles};

const BASE: &str = "https://www.morc-asagaya.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

pub struct MorcAsagayaAdapter {
    list_url: String,
    /// Reference date for expanding run ranges into per-day listings; the
    /// adapter never reads the clock itself.
    reference_date: NaiveDate,
    /// Fetched bodies by URL. The listings and enrichment passes walk the
    /// same pages, so each page is fetched once per run.
    pages: Mutex<HashMap<String, String>>,
}

impl MorcAsagayaAdapter {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            list_url: format!("{}/film_date/film_now/", BASE),
            reference_date,
            pages: Mutex::new(HashMap::new()),
        }
    }

    async fn page(
        &self,
        client: &Client,
        url: &str,
    ) -> Result<String, Box<dyn std::error::Error>> {
        if let Some(body) = self.pages.lock().unwrap().get(url).cloned() {
            return Ok(body);
        }
        let body = fetch_page(client, url).await?;
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.clone());
        Ok(body)
    }
}

/// Collect film detail URLs and titles from the now-playing list.
fn extract_film_links(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let link_sel = match Selector::parse("a[href*=\"/film/\"]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let mut films: HashMap<String, String> = HashMap::new();
    for a in document.select(&link_sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", BASE, href)
        };
        let title = a
            .text()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let entry = films.entry(url).or_default();
        if title.len() > entry.len() {
            *entry = title;
        }
    }
    let mut v: Vec<(String, String)> = films.into_iter().collect();
    v.sort();
    v
}

/// All non-empty text lines of a page, in document order.
fn page_lines(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Page title: first h1, falling back to the listing-card text.
fn page_title(html: &str, fallback: &str) -> String {
    let document = Html::parse_document(html);
    Selector::parse("h1")
        .ok()
        .and_then(|sel| {
            document.select(&sel).next().map(|h| {
                h.text()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Split a schedule line into its date part and time part. Lines look like
/// "8月27日（水）～31日（日） 開場18:00／開映18:30"; anything without both a
/// 月…日 date and a clock time is not a schedule line.
fn split_schedule_line(line: &str) -> Option<(String, String)> {
    if !line.contains('月') || !line.contains('日') {
        return None;
    }
    // The time part starts at the first colon-bearing token; kanji clocks
    // ("午後7時開映") have no colon, so fall back to the first 時.
    let anchor = line.find([':', '：']).or_else(|| line.find('時'))?;
    // Walk back from the anchor over the hour digits and any 開場/開映 label.
    let head = &line[..anchor];
    let mut boundary = head.len();
    for (idx, c) in head.char_indices().rev() {
        if c.is_ascii_digit() || c.is_whitespace() || "開場映時分後前午オープン／/　".contains(c) {
            boundary = idx;
        } else {
            break;
        }
    }
    let date_part = line[..boundary].trim();
    let time_part = line[boundary..].trim();
    if date_part.contains('月') && !time_part.is_empty() {
        Some((date_part.to_string(), time_part.to_string()))
    } else {
        None
    }
}

/// Expand a schedule line into one ISO raw-date per day of the run.
fn expand_schedule_line(
    line: &str,
    reference: NaiveDate,
) -> Option<(Vec<String>, String)> {
    let (date_part, time_part) = split_schedule_line(line)?;
    let (start, end) = dates::resolve_date_range(&date_part, reference, Locale::Jp).ok()?;
    let mut days = Vec::new();
    let mut day = start;
    while day <= end && days.len() < 60 {
        days.push(day.format("%Y-%m-%d").to_string());
        day = day.checked_add_days(Days::new(1))?;
    }
    Some((days, time_part))
}

/// Year, runtime and country from a spec blob like "2025年／61分／日本".
fn parse_spec_blob(text: &str) -> (Option<String>, Option<String>, Option<String>) {
    let mut year = None;
    let mut runtime = None;
    let mut country = None;
    for token in text.split(['／', '/', '｜', '|']) {
        let token = token.trim();
        if let Some(digits) = token.strip_suffix('年') {
            if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
                year = Some(digits.to_string());
                continue;
            }
        }
        if let Some(digits) = token.strip_suffix('分') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                runtime = Some(digits.to_string());
                continue;
            }
        }
        if year.is_some() && country.is_none() && !token.is_empty() {
            let cleaned: String = token
                .chars()
                .take_while(|c| !matches!(c, '■' | '◼'))
                .collect();
            let cleaned = cleaned.trim();
            if !cleaned.is_empty() && !cleaned.chars().any(|c| c.is_ascii_digit()) {
                country = Some(cleaned.to_string());
            }
        }
    }
    (year, runtime, country)
}

/// Director from a "■監督：名前" line.
fn parse_director_line(line: &str) -> Option<String> {
    let idx = line.find("監督")?;
    let after = &line[idx + "監督".len()..];
    let after = after.trim_start_matches([':', '：', ' ', '　']);
    let name: String = after
        .chars()
        .take_while(|c| !matches!(c, '■' | '◼' | '\n'))
        .collect();
    let name = name.trim();
    if name.is_empty() { None } else { Some(name.to_string()) }
}

async fn fetch_page(
    client: &Client,
    url: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let body = client
        .get(url)
        .header(header::USER_AGENT, USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}

#[async_trait::async_trait]
impl SiteAdapter for MorcAsagayaAdapter {
    fn venue_name(&self) -> &str {
        "Morc阿佐ヶ谷"
    }

    fn locale(&self) -> Locale {
        Locale::Jp
    }

    async fn fetch_listings(
        &self,
        client: &Client,
    ) -> Result<Vec<RawListing>, Box<dyn std::error::Error>> {
        let body = self.page(client, &self.list_url).await?;
        let film_links = extract_film_links(&body);

        let mut listings = Vec::new();
        for (url, card_title) in film_links {
            let body = match self.page(client, &url).await {
                Ok(b) => b,
                Err(err) => {
                    tracing::warn!(%url, %err, "detail page fetch failed");
                    continue;
                }
            };
            let title = page_title(&body, &card_title);
            for line in page_lines(&body) {
                let Some((days, time_part)) = expand_schedule_line(&line, self.reference_date)
                else {
                    continue;
                };
                for day in days {
                    let mut listing =
                        RawListing::new(&title, &day, &time_part, self.venue_name());
                    listing.booking_url = Some(url.clone());
                    listings.push(listing);
                }
            }
        }
        Ok(listings)
    }

    async fn fetch_enrichment(
        &self,
        client: &Client,
    ) -> Result<EnrichmentTable, Box<dyn std::error::Error>> {
        let body = self.page(client, &self.list_url).await?;
        let film_links = extract_film_links(&body);

        let mut table = EnrichmentTable::new();
        for (url, card_title) in film_links {
            let body = match self.page(client, &url).await {
                Ok(b) => b,
                Err(err) => {
                    tracing::warn!(%url, %err, "detail page fetch failed");
                    continue;
                }
            };
            let title = page_title(&body, &card_title);
            let Some(key) = titles::normalize_for_matching(&title) else {
                continue;
            };

            let mut enrichment = Enrichment {
                detail_page_url: Some(url.clone()),
                ..Default::default()
            };
            for line in page_lines(&body) {
                if enrichment.year.is_none() && line.contains('年') && line.contains('分') {
                    let (year, runtime, country) = parse_spec_blob(&line);
                    enrichment.year = year;
                    enrichment.runtime_min = runtime;
                    enrichment.country = country;
                }
                if enrichment.director.is_none() && line.contains("監督") {
                    enrichment.director = parse_director_line(&line);
                }
                // First long prose line doubles as the synopsis.
                if enrichment.synopsis.is_none()
                    && line.chars().count() > 60
                    && !line.contains("監督")
                    && !line.contains(':')
                {
                    enrichment.synopsis = Some(line.clone());
                }
            }
            table.insert(key, enrichment);
        }
        Ok(table)
    }
}
