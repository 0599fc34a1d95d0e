//! Adapter for Ciné Lumière (Institut français, South Kensington).
//! What's-on: https://www.institut-francais.org.uk/whats-on/
//! Film pages live under /cinema/<slug>/ and list screenings as lines like
//! "Sun 12 Jan at 15:30" with a Savoy Systems booking link per screening.

use std::collections::HashMap;

use reqwest::{Client, header};
use scraper::{Html, Selector};

use crate::{Locale, RawListing, SiteAdapter};

const BASE: &str = "https://www.institut-francais.org.uk";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Category slugs under /cinema/ that are listing pages, not films.
const SKIP_SLUGS: &[&str] = &[
    "new-releases",
    "classics",
    "cinefamilies",
    "festivals-series",
    "special-screenings",
    "cinema",
];

pub struct CineLumiereAdapter {
    whats_on_url: String,
}

impl CineLumiereAdapter {
    pub fn new() -> Self {
        Self {
            whats_on_url: format!("{}/whats-on/", BASE),
        }
    }
}

impl Default for CineLumiereAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn absolutize(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", BASE, href)
    } else {
        format!("{}/{}", BASE, href)
    }
}

/// Film slug from a /cinema/<slug>/ URL, or None for category pages.
fn film_slug(url: &str) -> Option<&str> {
    let path = url.strip_prefix(BASE).unwrap_or(url);
    let slug = path
        .trim_end_matches('/')
        .strip_prefix("/cinema/")?;
    if slug.contains('/') || SKIP_SLUGS.contains(&slug) || slug.is_empty() {
        return None;
    }
    Some(slug)
}

/// "a-monkey-in-winter" → "A Monkey In Winter", the fallback when a card has
/// no usable link text.
fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collect film detail URLs and their card titles from the what's-on page.
fn extract_film_links(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let link_sel = match Selector::parse("a[href*=\"/cinema/\"]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let mut films: HashMap<String, String> = HashMap::new();
    for a in document.select(&link_sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let url = absolutize(href.trim());
        let Some(slug) = film_slug(&url) else {
            continue;
        };
        let text = a
            .text()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        // Cards sometimes wrap the whole blurb in the link; keep short text only.
        let title = if text.is_empty() || text.chars().count() > 80 {
            title_from_slug(slug)
        } else {
            text
        };
        let entry = films.entry(url).or_default();
        if title.len() > entry.len() {
            *entry = title;
        }
    }
    let mut v: Vec<(String, String)> = films.into_iter().collect();
    v.sort();
    v
}

/// Pull "Sun 12 Jan at 15:30" style lines out of a detail page, returning
/// raw (date, time) fragment pairs for the resolvers.
fn extract_screening_fragments(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();

    // Structured screening blocks first, then a whole-page text sweep as
    // fallback — the site has reshuffled its markup more than once.
    if let Ok(sel) = Selector::parse(
        ".screening, .showtime, .performance, [class*=\"screening\"], [class*=\"time\"]",
    ) {
        for elem in document.select(&sel) {
            let text = elem
                .text()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            // One screening per line; wrapper elements concatenating several
            // screenings are too long to be a single entry.
            if !text.is_empty() && text.chars().count() <= 60 {
                lines.push(text);
            }
        }
    }
    if lines.is_empty() {
        lines = document
            .root_element()
            .text()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
    }

    let mut fragments = Vec::new();
    for line in lines {
        if let Some(pair) = split_date_time_line(&line) {
            if !fragments.contains(&pair) {
                fragments.push(pair);
            }
        }
    }
    fragments
}

/// Split one "Sun 12 Jan at 15:30" (or "… @ 8.45pm") line into raw date and
/// time fragments. Lines without both halves are not screenings.
fn split_date_time_line(line: &str) -> Option<(String, String)> {
    let lower = line.to_lowercase();
    let (sep_idx, sep_len) = lower
        .find(" at ")
        .map(|i| (i, 4))
        .or_else(|| lower.find(" @ ").map(|i| (i, 3)))?;
    let date_part = line[..sep_idx].trim();
    let time_part = line[sep_idx + sep_len..].trim();
    if date_part.is_empty() || time_part.is_empty() {
        return None;
    }
    // Cheap plausibility gates; the resolvers do the real validation.
    if !date_part.chars().any(|c| c.is_ascii_digit())
        || !time_part.chars().take(8).any(|c| c.is_ascii_digit())
    {
        return None;
    }
    let time_part: String = time_part.chars().take(12).collect();
    Some((date_part.to_string(), time_part))
}

#[async_trait::async_trait]
impl SiteAdapter for CineLumiereAdapter {
    fn venue_name(&self) -> &str {
        "Ciné Lumière"
    }

    fn locale(&self) -> Locale {
        Locale::Uk
    }

    async fn fetch_listings(
        &self,
        client: &Client,
    ) -> Result<Vec<RawListing>, Box<dyn std::error::Error>> {
        let body = client
            .get(&self.whats_on_url)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let film_links = extract_film_links(&body);
        let mut listings = Vec::new();

        for (url, title) in film_links {
            let resp = match client
                .get(&url)
                .header(header::USER_AGENT, USER_AGENT)
                .send()
                .await
            {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(%url, %err, "detail page fetch failed");
                    continue;
                }
            };
            let body = match resp.error_for_status() {
                Ok(r) => r.text().await?,
                Err(_) => continue,
            };
            for (raw_date, raw_time) in extract_screening_fragments(&body) {
                let mut listing =
                    RawListing::new(&title, &raw_date, &raw_time, self.venue_name());
                listing.booking_url = Some(url.clone());
                listings.push(listing);
            }
        }
        Ok(listings)
    }
}
