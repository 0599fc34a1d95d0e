use chrono::NaiveDate;
use clap::Parser;
use showtime_scrape::{
    CineLumiereAdapter, MorcAsagayaAdapter, SiteAdapter, normalize_listings, records_to_json,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Scrape cinema showtimes and print normalized records as JSON")]
struct Args {
    /// Only run the named venue (default: all).
    #[arg(long)]
    venue: Option<String>,

    /// Reference date (YYYY-MM-DD) for year inference; defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let reference_date = args.date.unwrap_or_else(|| chrono::Local::now().date_naive());

    let client = reqwest::Client::builder().cookie_store(true).build()?;

    let adapters: Vec<Box<dyn SiteAdapter>> = vec![
        Box::new(CineLumiereAdapter::new()),
        Box::new(MorcAsagayaAdapter::new(reference_date)),
    ];

    let mut all_records = Vec::new();
    for adapter in &adapters {
        let name = adapter.venue_name();
        if let Some(ref wanted) = args.venue {
            if !name.eq_ignore_ascii_case(wanted) {
                continue;
            }
        }

        // One failing venue yields zero records; the others proceed.
        tracing::info!(venue = name, "scraping");
        if let Err(err) = adapter.warm_up(&client).await {
            tracing::warn!(venue = name, %err, "warm-up failed");
            continue;
        }
        let enrichment = match adapter.fetch_enrichment(&client).await {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!(venue = name, %err, "enrichment fetch failed, continuing bare");
                Default::default()
            }
        };
        let raw = match adapter.fetch_listings(&client).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(venue = name, %err, "listing fetch failed, skipping venue");
                continue;
            }
        };
        let records = normalize_listings(&raw, reference_date, adapter.locale(), &enrichment);
        tracing::info!(venue = name, count = records.len(), "normalized");
        all_records.extend(records);
    }

    let all_records = showtime_scrape::dedupe_and_sort(all_records);
    let json = if args.compact {
        serde_json::to_string(&all_records)?
    } else {
        records_to_json(&all_records)?
    };
    println!("{}", json);
    Ok(())
}
